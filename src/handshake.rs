//! WebSocket handshake wire format
//!
//! This module holds the pieces of the opening handshake that touch bytes:
//! - Accept key derivation (Base64 of a digest over key + GUID)
//! - Serialization of the `101 Switching Protocols` and plain-text error responses
//! - Writing a response through partial writes
//! - HTTP/1.1 request head parsing for raw transports

use std::io;

use base64::Engine;
use bytes::{BufMut, Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::WS_GUID;
use crate::error::{Error, Result};

/// Maximum number of request headers accepted by [`parse_request`]
const MAX_HEADERS: usize = 64;

/// Digest used to derive `Sec-WebSocket-Accept`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcceptDigest {
    /// SHA-1, as mandated by RFC 6455. Required for standard clients.
    #[default]
    Sha1,
    /// SHA-256. Only for closed deployments where the server controls
    /// the client; standard clients will reject the handshake.
    Sha256,
}

/// Generate the Sec-WebSocket-Accept key
///
/// This computes: Base64(SHA-1(key + GUID))
#[inline]
pub fn generate_accept_key(key: &str) -> String {
    derive_accept_key(key.as_bytes(), AcceptDigest::Sha1)
}

/// Derive the accept key with the given digest
pub fn derive_accept_key(key: &[u8], digest: AcceptDigest) -> String {
    match digest {
        AcceptDigest::Sha1 => encode_digest::<Sha1>(key),
        AcceptDigest::Sha256 => encode_digest::<Sha256>(key),
    }
}

fn encode_digest<D: Digest>(key: &[u8]) -> String {
    let mut hasher = D::new();
    hasher.update(key);
    hasher.update(WS_GUID.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// Check that a client nonce is base64 for exactly 16 bytes
pub fn is_valid_key(key: &[u8]) -> bool {
    base64::engine::general_purpose::STANDARD
        .decode(key)
        .is_ok_and(|nonce| nonce.len() == 16)
}

/// Build a WebSocket upgrade response
pub fn build_response(accept_key: &str, capacity: usize) -> Bytes {
    let mut buf = BytesMut::with_capacity(capacity);

    buf.put_slice(b"HTTP/1.1 101 Switching Protocols\r\n");
    buf.put_slice(b"Upgrade: websocket\r\n");
    buf.put_slice(b"Connection: Upgrade\r\n");
    buf.put_slice(b"Sec-WebSocket-Accept: ");
    buf.put_slice(accept_key.as_bytes());
    buf.put_slice(b"\r\n");
    buf.put_slice(b"\r\n");
    buf.freeze()
}

/// Build a plain-text error response
///
/// The body is `message` followed by a newline.
pub fn build_error_response(status: StatusCode, message: &str) -> Bytes {
    let body_len = message.len() + 1;
    let mut buf = BytesMut::with_capacity(160 + body_len);

    buf.put_slice(b"HTTP/1.1 ");
    buf.put_slice(status.as_str().as_bytes());
    buf.put_u8(b' ');
    buf.put_slice(status.canonical_reason().unwrap_or("Unknown").as_bytes());
    buf.put_slice(b"\r\n");
    buf.put_slice(b"Content-Type: text/plain; charset=utf-8\r\n");
    buf.put_slice(b"X-Content-Type-Options: nosniff\r\n");
    buf.put_slice(b"Content-Length: ");
    buf.put_slice(body_len.to_string().as_bytes());
    buf.put_slice(b"\r\n");
    buf.put_slice(b"Connection: close\r\n");
    buf.put_slice(b"\r\n");
    buf.put_slice(message.as_bytes());
    buf.put_u8(b'\n');
    buf.freeze()
}

/// Write a serialized response to the transport and flush it
///
/// Short writes are retried until every byte is accepted. A transport that
/// accepts zero bytes fails with `WriteZero`.
pub async fn write_response<S>(stream: &mut S, response: &[u8]) -> io::Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    stream.write_all(response).await?;
    stream.flush().await
}

/// HTTP/1.1 request head read from a raw transport
#[derive(Debug, Clone)]
pub struct RequestHead {
    /// Request method
    pub method: Method,
    /// Request target as sent by the client
    pub path: String,
    /// Request headers
    pub headers: HeaderMap,
}

/// Parse an HTTP/1.1 request head
///
/// Returns the parsed head and the number of bytes consumed, or `None` if
/// the head is not complete yet.
pub fn parse_request(buf: &[u8], max_size: usize) -> Result<Option<(RequestHead, usize)>> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);

    match req.parse(buf) {
        Ok(httparse::Status::Complete(len)) => {
            if len > max_size {
                return Err(Error::InvalidHttp("request too large"));
            }

            let method = req
                .method
                .and_then(|m| Method::from_bytes(m.as_bytes()).ok())
                .ok_or(Error::InvalidHttp("invalid method"))?;
            let path = req.path.unwrap_or("/").to_string();

            let mut map = HeaderMap::with_capacity(req.headers.len());
            for header in req.headers.iter() {
                let name = HeaderName::from_bytes(header.name.as_bytes())
                    .map_err(|_| Error::InvalidHttp("invalid header name"))?;
                let value = HeaderValue::from_bytes(header.value)
                    .map_err(|_| Error::InvalidHttp("invalid header value"))?;
                map.append(name, value);
            }

            Ok(Some((
                RequestHead {
                    method,
                    path,
                    headers: map,
                },
                len,
            )))
        }
        Ok(httparse::Status::Partial) if buf.len() > max_size => {
            Err(Error::InvalidHttp("request too large"))
        }
        Ok(httparse::Status::Partial) => Ok(None),
        Err(httparse::Error::TooManyHeaders) => Err(Error::InvalidHttp("too many headers")),
        Err(_) => Err(Error::InvalidHttp("failed to parse HTTP request")),
    }
}
