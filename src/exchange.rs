//! HTTP exchange seam
//!
//! The upgrade engine does not own an HTTP server. It talks to whatever
//! server received the request through [`HttpExchange`]: read the request
//! headers, take the transport away (hijack), or, before that, write a
//! plain-text error response.
//!
//! [`RawExchange`] implements the trait for a bare HTTP/1.1 transport
//! (TCP or TLS stream) whose request head it reads itself.

use std::future::Future;
use std::io;

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use crate::UpgradeConfig;
use crate::error::{Error, Result};
use crate::handshake::{RequestHead, build_error_response, parse_request, write_response};

/// A hijacked transport
#[derive(Debug)]
pub struct Hijacked<S> {
    /// Raw read/write access to the connection
    pub io: S,
    /// Bytes read by the HTTP layer but not consumed by it
    pub buffered: Bytes,
}

/// One request/response exchange of an HTTP server
pub trait HttpExchange {
    /// Transport handed out by [`hijack`](HttpExchange::hijack)
    type Io: AsyncRead + AsyncWrite + Unpin + Send;

    /// Request headers
    fn headers(&self) -> &HeaderMap;

    /// Take exclusive control of the transport
    ///
    /// After a successful hijack the exchange must not touch the transport
    /// again. Exchanges that cannot give up their transport keep the default,
    /// which fails with [`Error::HijackUnsupported`].
    fn hijack(&mut self) -> Result<Hijacked<Self::Io>> {
        Err(Error::HijackUnsupported)
    }

    /// Write a plain-text error response
    ///
    /// Only usable before a hijack.
    fn write_error(
        &mut self,
        status: StatusCode,
        message: &str,
    ) -> impl Future<Output = io::Result<()>> + Send;
}

/// HTTP/1.1 exchange over a raw transport
pub struct RawExchange<S> {
    io: Option<S>,
    head: RequestHead,
    buffered: Bytes,
}

impl<S> RawExchange<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Read a request head from the transport
    ///
    /// Bytes that arrive after the head are kept and handed over on hijack.
    /// A malformed or oversized head is answered with a plain-text error
    /// before failing.
    pub async fn read(mut io: S, config: &UpgradeConfig) -> Result<Self> {
        let mut buf = BytesMut::with_capacity(config.read_buffer_size());

        loop {
            let n = io.read_buf(&mut buf).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }

            match parse_request(&buf, config.max_header_size()) {
                Ok(Some((head, consumed))) => {
                    let buffered = buf.split_off(consumed).freeze();
                    return Ok(Self {
                        io: Some(io),
                        head,
                        buffered,
                    });
                }
                Ok(None) => continue,
                Err(err) => {
                    let response = build_error_response(err.status(), &err.response_message());
                    if let Err(write_err) = write_response(&mut io, &response).await {
                        tracing::debug!(error = %write_err, "failed to reject malformed request");
                    }
                    return Err(err);
                }
            }
        }
    }
}

impl<S> RawExchange<S> {
    /// The parsed request head
    pub fn head(&self) -> &RequestHead {
        &self.head
    }

    /// Consume the exchange, keeping only the request head
    pub fn into_head(self) -> RequestHead {
        self.head
    }

    /// Returns true once the transport has been hijacked
    pub fn is_hijacked(&self) -> bool {
        self.io.is_none()
    }
}

impl<S> HttpExchange for RawExchange<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    type Io = S;

    fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    fn hijack(&mut self) -> Result<Hijacked<S>> {
        let io = self
            .io
            .take()
            .ok_or_else(|| Error::HijackFailed(io::Error::other("connection already hijacked")))?;

        Ok(Hijacked {
            io,
            buffered: std::mem::take(&mut self.buffered),
        })
    }

    fn write_error(
        &mut self,
        status: StatusCode,
        message: &str,
    ) -> impl Future<Output = io::Result<()>> + Send {
        let response = build_error_response(status, message);

        async move {
            match self.io.as_mut() {
                Some(io) => write_response(io, &response).await,
                None => Err(io::Error::other("connection hijacked")),
            }
        }
    }
}
