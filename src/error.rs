//! Error types for the upgrade engine

use std::io;

use http::StatusCode;

/// Result type alias for handshake operations
pub type Result<T> = std::result::Result<T, Error>;

/// A request header that failed its contract
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("error in header {header}: {message}")]
pub struct HandshakeError {
    /// Name of the offending header
    pub header: &'static str,
    /// Human-readable failure message
    pub message: String,
    /// Status code to report to the client
    pub status: StatusCode,
}

impl HandshakeError {
    /// Create a new header violation
    pub fn new(header: &'static str, message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            header,
            message: message.into(),
            status,
        }
    }
}

/// Upgrade engine error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required request header is missing or carries the wrong value
    #[error(transparent)]
    Header(#[from] HandshakeError),
    /// The request was turned away by a route filter before the hijack
    #[error("request rejected: {0}")]
    Rejected(StatusCode),
    /// The HTTP exchange cannot give up its transport
    #[error("hijacking not supported")]
    HijackUnsupported,
    /// The takeover call itself failed
    #[error("hijack failed: {0}")]
    HijackFailed(#[source] io::Error),
    /// The accept key could not be derived from the client nonce
    #[error("key derivation failed: {0}")]
    KeyDerivation(&'static str),
    /// The 101 response could not be written; the connection was closed
    #[error("failed to write handshake response: {0}")]
    ResponseWrite(#[source] io::Error),
    /// Invalid HTTP request on a raw transport
    #[error("Invalid HTTP: {0}")]
    InvalidHttp(&'static str),
    /// Peer closed the connection before a complete request arrived
    #[error("Connection closed")]
    ConnectionClosed,
    /// I/O error from the underlying socket
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl Error {
    /// HTTP status code reported for this failure
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Header(e) => e.status,
            Error::Rejected(status) => *status,
            Error::InvalidHttp(_) | Error::ConnectionClosed => StatusCode::BAD_REQUEST,
            Error::HijackUnsupported
            | Error::HijackFailed(_)
            | Error::KeyDerivation(_)
            | Error::ResponseWrite(_)
            | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns true if the client caused the failure
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }

    /// Plain-text body for the fallback error response.
    ///
    /// Client errors get the descriptive message, server errors only the
    /// status reason.
    pub fn response_message(&self) -> String {
        match self {
            Error::Header(e) => e.to_string(),
            Error::InvalidHttp(msg) => format!("invalid request: {}", msg),
            other => other
                .status()
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_string(),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::ConnectionReset => Error::ConnectionClosed,
            io::ErrorKind::BrokenPipe => Error::ConnectionClosed,
            io::ErrorKind::UnexpectedEof => Error::ConnectionClosed,
            _ => Error::Io(e),
        }
    }
}
