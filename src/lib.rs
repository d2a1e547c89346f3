//! # ws-hijack: WebSocket opening handshake over a hijacked HTTP/1.1 connection
//!
//! Accepts WebSocket clients (RFC 6455 §4) on an HTTP server without a
//! WebSocket library: the engine validates the upgrade request, takes the
//! transport away from the HTTP layer, writes `101 Switching Protocols` and
//! hands back the raw connection.
//!
//! ## Pieces
//!
//! - [`headers`]: the required header contract (`Connection`, `Upgrade`,
//!   `Sec-WebSocket-Version`), evaluated in a fixed order
//! - [`handshake`]: accept key derivation and response serialization
//! - [`exchange`]: the [`HttpExchange`] seam to the HTTP server, plus
//!   [`RawExchange`] for bare TCP/TLS streams
//! - [`stream`]: the [`UpgradedConnection`] handle returned on success
//! - [`server`]: the [`Upgrader`] orchestrating a handshake
//!
//! Message framing is not part of this crate; the upgraded connection is a
//! plain `AsyncRead + AsyncWrite`.
//!
//! ## Example
//!
//! ```ignore
//! use tokio::io::AsyncWriteExt;
//! use tokio::net::TcpListener;
//! use ws_hijack::{UpgradeConfig, Upgrader};
//!
//! let upgrader = Upgrader::new(UpgradeConfig::default());
//! let listener = TcpListener::bind("0.0.0.0:8080").await?;
//!
//! loop {
//!     let (stream, _) = listener.accept().await?;
//!     let upgrader = upgrader.clone();
//!     tokio::spawn(async move {
//!         if let Ok((mut conn, _head)) = upgrader.accept(stream).await {
//!             conn.write_all(b"Hello, World!").await.ok();
//!         }
//!     });
//! }
//! ```

pub mod error;
pub mod exchange;
pub mod handshake;
pub mod headers;
pub mod server;
pub mod stream;

pub use error::{Error, HandshakeError, Result};
pub use exchange::{Hijacked, HttpExchange, RawExchange};
pub use handshake::{AcceptDigest, RequestHead};
pub use headers::{HeaderMatch, HeaderRule};
pub use server::{HandshakeState, Upgrader};
pub use stream::UpgradedConnection;

/// WebSocket GUID for handshake
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The only protocol version this crate speaks
pub const WEBSOCKET_VERSION: &str = "13";

/// Default read buffer size
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Default write buffer size
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 1024;

/// Maximum HTTP request head size (8KB should be enough for any reasonable request)
pub const MAX_HEADER_SIZE: usize = 8192;

/// Handshake configuration
///
/// Built once, typically at server start, and never changed afterwards.
/// Every [`Upgrader`] holds its own copy.
///
/// # Example
///
/// ```
/// use ws_hijack::{AcceptDigest, HeaderMatch, UpgradeConfig};
///
/// let config = UpgradeConfig::builder()
///     .read_buffer_size(4096)
///     .header_match(HeaderMatch::Token)
///     .digest(AcceptDigest::Sha1)
///     .build();
///
/// assert_eq!(config.read_buffer_size(), 4096);
/// ```
#[derive(Debug, Clone)]
pub struct UpgradeConfig {
    read_buffer_size: usize,
    write_buffer_size: usize,
    compression: bool,
    digest: AcceptDigest,
    header_match: HeaderMatch,
    validate_key: bool,
    max_header_size: usize,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            compression: false,
            digest: AcceptDigest::Sha1,
            header_match: HeaderMatch::Exact,
            validate_key: false,
            max_header_size: MAX_HEADER_SIZE,
        }
    }
}

impl UpgradeConfig {
    /// Create a new config builder
    pub fn builder() -> UpgradeConfigBuilder {
        UpgradeConfigBuilder::new()
    }

    /// Initial capacity of the request read buffer (default: 1KB)
    pub fn read_buffer_size(&self) -> usize {
        self.read_buffer_size
    }

    /// Initial capacity of the response write buffer (default: 1KB)
    pub fn write_buffer_size(&self) -> usize {
        self.write_buffer_size
    }

    /// Compression flag. Inert: no extension is negotiated.
    pub fn compression(&self) -> bool {
        self.compression
    }

    /// Digest used for `Sec-WebSocket-Accept` (default: SHA-1)
    pub fn digest(&self) -> AcceptDigest {
        self.digest
    }

    /// Header value comparison mode (default: exact)
    pub fn header_match(&self) -> HeaderMatch {
        self.header_match
    }

    /// Whether the client nonce must be a base64-encoded 16-byte value
    pub fn validate_key(&self) -> bool {
        self.validate_key
    }

    /// Maximum request head size accepted on raw transports (default: 8KB)
    pub fn max_header_size(&self) -> usize {
        self.max_header_size
    }
}

/// Builder for [`UpgradeConfig`]
#[derive(Debug, Clone)]
pub struct UpgradeConfigBuilder {
    config: UpgradeConfig,
}

impl UpgradeConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: UpgradeConfig::default(),
        }
    }

    /// Set the read buffer size
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Set the write buffer size
    pub fn write_buffer_size(mut self, size: usize) -> Self {
        self.config.write_buffer_size = size;
        self
    }

    /// Set the compression flag
    pub fn compression(mut self, enabled: bool) -> Self {
        self.config.compression = enabled;
        self
    }

    /// Set the accept key digest
    ///
    /// Anything but [`AcceptDigest::Sha1`] breaks standard clients.
    pub fn digest(mut self, digest: AcceptDigest) -> Self {
        self.config.digest = digest;
        self
    }

    /// Set the header value comparison mode
    pub fn header_match(mut self, mode: HeaderMatch) -> Self {
        self.config.header_match = mode;
        self
    }

    /// Require a well-formed 16-byte client nonce
    pub fn validate_key(mut self, enabled: bool) -> Self {
        self.config.validate_key = enabled;
        self
    }

    /// Set the maximum request head size
    pub fn max_header_size(mut self, size: usize) -> Self {
        self.config.max_header_size = size;
        self
    }

    /// Build the configuration
    pub fn build(self) -> UpgradeConfig {
        self.config
    }
}

impl Default for UpgradeConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::exchange::{HttpExchange, RawExchange};
    pub use crate::stream::UpgradedConnection;
    pub use crate::{UpgradeConfig, Upgrader};
}
