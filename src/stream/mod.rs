//! Upgraded connection handle
//!
//! After the `101 Switching Protocols` response is written, the transport is
//! handed to the caller as an [`UpgradedConnection`]. It implements
//! `AsyncRead + AsyncWrite` and is the seam a frame layer builds on:
//!
//! ```ignore
//! let (mut conn, head) = upgrader.accept(tcp_stream).await?;
//! conn.write_all(b"raw bytes after the handshake").await?;
//! conn.close().await?;
//! ```
//!
//! A frame layer on top must keep a single reader and serialize its writers.

mod upgraded;

pub use upgraded::UpgradedConnection;
