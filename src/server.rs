//! Upgrade orchestrator
//!
//! [`Upgrader`] runs the opening handshake for one exchange at a time:
//!
//! ```text
//! Start → HeadersChecked → Hijacked → KeyDerived → ResponseSent
//!   └──────────┴──────────────┴───────────┴──────→ Failed
//! ```
//!
//! Nothing is retried. Failures before the hijack are answered through the
//! exchange's error response; after the hijack there is no HTTP pipeline left,
//! so the transport is shut down and dropped instead.
//!
//! # Example
//!
//! ```ignore
//! use ws_hijack::{Upgrader, UpgradeConfig};
//! use tokio::net::TcpListener;
//!
//! let listener = TcpListener::bind("0.0.0.0:8080").await?;
//! let upgrader = Upgrader::new(UpgradeConfig::default());
//!
//! upgrader.serve(listener, |mut conn, head| async move {
//!     println!("upgraded {}", head.path);
//!     conn.write_all(b"Hello, World!").await.ok();
//! }).await?;
//! ```

use std::fmt;
use std::future::Future;

use http::{Method, StatusCode};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::Instrument;

use crate::UpgradeConfig;
use crate::error::{Error, Result};
use crate::exchange::{Hijacked, HttpExchange, RawExchange};
use crate::handshake::{RequestHead, build_response, derive_accept_key, write_response};
use crate::headers::{check_headers, check_key};
use crate::stream::UpgradedConnection;

/// Progress of a single handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Nothing checked yet
    Start,
    /// Required headers validated
    HeadersChecked,
    /// Transport taken over from the HTTP layer
    Hijacked,
    /// Accept key computed
    KeyDerived,
    /// 101 response written; terminal success
    ResponseSent,
    /// Terminal failure
    Failed,
}

impl HandshakeState {
    fn advance(&mut self, next: HandshakeState) {
        tracing::trace!(from = %self, to = %next, "handshake state");
        *self = next;
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::HeadersChecked => "headers-checked",
            Self::Hijacked => "hijacked",
            Self::KeyDerived => "key-derived",
            Self::ResponseSent => "response-sent",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// WebSocket upgrade engine
///
/// Holds only the immutable [`UpgradeConfig`]; clone it freely into
/// per-connection tasks.
#[derive(Debug, Clone, Default)]
pub struct Upgrader {
    config: UpgradeConfig,
}

impl Upgrader {
    /// Create an upgrader with the given configuration
    pub fn new(config: UpgradeConfig) -> Self {
        if config.compression() {
            tracing::debug!("compression requested, but no extension negotiation is implemented");
        }
        Self { config }
    }

    /// Get the upgrader configuration
    pub fn config(&self) -> &UpgradeConfig {
        &self.config
    }

    /// Upgrade an HTTP exchange to a raw connection
    ///
    /// Validates the required headers and the client key, hijacks the
    /// transport, derives the accept key and writes the `101 Switching
    /// Protocols` response. On success the returned connection is the only
    /// owner of the transport.
    pub async fn upgrade<E>(&self, exchange: &mut E) -> Result<UpgradedConnection<E::Io>>
    where
        E: HttpExchange + Send,
    {
        let mut state = HandshakeState::Start;

        if let Err(violation) = check_headers(exchange.headers(), self.config.header_match()) {
            return Err(reject(exchange, state, violation.into()).await);
        }
        let key = check_key(exchange.headers(), self.config.validate_key()).cloned();
        let key = match key {
            Ok(key) => key,
            Err(violation) => return Err(reject(exchange, state, violation.into()).await),
        };
        state.advance(HandshakeState::HeadersChecked);

        let Hijacked { mut io, buffered } = match exchange.hijack() {
            Ok(hijacked) => hijacked,
            Err(err) => return Err(reject(exchange, state, err).await),
        };
        state.advance(HandshakeState::Hijacked);

        let accept_key = derive_accept_key(key.as_bytes(), self.config.digest());
        state.advance(HandshakeState::KeyDerived);

        let response = build_response(&accept_key, self.config.write_buffer_size());
        if let Err(e) = write_response(&mut io, &response).await {
            return Err(abandon(&mut io, state, Error::ResponseWrite(e)).await);
        }
        state.advance(HandshakeState::ResponseSent);

        tracing::debug!(buffered = buffered.len(), "websocket handshake complete");
        Ok(UpgradedConnection::new(io, buffered))
    }

    /// Read a request from a raw transport and upgrade it
    ///
    /// Every request with valid upgrade headers is accepted, whatever its
    /// method and path. Use [`accept_with_filter`](Self::accept_with_filter)
    /// to route.
    pub async fn accept<S>(&self, io: S) -> Result<(UpgradedConnection<S>, RequestHead)>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        self.accept_with_filter(io, |_: &RequestHead| Ok(())).await
    }

    /// Read a request from a raw transport and upgrade it if the filter allows
    ///
    /// The filter sees the request head before anything is written. A
    /// rejection is answered with the returned status and the transport is
    /// never hijacked.
    pub async fn accept_with_filter<S, Filter>(
        &self,
        io: S,
        filter: Filter,
    ) -> Result<(UpgradedConnection<S>, RequestHead)>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
        Filter: FnOnce(&RequestHead) -> std::result::Result<(), StatusCode>,
    {
        let mut exchange = RawExchange::read(io, &self.config).await?;

        if let Err(status) = filter(exchange.head()) {
            return Err(reject(&mut exchange, HandshakeState::Start, Error::Rejected(status)).await);
        }

        let conn = self.upgrade(&mut exchange).await?;
        Ok((conn, exchange.into_head()))
    }

    /// Serve WebSocket upgrades from a TCP listener
    ///
    /// Every accepted connection runs its handshake in its own task; the
    /// handler is called for each successful upgrade. Handshake failures are
    /// logged and do not stop the loop.
    pub async fn serve<F, Fut>(&self, listener: TcpListener, handler: F) -> Result<()>
    where
        F: Fn(UpgradedConnection<TcpStream>, RequestHead) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.serve_with_filter(listener, |_: &RequestHead| Ok(()), handler)
            .await
    }

    /// Serve WebSocket upgrades, routing each request through a filter first
    ///
    /// # Example
    ///
    /// ```ignore
    /// use http::Method;
    /// use ws_hijack::server::route;
    ///
    /// upgrader
    ///     .serve_with_filter(listener, route(Method::GET, "/"), |conn, _head| async move {
    ///         conn.close().await.ok();
    ///     })
    ///     .await?;
    /// ```
    pub async fn serve_with_filter<F, Fut, Filter>(
        &self,
        listener: TcpListener,
        filter: Filter,
        handler: F,
    ) -> Result<()>
    where
        F: Fn(UpgradedConnection<TcpStream>, RequestHead) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
        Filter: Fn(&RequestHead) -> std::result::Result<(), StatusCode> + Clone + Send + 'static,
    {
        loop {
            let (stream, peer) = listener.accept().await.map_err(Error::Io)?;

            let upgrader = self.clone();
            let handler = handler.clone();
            let filter = filter.clone();

            tokio::spawn(
                async move {
                    match upgrader.accept_with_filter(stream, filter).await {
                        Ok((conn, head)) => handler(conn, head).await,
                        Err(e) if e.is_client_error() => {
                            tracing::debug!(error = %e, "websocket handshake refused")
                        }
                        Err(e) => tracing::warn!(error = %e, "websocket handshake failed"),
                    }
                }
                .instrument(tracing::info_span!("ws_upgrade", %peer)),
            );
        }
    }
}

/// Filter that only lets one method and path through
///
/// Any other path gets `404 Not Found`; the right path with another method
/// gets `405 Method Not Allowed`. The query string is ignored.
pub fn route(
    method: Method,
    path: &'static str,
) -> impl Fn(&RequestHead) -> std::result::Result<(), StatusCode> + Clone + Send + Sync + 'static {
    move |head: &RequestHead| {
        let target = head.path.split('?').next().unwrap_or_default();
        if target != path {
            Err(StatusCode::NOT_FOUND)
        } else if head.method != method {
            Err(StatusCode::METHOD_NOT_ALLOWED)
        } else {
            Ok(())
        }
    }
}

/// Fail before the hijack: answer through the HTTP pipeline
async fn reject<E>(exchange: &mut E, mut state: HandshakeState, err: Error) -> Error
where
    E: HttpExchange + Send,
{
    tracing::warn!(
        failed_at = %state,
        status = err.status().as_u16(),
        error = %err,
        "websocket upgrade rejected"
    );

    if let Err(write_err) = exchange
        .write_error(err.status(), &err.response_message())
        .await
    {
        tracing::debug!(error = %write_err, "failed to write upgrade error response");
    }
    state.advance(HandshakeState::Failed);
    err
}

/// Fail after the hijack: the transport is ours, close it
async fn abandon<S>(io: &mut S, mut state: HandshakeState, err: Error) -> Error
where
    S: AsyncWrite + Unpin,
{
    tracing::warn!(failed_at = %state, error = %err, "websocket upgrade failed after hijack, closing connection");

    if let Err(shutdown_err) = io.shutdown().await {
        tracing::debug!(error = %shutdown_err, "failed to shut down hijacked connection");
    }
    state.advance(HandshakeState::Failed);
    err
}
