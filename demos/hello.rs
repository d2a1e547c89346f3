//! Upgrade `GET /` and greet the client on the raw connection
//!
//! Run with: cargo run --example hello -- 8080

use http::Method;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ws_hijack::server::route;
use ws_hijack::{UpgradeConfig, Upgrader};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ws_hijack=debug,hello=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port = std::env::args()
        .nth(1)
        .ok_or("no arguments provided, must provide port")?;
    let addr = format!("0.0.0.0:{}", port.trim_start_matches(':'));

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(address = %listener.local_addr()?, "server running");

    let upgrader = Upgrader::new(UpgradeConfig::default());
    upgrader
        .serve_with_filter(listener, route(Method::GET, "/"), |mut conn, head| async move {
            let peer = conn.get_ref().peer_addr().ok();
            tracing::info!(path = %head.path, ?peer, "connection upgraded");
            if let Err(e) = conn.write_all(b"Hello, World!").await {
                tracing::warn!(error = %e, "failed to greet client");
            }
            conn.close().await.ok();
        })
        .await?;

    Ok(())
}
