use std::net::SocketAddr;
use std::sync::Arc;

use meetink_server::{AppState, app};
use tracing::{info, warn};

const DEFAULT_ADDR: &str = "0.0.0.0:3030";

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meetink_server=info,tower_http=info".into()),
        )
        .init();

    let addr = listen_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("meetink relay server listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, app(Arc::new(AppState::new()))).await
}

/// `MEETINK_ADDR`, falling back to the default when unset or unparsable.
fn listen_addr() -> SocketAddr {
    let default = SocketAddr::from(([0, 0, 0, 0], 3030));
    match std::env::var("MEETINK_ADDR") {
        Ok(value) => value.parse().unwrap_or_else(|e| {
            warn!("Ignoring MEETINK_ADDR={}: {}, using {}", value, e, DEFAULT_ADDR);
            default
        }),
        Err(_) => default,
    }
}
