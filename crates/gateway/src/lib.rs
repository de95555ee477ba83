//! HTTP API gateway for tabletalk.
//!
//! Endpoints:
//!
//! - `POST /api/chat`           — Send a message, get the agent's response
//! - `GET  /api/tables`         — Dataset summary (cached)
//! - `GET  /api/tables/{name}`  — Sample rows + description for one table
//! - `GET  /api/health`         — Liveness probe

pub mod api;

pub use api::{router, GatewayState, SharedState};

use std::net::SocketAddr;

/// Bind and serve the gateway until the process exits.
pub async fn serve(state: SharedState, addr: SocketAddr) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Gateway listening");
    axum::serve(listener, app).await
}
