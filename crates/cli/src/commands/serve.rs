//! The `serve` command — run the HTTP gateway.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tabletalk_gateway::GatewayState;

use super::build_runtime;

pub async fn run(port: Option<u16>) -> anyhow::Result<()> {
    let runtime = build_runtime().await?;
    let gateway = &runtime.config.gateway;

    let addr: SocketAddr = format!("{}:{}", gateway.host, port.unwrap_or(gateway.port))
        .parse()?;

    let state = Arc::new(GatewayState::new(
        runtime.runner,
        runtime.grounding,
        runtime.config.grounding.sample_row_limit,
        Duration::from_secs(gateway.tables_cache_ttl_secs),
    ));

    tabletalk_gateway::serve(state, addr).await?;
    Ok(())
}
