use std::sync::Arc;

use anyhow::{anyhow, Context};
use tokio::io::BufReader;

use erpbridge_server::{harness, Bridge};
use erpbridge_session::{JsonRpcTransport, SessionConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    erpbridge_observability::init();

    let config = SessionConfig::load().context("loading backend configuration")?;
    tracing::info!(
        endpoint = %config.credentials.endpoint,
        database = %config.credentials.database,
        "starting bridge"
    );

    let transport = JsonRpcTransport::new(config.timeout)
        .map_err(|fault| anyhow!("building HTTP transport: {}", fault.message))?;
    let bridge = Arc::new(Bridge::new(config, Arc::new(transport))?);

    let served = harness::serve(
        bridge.clone(),
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await;

    bridge.shutdown().await;
    tracing::info!(stats = ?bridge.stats(), "bridge stopped");
    served.context("serving requests")
}
