use std::sync::Arc;

use serde_json::Value as JsonValue;

use erpbridge_core::BridgeResult;
use erpbridge_session::{Credentials, RetryPolicy, ScriptedTransport, SessionClient, SessionConfig};

use crate::executor::ToolExecutor;

pub(crate) fn client_with(transport: ScriptedTransport) -> (Arc<SessionClient>, Arc<ScriptedTransport>) {
    let transport = Arc::new(transport);
    let config = SessionConfig::new(Credentials::new(
        "http://localhost:8069".parse().unwrap(),
        "test",
        "admin",
        "admin",
    ))
    .with_retry(RetryPolicy::immediate(1));
    (Arc::new(SessionClient::new(config, transport.clone())), transport)
}

pub(crate) async fn invoke(client: &Arc<SessionClient>, tool: &str, params: JsonValue) -> BridgeResult<JsonValue> {
    ToolExecutor::new(client.clone()).invoke(tool, params).await
}
