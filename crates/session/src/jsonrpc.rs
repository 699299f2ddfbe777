//! JSON-RPC transport over HTTP (`POST {endpoint}/jsonrpc`).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value as JsonValue};
use url::Url;
use uuid::Uuid;

use crate::config::Credentials;
use crate::fault::RpcFault;
use crate::transport::{RemoteCall, RpcTransport, SessionToken};

pub struct JsonRpcTransport {
    http: reqwest::Client,
}

impl JsonRpcTransport {
    pub fn new(timeout: Duration) -> Result<Self, RpcFault> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcFault::broken(format!("cannot build http client: {e}")))?;
        Ok(Self { http })
    }

    fn rpc_url(endpoint: &Url) -> Result<Url, RpcFault> {
        endpoint
            .join("jsonrpc")
            .map_err(|e| RpcFault::broken(format!("invalid endpoint {endpoint}: {e}")))
    }

    async fn post(
        &self,
        endpoint: &Url,
        service: &str,
        method: &str,
        args: Vec<JsonValue>,
    ) -> Result<JsonValue, RpcFault> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "params": {"service": service, "method": method, "args": args},
            "id": Uuid::now_v7().to_string(),
        });

        let response = self
            .http
            .post(Self::rpc_url(endpoint)?)
            .json(&body)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = format!("backend answered HTTP {status}");
            return Err(match status.as_u16() {
                502..=504 => RpcFault::transient(message),
                _ => RpcFault::broken(message),
            });
        }

        let envelope: JsonValue = response
            .json()
            .await
            .map_err(|e| RpcFault::broken(format!("undecodable response: {e}")))?;

        if let Some(error) = envelope.get("error") {
            return Err(RpcFault::from_backend_error(error));
        }
        match envelope.get("result") {
            Some(result) => Ok(result.clone()),
            None => Err(RpcFault::broken("response carries neither result nor error")),
        }
    }
}

fn classify_send_error(e: reqwest::Error) -> RpcFault {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        RpcFault::transient(format!("request failed: {e}"))
    } else {
        RpcFault::broken(format!("request failed: {e}"))
    }
}

#[async_trait]
impl RpcTransport for JsonRpcTransport {
    async fn authenticate(&self, credentials: &Credentials) -> Result<SessionToken, RpcFault> {
        let result = self
            .post(
                &credentials.endpoint,
                "common",
                "authenticate",
                vec![
                    json!(credentials.database),
                    json!(credentials.username),
                    json!(credentials.password()),
                    JsonValue::Object(Map::new()),
                ],
            )
            .await?;

        match result.as_i64() {
            Some(uid) if uid > 0 => Ok(SessionToken::new(uid)),
            _ => Err(RpcFault::authentication(format!(
                "login rejected for user '{}' on database '{}'",
                credentials.username, credentials.database
            ))),
        }
    }

    async fn execute(
        &self,
        credentials: &Credentials,
        token: &SessionToken,
        call: &RemoteCall,
    ) -> Result<JsonValue, RpcFault> {
        self.post(
            &credentials.endpoint,
            "object",
            "execute_kw",
            vec![
                json!(credentials.database),
                json!(token.uid),
                json!(credentials.password()),
                json!(call.collection),
                json!(call.method),
                JsonValue::Array(call.args.clone()),
                JsonValue::Object(call.kwargs.clone()),
            ],
        )
        .await
    }
}
