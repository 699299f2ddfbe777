//! Outbound contract to the remote ERP backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::config::Credentials;
use crate::fault::RpcFault;

/// Proof of a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken {
    /// Backend user id.
    pub uid: i64,
    /// Opaque server-side session handle, when the transport has one.
    pub session_id: Option<String>,
}

impl SessionToken {
    pub fn new(uid: i64) -> Self {
        Self {
            uid,
            session_id: None,
        }
    }
}

/// One `execute` on a named collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCall {
    pub collection: String,
    pub method: String,
    pub args: Vec<JsonValue>,
    pub kwargs: Map<String, JsonValue>,
}

impl RemoteCall {
    pub fn new(collection: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            method: method.into(),
            args: Vec::new(),
            kwargs: Map::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<JsonValue>) -> Self {
        self.args = args;
        self
    }

    pub fn with_kwargs(mut self, kwargs: Map<String, JsonValue>) -> Self {
        self.kwargs = kwargs;
        self
    }
}

/// Remote-procedure interface of the backend.
///
/// Implementations only move bytes and classify failures; retry, timeouts and
/// session bookkeeping belong to [`crate::SessionClient`].
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    async fn authenticate(&self, credentials: &Credentials) -> Result<SessionToken, RpcFault>;

    async fn execute(
        &self,
        credentials: &Credentials,
        token: &SessionToken,
        call: &RemoteCall,
    ) -> Result<JsonValue, RpcFault>;
}
