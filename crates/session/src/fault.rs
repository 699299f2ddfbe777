//! Raw transport faults and their classification.
//!
//! A transport reports every failure as an [`RpcFault`]. The session client
//! decides from the fault kind whether to retry, re-authenticate or surface it.

use serde_json::Value as JsonValue;
use thiserror::Error;

use erpbridge_core::{BridgeError, RemoteCallError, RemoteErrorKind};

use crate::transport::RemoteCall;

/// JSON-RPC error code the backend uses for an expired session.
pub const SESSION_EXPIRED_CODE: i64 = 100;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FaultKind {
    Network,
    Authentication,
    SessionExpired,
    Validation,
    Permission,
    NotFound,
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("{kind:?}: {message}")]
pub struct RpcFault {
    pub kind: FaultKind,
    /// Only set for network faults that are worth another attempt
    /// (timeouts, resets, gateway errors).
    pub retryable: bool,
    pub message: String,
    /// Backend error payload, verbatim.
    pub payload: JsonValue,
}

impl RpcFault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            retryable: false,
            message: message.into(),
            payload: JsonValue::Null,
        }
    }

    /// Transient network failure.
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            retryable: true,
            ..Self::new(FaultKind::Network, message)
        }
    }

    /// Network-level failure that another attempt will not fix.
    pub fn broken(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Network, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Authentication, message)
    }

    pub fn session_expired(message: impl Into<String>) -> Self {
        Self::new(FaultKind::SessionExpired, message)
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload = payload;
        self
    }

    /// Classify a JSON-RPC `error` object returned by the backend.
    ///
    /// The backend reports `{"code", "message", "data": {"name", "message"}}`
    /// where `data.name` is the fully qualified exception class.
    pub fn from_backend_error(error: &JsonValue) -> Self {
        let code = error.get("code").and_then(JsonValue::as_i64);
        let data = error.get("data");
        let name = data
            .and_then(|d| d.get("name"))
            .and_then(JsonValue::as_str)
            .unwrap_or_default();
        let message = data
            .and_then(|d| d.get("message"))
            .and_then(JsonValue::as_str)
            .filter(|m| !m.is_empty())
            .or_else(|| error.get("message").and_then(JsonValue::as_str))
            .unwrap_or("backend error")
            .to_string();

        let class = name.rsplit('.').next().unwrap_or_default();
        let kind = if code == Some(SESSION_EXPIRED_CODE) || class == "SessionExpiredException" {
            FaultKind::SessionExpired
        } else {
            match class {
                "AccessDenied" => FaultKind::Authentication,
                "AccessError" => FaultKind::Permission,
                "MissingError" => FaultKind::NotFound,
                _ => FaultKind::Validation,
            }
        };

        Self::new(kind, message).with_payload(error.clone())
    }

    /// Translate into the caller-visible taxonomy with call context.
    pub fn into_bridge_error(self, call: &RemoteCall) -> BridgeError {
        let remote_kind = match self.kind {
            FaultKind::Authentication | FaultKind::SessionExpired => {
                return BridgeError::authentication(format!(
                    "{}.{}: {}",
                    call.collection, call.method, self.message
                ));
            }
            FaultKind::Network => RemoteErrorKind::Network,
            FaultKind::Validation => RemoteErrorKind::Validation,
            FaultKind::Permission => RemoteErrorKind::Permission,
            FaultKind::NotFound => RemoteErrorKind::NotFound,
        };
        BridgeError::RemoteCall(RemoteCallError {
            kind: remote_kind,
            collection: call.collection.clone(),
            method: call.method.clone(),
            message: self.message,
            payload: self.payload,
        })
    }
}
