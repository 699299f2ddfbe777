//! Error taxonomy shared by every layer of the bridge.

use serde_json::Value as JsonValue;
use thiserror::Error;

/// Result type used across the bridge.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Subtype of a failed remote call.
///
/// `Network` is the only transient kind; the session client retries it.
/// Everything else is a terminal answer from the backend.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RemoteErrorKind {
    Network,
    Validation,
    Permission,
    NotFound,
}

impl RemoteErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteErrorKind::Network => "network",
            RemoteErrorKind::Validation => "validation",
            RemoteErrorKind::Permission => "permission",
            RemoteErrorKind::NotFound => "not_found",
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteErrorKind::Network)
    }
}

/// A remote call that the backend (or the network) rejected.
///
/// Carries the backend payload verbatim plus the collection/method context.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{} error calling {collection}.{method}: {message}", .kind.as_str())]
pub struct RemoteCallError {
    pub kind: RemoteErrorKind,
    pub collection: String,
    pub method: String,
    pub message: String,
    pub payload: JsonValue,
}

/// Error crossing the core's outward boundary.
///
/// Every variant maps to a stable machine-readable code via [`BridgeError::kind`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BridgeError {
    /// Credentials rejected, endpoint unreachable at login, or the session
    /// could not be re-established after expiry. Never retried.
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("{0}")]
    RemoteCall(RemoteCallError),

    /// Malformed, unrecognized or non-canonical resource URI.
    #[error("cannot resolve uri: {0}")]
    UriResolution(String),

    /// Malformed tool or prompt parameters.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A metric cannot be computed from the data at hand.
    #[error("insufficient data: {0}")]
    InsufficientData(String),
}

impl BridgeError {
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    pub fn uri(msg: impl Into<String>) -> Self {
        Self::UriResolution(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        Self::InsufficientData(msg.into())
    }

    /// Machine-readable error code.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::Authentication(_) => "authentication_error",
            BridgeError::RemoteCall(e) => match e.kind {
                RemoteErrorKind::Network => "remote_call_error.network",
                RemoteErrorKind::Validation => "remote_call_error.validation",
                RemoteErrorKind::Permission => "remote_call_error.permission",
                RemoteErrorKind::NotFound => "remote_call_error.not_found",
            },
            BridgeError::UriResolution(_) => "uri_resolution_error",
            BridgeError::Validation(_) => "validation_error",
            BridgeError::NotFound(_) => "not_found_error",
            BridgeError::InsufficientData(_) => "insufficient_data_error",
        }
    }
}

impl From<RemoteCallError> for BridgeError {
    fn from(value: RemoteCallError) -> Self {
        Self::RemoteCall(value)
    }
}
