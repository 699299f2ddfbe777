//! `erpbridge-session`: authenticated access to the remote ERP backend.
//!
//! - [`SessionClient`]: the single process-wide session with retry, timeouts
//!   and serialized re-authentication
//! - [`RpcTransport`]: the outbound seam, implemented by [`JsonRpcTransport`]
//!   for real backends and [`ScriptedTransport`] for tests
//! - [`SessionConfig`]: endpoint and credentials from file and environment

pub mod client;
pub mod config;
pub mod fault;
pub mod jsonrpc;
pub mod retry;
pub mod scripted;
pub mod transport;

pub use client::{ClientStats, Session, SessionClient, SessionState};
pub use config::{ConfigError, Credentials, SessionConfig};
pub use fault::{FaultKind, RpcFault};
pub use jsonrpc::JsonRpcTransport;
pub use retry::RetryPolicy;
pub use scripted::ScriptedTransport;
pub use transport::{RemoteCall, RpcTransport, SessionToken};
