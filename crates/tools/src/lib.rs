//! `erpbridge-tools`: the fixed set of named, schema-validated operations.
//!
//! Every invocation is validated against its declared [`ToolSignature`]
//! before any remote call. Search tools go through a [`QuerySpec`](erpbridge_core::QuerySpec),
//! create tools send one `create` carrying every line, analysis tools fetch
//! their inputs and hand them to `erpbridge-analytics`.

mod accounting;
mod common;
pub mod executor;
mod inventory;
mod purchase;
pub mod registry;
mod sales;
pub mod schema;
pub mod search;
pub mod validate;

#[cfg(test)]
mod test_support;

pub use executor::ToolExecutor;
pub use registry::{describe, find, signatures};
pub use schema::{Bound, ParamSpec, ParamType, ToolId, ToolKind, ToolSignature};
pub use validate::{validate, Params};
