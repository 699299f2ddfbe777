//! `erpbridge-server`: the inbound contract of the bridge.
//!
//! [`Bridge`] exposes `resolve_resource`, `invoke_tool` and `render_prompt`;
//! [`harness`] drives it from line-delimited JSON requests.

pub mod bridge;
pub mod dto;
pub mod harness;
pub mod outcome;

pub use bridge::Bridge;
pub use outcome::{ErrorBody, Outcome};
