//! `erpbridge-core`: shared vocabulary of the ERP bridge.
//!
//! Pure types only (no IO): error taxonomy, record references, query
//! specifications, business domains and record field helpers.

pub mod domain;
pub mod error;
pub mod id;
pub mod query;
pub mod record;
pub mod window;

pub use domain::Domain;
pub use error::{BridgeError, BridgeResult, RemoteCallError, RemoteErrorKind};
pub use id::{RecordId, RecordRef};
pub use query::{Clause, Direction, Filter, Operator, OrderBy, Page, Projection, QuerySpec};
pub use record::{Many2One, Record};
pub use window::DateWindow;
