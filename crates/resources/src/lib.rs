//! `erpbridge-resources`: URI-addressable read views over the backend.
//!
//! A resource URI maps through a static per-domain table to exactly one
//! [`QuerySpec`](erpbridge_core::QuerySpec) or record reference, which the
//! resolver then fetches through the shared session.

pub mod resolver;
pub mod table;
pub mod uri;

pub use resolver::{catalog, resolve, CatalogEntry, ResourceResolver, ResourceTarget, ResourceView};
pub use table::{lookup, CollectionSpec, DomainTable, TABLES};
pub use uri::{ResourceUri, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT, SCHEME};
