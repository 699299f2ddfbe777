//! Resource resolution and fetching.
//!
//! [`resolve`] is pure: a URI becomes a [`ResourceTarget`] without touching the
//! network. [`ResourceResolver::fetch`] runs that target through the session.
//! Instance URIs are looked up through the collection's base filter, so a
//! record outside the collection is reported as not found.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use erpbridge_core::{
    BridgeError, BridgeResult, Clause, Domain, Operator, Page, Projection, QuerySpec, Record, RecordRef,
};
use erpbridge_session::SessionClient;

use crate::table::TABLES;
use crate::uri::{ResourceUri, DEFAULT_PAGE_LIMIT, SCHEME};

/// What a URI resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceTarget {
    Query(QuerySpec),
    /// One record: the base filter plus `id = key`, at most one row.
    Record(RecordRef, QuerySpec),
}

impl ResourceTarget {
    pub fn projection(&self) -> &Projection {
        match self {
            ResourceTarget::Query(spec) | ResourceTarget::Record(_, spec) => &spec.projection,
        }
    }

    pub fn collection(&self) -> &str {
        match self {
            ResourceTarget::Query(spec) | ResourceTarget::Record(_, spec) => &spec.collection,
        }
    }
}

/// Read-only result of a resource read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceView {
    pub collection: String,
    pub records: Vec<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<Page>,
}

/// Advertised entry of the resource catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub uri: String,
    pub record_uri: String,
    pub domain: Domain,
    pub collection: String,
    pub description: String,
    pub fields: Vec<String>,
}

pub struct ResourceResolver {
    client: Arc<SessionClient>,
}

impl ResourceResolver {
    pub fn new(client: Arc<SessionClient>) -> Self {
        Self { client }
    }

    /// Map a URI to its query or record reference. No remote call is made.
    pub fn resolve(&self, uri: &str) -> BridgeResult<ResourceTarget> {
        resolve(uri)
    }

    pub async fn fetch(&self, target: &ResourceTarget) -> BridgeResult<ResourceView> {
        let (records, page) = match target {
            ResourceTarget::Query(spec) => (self.client.search_read(spec).await?, Some(spec.page)),
            ResourceTarget::Record(reference, spec) => {
                let records = self.client.search_read(spec).await?;
                if records.is_empty() {
                    return Err(BridgeError::not_found(format!(
                        "{reference} does not exist or is outside the collection"
                    )));
                }
                (records, None)
            }
        };
        let records = records
            .into_iter()
            .map(|r| shape(r, target.projection()))
            .collect();
        Ok(ResourceView {
            collection: target.collection().to_string(),
            records,
            page,
        })
    }

    pub async fn read(&self, uri: &str) -> BridgeResult<ResourceView> {
        let target = self.resolve(uri)?;
        debug!(uri, collection = target.collection(), "reading resource");
        self.fetch(&target).await
    }

    pub fn catalog(&self) -> Vec<CatalogEntry> {
        catalog()
    }
}

/// Pure URI resolution.
pub fn resolve(uri: &str) -> BridgeResult<ResourceTarget> {
    let parsed = ResourceUri::parse(uri)?;
    let spec = parsed.collection;
    let projection = Projection::fields(spec.fields.iter().copied());
    Ok(match (parsed.key, parsed.page) {
        (Some(key), _) => ResourceTarget::Record(
            RecordRef::new(spec.model, key),
            QuerySpec::new(spec.model)
                .with_filter(spec.filter().with(Clause::new("id", Operator::Eq, key.get())))
                .with_projection(projection)
                .with_page(Page::bounded(0, 1)),
        ),
        (None, page) => ResourceTarget::Query(
            QuerySpec::new(spec.model)
                .with_filter(spec.filter())
                .with_projection(projection)
                .with_order(spec.order_by())
                .with_page(page.unwrap_or(Page::bounded(0, DEFAULT_PAGE_LIMIT))),
        ),
    })
}

pub fn catalog() -> Vec<CatalogEntry> {
    TABLES
        .iter()
        .flat_map(|t| {
            t.collections.iter().map(move |c| CatalogEntry {
                uri: format!("{SCHEME}://{}/{}", t.domain, c.segment),
                record_uri: format!("{SCHEME}://{}/{}/{{id}}", t.domain, c.segment),
                domain: t.domain,
                collection: c.model.to_string(),
                description: c.description.to_string(),
                fields: c.field_names(),
            })
        })
        .collect()
}

/// Keep only the projected fields, in projection order.
fn shape(mut record: Record, projection: &Projection) -> Record {
    match projection.as_fields() {
        None => record,
        Some(fields) => fields
            .iter()
            .filter_map(|f| record.remove(f).map(|v| (f.clone(), v)))
            .collect(),
    }
}
