//! Resource URI grammar.
//!
//! ```text
//! odoo://{domain}/{collection}                   first page of a collection
//! odoo://{domain}/{collection}?offset=N&limit=M  explicit page
//! odoo://{domain}/{collection}/{id}              one record
//! ```
//!
//! Only the canonical spelling is accepted, so two distinct strings never
//! address the same query.

use erpbridge_core::{BridgeError, BridgeResult, Domain, Page, RecordId};

use crate::table::{lookup, CollectionSpec};

pub const SCHEME: &str = "odoo";
pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceUri {
    pub domain: Domain,
    pub collection: &'static CollectionSpec,
    pub key: Option<RecordId>,
    /// Present for collection URIs only.
    pub page: Option<Page>,
}

impl ResourceUri {
    pub fn list(domain: Domain, collection: &'static CollectionSpec, offset: u32, limit: u32) -> Self {
        Self {
            domain,
            collection,
            key: None,
            page: Some(Page::bounded(offset, limit)),
        }
    }

    pub fn record(domain: Domain, collection: &'static CollectionSpec, key: RecordId) -> Self {
        Self {
            domain,
            collection,
            key: Some(key),
            page: None,
        }
    }

    /// Parse and insist on the canonical spelling.
    pub fn parse(raw: &str) -> BridgeResult<Self> {
        let parsed = Self::parse_lenient(raw)?;
        let canonical = parsed.to_string();
        if canonical != raw {
            return Err(BridgeError::uri(format!(
                "'{raw}' is not in canonical form; use '{canonical}'"
            )));
        }
        Ok(parsed)
    }

    fn parse_lenient(raw: &str) -> BridgeResult<Self> {
        let (scheme, rest) = raw
            .split_once("://")
            .ok_or_else(|| BridgeError::uri(format!("'{raw}' is not a resource URI")))?;
        if !scheme.eq_ignore_ascii_case(SCHEME) {
            return Err(BridgeError::uri(format!(
                "unsupported scheme '{scheme}' in '{raw}' (expected '{SCHEME}')"
            )));
        }

        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };
        let segments: Vec<&str> = path.trim_end_matches('/').split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(BridgeError::uri(format!("empty path segment in '{raw}'")));
        }

        let domain: Domain = segments[0]
            .to_ascii_lowercase()
            .parse()
            .map_err(|_| BridgeError::uri(format!("unknown domain '{}' in '{raw}'", segments[0])))?;
        let segment = segments
            .get(1)
            .ok_or_else(|| BridgeError::uri(format!("'{raw}' names no collection")))?;
        let collection = lookup(domain, segment).ok_or_else(|| {
            BridgeError::uri(format!("unknown collection '{segment}' in domain '{domain}'"))
        })?;

        match segments.len() {
            2 => {
                let (offset, limit) = parse_page(query.unwrap_or_default(), raw)?;
                Ok(Self::list(domain, collection, offset, limit))
            }
            3 => {
                let key: RecordId = segments[2].parse().map_err(|_| {
                    BridgeError::uri(format!(
                        "instance key '{}' in '{raw}' is not a positive integer",
                        segments[2]
                    ))
                })?;
                if query.is_some() {
                    return Err(BridgeError::uri(format!(
                        "record URI '{raw}' does not take query parameters"
                    )));
                }
                Ok(Self::record(domain, collection, key))
            }
            _ => Err(BridgeError::uri(format!("too many path segments in '{raw}'"))),
        }
    }
}

fn parse_page(query: &str, raw: &str) -> BridgeResult<(u32, u32)> {
    let mut offset = None;
    let mut limit = None;
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| BridgeError::uri(format!("malformed query parameter '{pair}' in '{raw}'")))?;
        let slot = match key {
            "offset" => &mut offset,
            "limit" => &mut limit,
            other => {
                return Err(BridgeError::uri(format!(
                    "unknown query parameter '{other}' in '{raw}' (expected offset, limit)"
                )));
            }
        };
        if slot.is_some() {
            return Err(BridgeError::uri(format!("duplicate query parameter '{key}' in '{raw}'")));
        }
        let n: u32 = value.parse().map_err(|_| {
            BridgeError::uri(format!("{key} '{value}' in '{raw}' is not a non-negative integer"))
        })?;
        *slot = Some(n);
    }

    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    if limit == 0 || limit > MAX_PAGE_LIMIT {
        return Err(BridgeError::uri(format!(
            "limit must be between 1 and {MAX_PAGE_LIMIT}, got {limit}"
        )));
    }
    Ok((offset.unwrap_or(0), limit))
}

impl core::fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{SCHEME}://{}/{}", self.domain, self.collection.segment)?;
        if let Some(key) = self.key {
            return write!(f, "/{key}");
        }
        let page = self.page.unwrap_or(Page::bounded(0, DEFAULT_PAGE_LIMIT));
        let limit = page.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        let mut params = Vec::new();
        if page.offset != 0 {
            params.push(format!("offset={}", page.offset));
        }
        if limit != DEFAULT_PAGE_LIMIT {
            params.push(format!("limit={limit}"));
        }
        if !params.is_empty() {
            write!(f, "?{}", params.join("&"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri_error(raw: &str) -> String {
        match ResourceUri::parse(raw) {
            Err(BridgeError::UriResolution(m)) => m,
            other => panic!("expected a resolution error for {raw}, got {other:?}"),
        }
    }

    #[test]
    fn parses_list_and_record_forms() {
        let list = ResourceUri::parse("odoo://sales/orders").unwrap();
        assert_eq!(list.collection.model, "sale.order");
        assert_eq!(list.page, Some(Page::bounded(0, DEFAULT_PAGE_LIMIT)));

        let paged = ResourceUri::parse("odoo://purchase/orders?offset=40&limit=50").unwrap();
        assert_eq!(paged.page, Some(Page::bounded(40, 50)));

        let record = ResourceUri::parse("odoo://accounting/journal-entries/17").unwrap();
        assert_eq!(record.key.map(|k| k.get()), Some(17));
        assert_eq!(record.page, None);
    }

    #[test]
    fn rejects_non_numeric_and_non_positive_keys() {
        assert!(uri_error("odoo://sales/orders/abc").contains("not a positive integer"));
        assert!(uri_error("odoo://sales/orders/0").contains("not a positive integer"));
        assert!(uri_error("odoo://sales/orders/-4").contains("not a positive integer"));
        assert!(uri_error("odoo://sales/orders/007").contains("not a positive integer"));
    }

    #[test]
    fn rejects_unknown_parts() {
        assert!(uri_error("http://sales/orders").contains("scheme"));
        assert!(uri_error("odoo://hr/employees").contains("unknown domain"));
        assert!(uri_error("odoo://sales/invoices").contains("unknown collection"));
        assert!(uri_error("odoo://sales").contains("no collection"));
        assert!(uri_error("odoo://sales/orders/1/lines").contains("too many"));
        assert!(uri_error("odoo://sales/orders?page=2").contains("unknown query parameter"));
        assert!(uri_error("odoo://sales/orders?limit=500").contains("between 1 and"));
        assert!(uri_error("odoo://sales/orders?limit=0").contains("between 1 and"));
        assert!(uri_error("odoo://sales/orders/3?limit=5").contains("does not take"));
    }

    #[test]
    fn non_canonical_spellings_are_rejected_with_the_canonical_form() {
        for raw in [
            "ODOO://sales/orders",
            "odoo://Sales/orders",
            "odoo://sales/orders/",
            "odoo://sales/orders?limit=20",
            "odoo://sales/orders?offset=0",
            "odoo://sales/orders?limit=5&offset=10",
        ] {
            let message = uri_error(raw);
            assert!(message.contains("canonical"), "{raw}: {message}");
        }
        assert!(uri_error("odoo://sales/orders?limit=5&offset=10").contains("odoo://sales/orders?offset=10&limit=5"));
    }

    #[test]
    fn display_round_trips_canonical_uris() {
        for raw in [
            "odoo://sales/customers",
            "odoo://inventory/quants?offset=20",
            "odoo://inventory/moves?limit=200",
            "odoo://purchase/suppliers/9",
        ] {
            assert_eq!(ResourceUri::parse(raw).unwrap().to_string(), raw);
        }
    }
}
