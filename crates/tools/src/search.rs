//! Shared search-tool plumbing: shortcut filters, paging and ordering.

use serde_json::{json, Value as JsonValue};

use erpbridge_core::{
    BridgeError, BridgeResult, Clause, Filter, Operator, OrderBy, Page, Projection, QuerySpec, Record,
};
use erpbridge_session::SessionClient;

use crate::validate::Params;

pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 200;

/// What a search tool searches.
pub(crate) struct SearchShape {
    pub collection: &'static str,
    /// Field the `date_from` / `date_to` shortcuts apply to.
    pub date_field: &'static str,
    /// `date_field` is a datetime, so `date_to` must cover the whole day.
    pub datetime: bool,
    pub fields: &'static [&'static str],
    pub default_order: &'static str,
    /// Shortcut parameters mapped one-to-one onto equality clauses.
    pub shortcuts: &'static [&'static str],
}

impl SearchShape {
    pub fn query(&self, params: &Params) -> BridgeResult<QuerySpec> {
        let mut filter = Filter::match_all();
        for &name in self.shortcuts {
            if let Some(value) = params.get(name) {
                filter.push(Clause::new(name, Operator::Eq, value.clone()));
            }
        }
        if let Some(from) = params.str("date_from") {
            filter.push(Clause::new(self.date_field, Operator::Ge, from));
        }
        if let Some(to) = params.str("date_to") {
            let to = if self.datetime { format!("{to} 23:59:59") } else { to.to_string() };
            filter.push(Clause::new(self.date_field, Operator::Le, to));
        }
        filter.extend(&params.filters("filters")?);

        let order = match params.str("order") {
            Some(raw) => OrderBy::parse_list(raw)?,
            None => OrderBy::parse_list(self.default_order)?,
        };

        Ok(QuerySpec::new(self.collection)
            .with_filter(filter)
            .with_projection(Projection::fields(self.fields.iter().copied()))
            .with_order(order)
            .with_page(page(params)?))
    }
}

fn page(params: &Params) -> BridgeResult<Page> {
    let limit = match params.int("limit") {
        None => DEFAULT_LIMIT,
        Some(n) => u32::try_from(n)
            .ok()
            .filter(|n| *n <= MAX_LIMIT)
            .ok_or_else(|| BridgeError::validation(format!("limit must be between 1 and {MAX_LIMIT}, got {n}")))?,
    };
    let offset = match params.int("offset") {
        None => 0,
        Some(n) => u32::try_from(n)
            .map_err(|_| BridgeError::validation(format!("offset {n} is out of range")))?,
    };
    Ok(Page::bounded(offset, limit))
}

/// Run the page query plus the matching total.
pub(crate) async fn run(client: &SessionClient, spec: &QuerySpec) -> BridgeResult<(Vec<Record>, u64)> {
    let records = client.search_read(spec).await?;
    let total = client.search_count(&spec.collection, &spec.filter).await?;
    Ok((records, total))
}

pub(crate) fn envelope(spec: &QuerySpec, records: Vec<Record>, total: u64) -> JsonValue {
    json!({
        "count": records.len(),
        "total_count": total,
        "offset": spec.page.offset,
        "limit": spec.page.limit,
        "records": records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::find;
    use crate::validate::validate;

    const SHAPE: SearchShape = SearchShape {
        collection: "sale.order",
        date_field: "date_order",
        datetime: true,
        fields: &["name", "partner_id"],
        default_order: "date_order desc",
        shortcuts: &["partner_id", "state"],
    };

    fn params(raw: JsonValue) -> Params {
        let sig = find("search_sales_orders").unwrap();
        validate(sig, &raw).unwrap()
    }

    #[test]
    fn shortcuts_and_generic_filters_combine() {
        let spec = SHAPE
            .query(&params(json!({
                "partner_id": 7,
                "date_from": "2024-01-01",
                "date_to": "2024-01-31",
                "state": "sale",
                "filters": [{"field": "amount_total", "operator": ">", "value": 500}]
            })))
            .unwrap();
        assert_eq!(
            spec.filter.to_domain(),
            json!([
                ["partner_id", "=", 7],
                ["state", "=", "sale"],
                ["date_order", ">=", "2024-01-01"],
                ["date_order", "<=", "2024-01-31 23:59:59"],
                ["amount_total", ">", 500]
            ])
        );
        assert_eq!(spec.order, vec![OrderBy::desc("date_order")]);
        assert_eq!(spec.page, Page::bounded(0, DEFAULT_LIMIT));
    }

    #[test]
    fn paging_and_ordering_are_checked() {
        let spec = SHAPE
            .query(&params(json!({"limit": 50, "offset": 100, "order": "name asc, id desc"})))
            .unwrap();
        assert_eq!(spec.page, Page::bounded(100, 50));
        assert_eq!(spec.order, vec![OrderBy::asc("name"), OrderBy::desc("id")]);

        let err = SHAPE.query(&params(json!({"limit": 500}))).unwrap_err();
        assert!(matches!(err, BridgeError::Validation(_)));
        let err = SHAPE.query(&params(json!({"order": "name; drop"}))).unwrap_err();
        assert!(matches!(err, BridgeError::Validation(_)));
    }

    #[test]
    fn no_parameters_means_match_all() {
        let spec = SHAPE.query(&params(JsonValue::Null)).unwrap();
        assert!(spec.filter.is_match_all());
    }
}
