//! Purchase tools.

use serde_json::{json, Map, Value as JsonValue};
use tracing::debug;

use erpbridge_analytics::{supplier_performance, PurchaseObservation, DEFAULT_TOP_N};
use erpbridge_core::record::{date_of, f64_of, id_of};
use erpbridge_core::{BridgeResult, Clause, Filter, Operator, Page, Projection, QuerySpec};
use erpbridge_session::SessionClient;

use crate::common::{copy_present, create_command, created_summary, group_key, to_json, window};
use crate::search::{self, SearchShape};
use crate::validate::Params;

const ORDERS: SearchShape = SearchShape {
    collection: "purchase.order",
    date_field: "date_order",
    datetime: true,
    fields: &[
        "name",
        "partner_id",
        "date_order",
        "date_planned",
        "amount_total",
        "state",
        "user_id",
        "invoice_status",
    ],
    default_order: "date_order desc",
    shortcuts: &["partner_id", "state"],
};

const CONFIRMED_STATES: [&str; 2] = ["purchase", "done"];

pub(crate) async fn search_orders(client: &SessionClient, params: &Params) -> BridgeResult<JsonValue> {
    let spec = ORDERS.query(params)?;
    let (records, total) = search::run(client, &spec).await?;
    Ok(search::envelope(&spec, records, total))
}

pub(crate) async fn create_order(client: &SessionClient, params: &Params) -> BridgeResult<JsonValue> {
    let lines: Vec<JsonValue> = params
        .objects("order_lines")
        .iter()
        .map(|line| {
            let mut values = Map::new();
            copy_present(line, &["product_id", "product_qty", "price_unit"], &mut values);
            create_command(values)
        })
        .collect();

    let mut values = Map::new();
    values.insert("partner_id".into(), json!(params.require_int("partner_id")?));
    values.insert("order_line".into(), JsonValue::Array(lines));
    copy_present(params, &["date_order"], &mut values);

    let id = client.create(ORDERS.collection, values).await?;
    Ok(created_summary(client, ORDERS.collection, id, &["name", "state", "amount_total"]).await)
}

pub(crate) async fn analyze_suppliers(client: &SessionClient, params: &Params) -> BridgeResult<JsonValue> {
    let window = window(params)?;
    let top_n = params.int("top_n").map(|n| n as usize).unwrap_or(DEFAULT_TOP_N);

    let mut filter = Filter::match_all()
        .with(Clause::new("state", Operator::In, json!(CONFIRMED_STATES)))
        .with(Clause::new("date_order", Operator::Ge, window.from_date_str()))
        .with(Clause::new("date_order", Operator::Le, window.to_end_of_day()));
    if let Some(ids) = params.int_list("supplier_ids") {
        filter.push(Clause::new("partner_id", Operator::In, json!(ids)));
    }
    let spec = QuerySpec::new(ORDERS.collection)
        .with_filter(filter)
        .with_projection(Projection::fields([
            "name",
            "partner_id",
            "date_order",
            "amount_total",
            "date_planned",
            "effective_date",
        ]))
        .with_page(Page::unbounded());
    let orders = client.search_read(&spec).await?;
    debug!(orders = orders.len(), "fetched purchase orders for supplier analysis");

    let observations: Vec<PurchaseObservation> = orders
        .iter()
        .filter_map(|order| {
            Some(PurchaseObservation {
                order_id: id_of(order)?,
                supplier: group_key(order, "partner_id"),
                order_date: date_of(order, "date_order")?,
                amount: f64_of(order, "amount_total").unwrap_or_default(),
                planned: date_of(order, "date_planned"),
                received: date_of(order, "effective_date"),
            })
        })
        .collect();

    to_json(&supplier_performance(window, &observations, top_n)?)
}
