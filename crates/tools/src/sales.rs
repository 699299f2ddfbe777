//! Sales tools.

use std::collections::HashMap;

use serde_json::{json, Map, Value as JsonValue};
use tracing::debug;

use erpbridge_analytics::{sales_performance, Bucket, GroupKey, Observation, SalesDimension, DEFAULT_TOP_N};
use erpbridge_core::record::{date_of, f64_of, id_of, many2one_of};
use erpbridge_core::{BridgeResult, Clause, DateWindow, Filter, Operator, Page, Projection, QuerySpec, Record};
use erpbridge_session::SessionClient;

use crate::common::{copy_present, create_command, created_summary, group_key, to_json, window};
use crate::search::{self, SearchShape};
use crate::validate::Params;

const ORDERS: SearchShape = SearchShape {
    collection: "sale.order",
    date_field: "date_order",
    datetime: true,
    fields: &["name", "partner_id", "date_order", "amount_total", "state", "user_id", "invoice_status"],
    default_order: "date_order desc",
    shortcuts: &["partner_id", "state"],
};

/// Confirmed order states counted as revenue.
const REVENUE_STATES: [&str; 2] = ["sale", "done"];

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
            copy_present(line, &["product_id", "product_uom_qty", "price_unit"], &mut values);
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

fn dimension(params: &Params) -> SalesDimension {
    match params.str("group_by").unwrap_or("product") {
        "customer" => SalesDimension::Customer,
        "salesperson" => SalesDimension::Salesperson,
        other => Bucket::parse(other).map_or(SalesDimension::Product, SalesDimension::Period),
    }
}

fn confirmed_orders(window: DateWindow) -> QuerySpec {
    let filter = Filter::match_all()
        .with(Clause::new("state", Operator::In, json!(REVENUE_STATES)))
        .with(Clause::new("date_order", Operator::Ge, window.from_date_str()))
        .with(Clause::new("date_order", Operator::Le, window.to_end_of_day()));
    QuerySpec::new(ORDERS.collection)
        .with_filter(filter)
        .with_projection(Projection::fields(["name", "partner_id", "date_order", "amount_total", "user_id"]))
        .with_page(Page::unbounded())
}

fn order_observations(orders: &[Record], dimension: SalesDimension) -> Vec<Observation> {
    orders
        .iter()
        .filter_map(|order| {
            Some(Observation {
                record_id: id_of(order)?,
                group: match dimension {
                    SalesDimension::Salesperson => group_key(order, "user_id"),
                    _ => group_key(order, "partner_id"),
                },
                date: date_of(order, "date_order")?,
                amount: f64_of(order, "amount_total").unwrap_or_default(),
                quantity: 0.0,
            })
        })
        .collect()
}

/// Product observations: one per order line, dated by its order.
fn line_observations(lines: &[Record], order_dates: &HashMap<i64, chrono::NaiveDate>) -> Vec<Observation> {
    lines
        .iter()
        .filter_map(|line| {
            let order_id = many2one_of(line, "order_id")?.id;
            Some(Observation {
                record_id: order_id,
                group: many2one_of(line, "product_id")
                    .map(|p| GroupKey::new(p.id, p.name))
                    .unwrap_or_else(GroupKey::unassigned),
                date: *order_dates.get(&order_id)?,
                amount: f64_of(line, "price_subtotal").unwrap_or_default(),
                quantity: f64_of(line, "product_uom_qty").unwrap_or_default(),
            })
        })
        .collect()
}

pub(crate) async fn analyze_performance(client: &SessionClient, params: &Params) -> BridgeResult<JsonValue> {
    let window = window(params)?;
    let dimension = dimension(params);
    let top_n = params.int("top_n").map(|n| n as usize).unwrap_or(DEFAULT_TOP_N);

    let current_orders = client.search_read(&confirmed_orders(window)).await?;
    let previous_orders = client.search_read(&confirmed_orders(window.previous())).await?;
    debug!(
        current = current_orders.len(),
        previous = previous_orders.len(),
        "fetched orders for sales analysis"
    );

    let (current, previous) = if dimension == SalesDimension::Product {
        let mut dates = HashMap::new();
        for order in current_orders.iter().chain(&previous_orders) {
            if let (Some(id), Some(day)) = (id_of(order), date_of(order, "date_order")) {
                dates.insert(id, day);
            }
        }
        let current_ids: Vec<i64> = current_orders.iter().filter_map(id_of).collect();
        let all_ids: Vec<i64> = dates.keys().copied().collect();
        let lines = if all_ids.is_empty() {
            Vec::new()
        } else {
            let spec = QuerySpec::new("sale.order.line")
                .with_filter(Filter::match_all().with(Clause::new("order_id", Operator::In, json!(all_ids))))
                .with_projection(Projection::fields(["order_id", "product_id", "product_uom_qty", "price_subtotal"]))
                .with_page(Page::unbounded());
            client.search_read(&spec).await?
        };
        let observations = line_observations(&lines, &dates);
        observations
            .into_iter()
            .partition::<Vec<_>, _>(|o| current_ids.contains(&o.record_id))
    } else {
        (
            order_observations(&current_orders, dimension),
            order_observations(&previous_orders, dimension),
        )
    };

    let result = sales_performance(window, &current, &previous, dimension, top_n)?;
    to_json(&result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{client_with, invoke};
    use erpbridge_session::{FaultKind, RpcFault, ScriptedTransport};

    fn order(id: i64, partner: i64, day: &str, amount: f64) -> JsonValue {
        json!({
            "id": id,
            "name": format!("S{id:05}"),
            "partner_id": [partner, format!("Customer {partner}")],
            "user_id": false,
            "date_order": format!("{day} 10:00:00"),
            "amount_total": amount
        })
    }

    #[tokio::test]
    async fn ranks_customers_and_compares_with_previous_window() {
        let transport = ScriptedTransport::new(|call| {
            let domain = call.kwargs.get("domain").cloned().unwrap_or_default();
            let previous = domain.to_string().contains("2023-12");
            Ok(if previous {
                json!([order(9, 1, "2023-12-15", 850.0)])
            } else {
                json!([
                    order(1, 3, "2024-01-02", 300.0),
                    order(2, 1, "2024-01-03", 200.0),
                    order(3, 2, "2024-01-05", 700.0),
                    order(4, 3, "2024-01-09", 200.0),
                    order(5, 1, "2024-01-20", 300.0)
                ])
            })
        });
        let (client, transport) = client_with(transport);
        let out = invoke(
            &client,
            "analyze_sales_performance",
            json!({"date_from": "2024-01-01", "date_to": "2024-01-31", "group_by": "customer"}),
        )
        .await
        .unwrap();

        let ranking: Vec<i64> = out["metrics"]["ranking"]
            .as_array()
            .unwrap()
            .iter()
            .map(|g| g["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ranking, vec![2, 1, 3]);
        assert_eq!(out["window"]["record_count"], 5);
        assert_eq!(out["metrics"]["comparison"]["previous"], 850.0);
        assert_eq!(out["metrics"]["comparison"]["current"], 1700.0);
        assert_eq!(transport.calls_to("search_read").len(), 2);
    }

    #[tokio::test]
    async fn period_grouping_buckets_orders_by_week() {
        let transport = ScriptedTransport::answering(json!([
            order(1, 1, "2024-01-02", 300.0),
            order(2, 2, "2024-01-03", 200.0),
            order(3, 1, "2024-01-09", 50.0)
        ]));
        let (client, _) = client_with(transport);
        let out = invoke(
            &client,
            "analyze_sales_performance",
            json!({"date_from": "2024-01-01", "date_to": "2024-01-31", "group_by": "week"}),
        )
        .await
        .unwrap();

        let metrics = &out["metrics"];
        assert_eq!(metrics["dimension"], json!({"period": "week"}));
        assert!(metrics["ranking"].as_array().unwrap().is_empty());
        let trend = metrics["trend"].as_array().unwrap();
        assert_eq!(trend.len(), 2);
        assert_eq!(trend[0]["start"], "2024-01-01");
        assert_eq!(trend[0]["amount"], 500.0);
        assert_eq!(trend[1]["start"], "2024-01-08");
    }

    #[tokio::test]
    async fn product_breakdown_reads_lines_once() {
        let transport = ScriptedTransport::new(|call| {
            Ok(match call.collection.as_str() {
                "sale.order" => json!([order(1, 1, "2024-03-04", 120.0), order(2, 1, "2024-03-05", 80.0)]),
                _ => json!([
                    {"order_id": [1, "S00001"], "product_id": [10, "Desk"], "product_uom_qty": 1.0, "price_subtotal": 100.0},
                    {"order_id": [2, "S00002"], "product_id": [11, "Lamp"], "product_uom_qty": 2.0, "price_subtotal": 70.0},
                    {"order_id": [1, "S00001"], "product_id": [11, "Lamp"], "product_uom_qty": 1.0, "price_subtotal": 20.0}
                ]),
            })
        });
        let (client, transport) = client_with(transport);
        let out = invoke(
            &client,
            "analyze_sales_performance",
            json!({"date_from": "2024-03-01", "date_to": "2024-03-31"}),
        )
        .await
        .unwrap();

        let top = &out["metrics"]["ranking"][0];
        assert_eq!(top["id"], 10);
        assert_eq!(top["amount"], 100.0);
        assert_eq!(out["metrics"]["ranking"][1]["quantity"], 3.0);
        let line_calls = transport
            .calls()
            .into_iter()
            .filter(|c| c.collection == "sale.order.line")
            .count();
        assert_eq!(line_calls, 1);
    }

    #[tokio::test]
    async fn create_sends_all_lines_in_one_call() {
        let transport = ScriptedTransport::new(|call| {
            Ok(match call.method.as_str() {
                "create" => json!(42),
                _ => json!([{"id": 42, "name": "S00042", "state": "draft", "amount_total": 25.0}]),
            })
        });
        let (client, transport) = client_with(transport);
        let out = invoke(
            &client,
            "create_sales_order",
            json!({
                "partner_id": 3,
                "order_lines": [
                    {"product_id": 10, "product_uom_qty": 2, "price_unit": 5.0},
                    {"product_id": 11, "product_uom_qty": "1.5"}
                ]
            }),
        )
        .await
        .unwrap();
        assert_eq!(out["id"], 42);
        assert_eq!(out["name"], "S00042");

        let creates = transport.calls_to("create");
        assert_eq!(creates.len(), 1);
        let values = &creates[0].args[0];
        assert_eq!(values["order_line"][0], json!([0, 0, {"product_id": 10, "product_uom_qty": 2.0, "price_unit": 5.0}]));
        assert_eq!(values["order_line"][1], json!([0, 0, {"product_id": 11, "product_uom_qty": 1.5}]));
    }

    #[tokio::test]
    async fn failed_read_back_still_reports_the_created_id() {
        let transport = ScriptedTransport::new(|call| match call.method.as_str() {
            "create" => Ok(json!(42)),
            _ => Err(RpcFault::new(FaultKind::Permission, "AccessError")),
        });
        let (client, transport) = client_with(transport);
        let out = invoke(
            &client,
            "create_sales_order",
            json!({"partner_id": 3, "order_lines": [{"product_id": 10, "product_uom_qty": 1}]}),
        )
        .await
        .unwrap();

        assert_eq!(out["id"], 42);
        assert!(out["name"].is_null());
        assert!(out["warning"].as_str().unwrap().contains("sale.order(42) was created"));
        assert_eq!(transport.calls_to("create").len(), 1);
    }

    #[tokio::test]
    async fn invalid_line_creates_nothing() {
        let (client, transport) = client_with(ScriptedTransport::answering(json!(1)));
        let err = invoke(
            &client,
            "create_sales_order",
            json!({"partner_id": 3, "order_lines": [{"product_id": 10, "product_uom_qty": 0}]}),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "validation_error");
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn search_reports_page_and_total() {
        let transport = ScriptedTransport::new(|call| {
            Ok(match call.method.as_str() {
                "search_count" => json!(57),
                _ => json!([order(1, 1, "2024-01-02", 10.0)]),
            })
        });
        let (client, _) = client_with(transport);
        let out = invoke(&client, "search_sales_orders", json!({"state": "sale", "limit": 1}))
            .await
            .unwrap();
        assert_eq!(out["count"], 1);
        assert_eq!(out["total_count"], 57);
        assert_eq!(out["limit"], 1);
    }
}
