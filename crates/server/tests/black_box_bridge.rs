use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value as JsonValue};
use tokio::io::BufReader;

use erpbridge_server::{harness, Bridge};
use erpbridge_session::{Credentials, RetryPolicy, RpcFault, ScriptedTransport, SessionConfig};

fn backend() -> ScriptedTransport {
    ScriptedTransport::new(|call| {
        Ok(match (call.collection.as_str(), call.method.as_str()) {
            (_, "search_count") => json!(2),
            ("sale.order", "search_read") => json!([
                {"id": 7, "name": "S00007", "partner_id": [3, "Azure Interior"], "state": "sale", "amount_total": 120.0},
                {"id": 6, "name": "S00006", "partner_id": [4, "Deco Addict"], "state": "draft", "amount_total": 80.0}
            ]),
            ("product.product", "search_read") => json!([
                {"id": 12, "name": "Desk", "default_code": "D-1", "qty_available": 4.0, "secret_cost": 1.0}
            ]),
            _ => json!([]),
        })
    })
}

fn bridge(transport: ScriptedTransport) -> (Arc<Bridge>, Arc<ScriptedTransport>) {
    let transport = Arc::new(transport);
    let config = SessionConfig::new(Credentials::new(
        "http://localhost:8069".parse().unwrap(),
        "test",
        "admin",
        "admin",
    ))
    .with_retry(RetryPolicy::immediate(3));
    let bridge = Bridge::new(config, transport.clone()).expect("bridge builds");
    (Arc::new(bridge), transport)
}

async fn exchange(bridge: Arc<Bridge>, requests: &[JsonValue]) -> Vec<JsonValue> {
    let input: String = requests.iter().map(|r| format!("{r}\n")).collect();
    exchange_bytes(bridge, input.into_bytes()).await
}

async fn exchange_bytes(bridge: Arc<Bridge>, input: Vec<u8>) -> Vec<JsonValue> {
    let mut output = Vec::new();
    harness::serve(bridge, BufReader::new(input.as_slice()), &mut output)
        .await
        .expect("serve completes");

    let mut responses: Vec<JsonValue> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    responses.sort_by_key(|r| r["id"].as_i64().unwrap_or(-1));
    responses
}

#[tokio::test]
async fn tool_success_is_wrapped_in_the_envelope() {
    let (bridge, _) = bridge(backend());
    let out = exchange(
        bridge,
        &[json!({"id": 1, "op": "invoke_tool", "name": "search_sales_orders", "parameters": {"limit": 5}})],
    )
    .await;

    assert_eq!(out.len(), 1);
    assert_eq!(out[0]["success"], json!(true));
    assert!(out[0].get("error").is_none());
    let result = &out[0]["result"];
    assert_eq!(result["count"], json!(2));
    assert_eq!(result["total_count"], json!(2));
    assert_eq!(result["limit"], json!(5));
    assert_eq!(result["records"][0]["name"], json!("S00007"));
}

#[tokio::test]
async fn invalid_parameters_never_reach_the_backend() {
    let (bridge, transport) = bridge(backend());
    let out = exchange(
        bridge,
        &[
            json!({"id": 1, "op": "invoke_tool", "name": "create_sales_order", "parameters": {"order_lines": []}}),
            json!({"id": 2, "op": "invoke_tool", "name": "search_sales_orders", "parameters": {"limit": 0}}),
            json!({"id": 3, "op": "invoke_tool", "name": "drop_everything"}),
            json!({"id": 4, "op": "resolve_resource", "uri": "odoo://hr/employees"}),
        ],
    )
    .await;

    assert_eq!(out[0]["error"]["kind"], json!("validation_error"));
    assert_eq!(out[1]["error"]["kind"], json!("validation_error"));
    assert_eq!(out[2]["error"]["kind"], json!("validation_error"));
    assert_eq!(out[3]["error"]["kind"], json!("uri_resolution_error"));
    assert!(out.iter().all(|r| r["success"] == json!(false)));
    assert_eq!(transport.call_count(), 0);
    assert_eq!(transport.login_count(), 0);
}

#[tokio::test]
async fn record_resource_is_projected() {
    let (bridge, _) = bridge(backend());
    let out = exchange(bridge, &[json!({"id": 1, "op": "resolve_resource", "uri": "odoo://inventory/products/12"})]).await;

    let result = &out[0]["result"];
    assert_eq!(result["collection"], json!("product.product"));
    let record = &result["records"][0];
    assert_eq!(record["name"], json!("Desk"));
    assert!(record.get("secret_cost").is_none());
}

#[tokio::test]
async fn transient_faults_are_retried_and_expiry_reauthenticates() {
    let (bridge, transport) = bridge(backend());
    transport.fail_next_call(RpcFault::transient("connection reset"));
    let first = bridge
        .resolve_resource("odoo://sales/orders")
        .await
        .expect("retried read succeeds");
    assert_eq!(first.records.len(), 2);
    assert_eq!(transport.login_count(), 1);

    transport.expire_sessions();
    let second = bridge.resolve_resource("odoo://sales/orders").await.expect("replayed read succeeds");
    assert_eq!(second.records.len(), 2);
    assert_eq!(transport.login_count(), 2);

    let stats = bridge.stats();
    assert_eq!(stats.retries, 1);
    assert_eq!(stats.authentications, 2);
}

#[tokio::test]
async fn login_failure_is_an_authentication_error() {
    let (bridge, transport) = bridge(backend());
    transport.fail_next_login(RpcFault::authentication("Access Denied"));
    let out = exchange(bridge, &[json!({"id": 1, "op": "resolve_resource", "uri": "odoo://sales/orders"})]).await;

    assert_eq!(out[0]["error"]["kind"], json!("authentication_error"));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn prompts_mention_registered_tools_only() {
    let (bridge, _) = bridge(backend());
    let tools: Vec<String> = bridge
        .list_tools(None)
        .iter()
        .filter_map(|t| t["name"].as_str().map(str::to_string))
        .collect();
    assert_eq!(tools.len(), 12);

    for prompt in bridge.list_prompts() {
        let period = prompt.arguments[0].allowed.unwrap()[0];
        let rendered = bridge
            .render_prompt(prompt.name, &json!({"period": period}))
            .unwrap();
        let quoted: Vec<&str> = rendered.text.split('\'').skip(1).step_by(2).collect();
        assert!(!quoted.is_empty(), "{} names no tools", prompt.name);
        for name in quoted {
            assert!(tools.iter().any(|t| t == name), "{} names unknown tool {name}", prompt.name);
        }
    }
}

#[tokio::test]
async fn listings_and_malformed_lines() {
    let (bridge, transport) = bridge(backend());
    let out = exchange(
        bridge,
        &[
            json!({"id": 1, "op": "list_tools", "domain": "accounting"}),
            json!({"id": 2, "op": "list_resources"}),
            json!({"id": 3, "op": "list_prompts"}),
            json!({"id": 4, "op": "explode"}),
            json!({"id": 5, "op": "session"}),
        ],
    )
    .await;

    assert_eq!(out[0]["result"].as_array().unwrap().len(), 3);
    assert!(out[1]["result"].as_array().unwrap().len() >= 12);
    assert_eq!(out[2]["result"].as_array().unwrap().len(), 4);
    assert_eq!(out[3]["success"], json!(false));
    assert_eq!(out[3]["error"]["kind"], json!("validation_error"));
    assert_eq!(out[4]["result"]["attempts"], json!(0));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn undecodable_line_does_not_drop_requests_in_flight() {
    let (bridge, _) = bridge(backend().with_login_delay(Duration::from_millis(50)));
    let mut input = Vec::new();
    input.extend_from_slice(b"{\"id\": 1, \"op\": \"resolve_resource\", \"uri\": \"odoo://sales/orders\"}\n");
    input.extend_from_slice(&[0xff, 0xfe, b'{', b'\n']);
    input.extend_from_slice(b"{\"id\": 3, \"op\": \"list_prompts\"}\n");

    let out = exchange_bytes(bridge, input).await;

    assert_eq!(out.len(), 3);
    assert!(out[0]["id"].is_null());
    assert_eq!(out[0]["error"]["kind"], json!("validation_error"));
    assert_eq!(out[1]["id"], json!(1));
    assert_eq!(out[1]["result"]["records"].as_array().unwrap().len(), 2);
    assert_eq!(out[2]["id"], json!(3));
    assert_eq!(out[2]["success"], json!(true));
}
