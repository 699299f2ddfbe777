//! Inventory tools.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value as JsonValue};
use tracing::{debug, info, warn};

use erpbridge_analytics::{turnover_report, GroupKey, ProductValuation, ValuationSnapshot};
use erpbridge_core::record::{date_of, f64_of, id_of, many2one_of, str_of};
use erpbridge_core::{
    BridgeError, BridgeResult, Clause, DateWindow, Filter, Operator, Page, Projection, QuerySpec, Record, RecordId,
    RecordRef,
};
use erpbridge_session::{RemoteCall, SessionClient};

use crate::common::{copy_present, create_command, to_json, window};
use crate::validate::Params;

const PRODUCT: &str = "product.product";
const LOCATION: &str = "stock.location";
const LEGACY_INVENTORY: &str = "stock.inventory";
const QUANT: &str = "stock.quant";

pub(crate) async fn check_availability(client: &SessionClient, params: &Params) -> BridgeResult<JsonValue> {
    let requested = params.int_list("product_ids").unwrap_or_default();

    let mut context = None;
    let mut location = JsonValue::Null;
    if let Some(location_id) = params.int("location_id") {
        let reference = RecordRef::new(LOCATION, RecordId::new(location_id)?);
        let record = client
            .read_one(&reference, &Projection::fields(["name", "complete_name"]))
            .await?;
        location = json!({
            "id": location_id,
            "name": str_of(&record, "complete_name").or(str_of(&record, "name")),
        });
        let mut ctx = Map::new();
        ctx.insert("location".into(), json!(location_id));
        context = Some(ctx);
    }

    let projection = Projection::fields([
        "name",
        "default_code",
        "uom_id",
        "qty_available",
        "virtual_available",
        "incoming_qty",
        "outgoing_qty",
    ]);
    let records = client.read(PRODUCT, &requested, &projection, context).await?;
    if records.is_empty() {
        return Err(BridgeError::not_found(format!("none of the products {requested:?} exist")));
    }

    let found: Vec<i64> = records.iter().filter_map(id_of).collect();
    let not_found: Vec<i64> = requested.iter().copied().filter(|id| !found.contains(id)).collect();
    let products: Vec<JsonValue> = records
        .iter()
        .map(|p| {
            json!({
                "id": id_of(p),
                "name": str_of(p, "name"),
                "default_code": str_of(p, "default_code"),
                "uom": many2one_of(p, "uom_id").map(|u| u.name),
                "on_hand": f64_of(p, "qty_available").unwrap_or_default(),
                "forecast": f64_of(p, "virtual_available").unwrap_or_default(),
                "incoming": f64_of(p, "incoming_qty").unwrap_or_default(),
                "outgoing": f64_of(p, "outgoing_qty").unwrap_or_default(),
            })
        })
        .collect();

    Ok(json!({
        "location": location,
        "products": products,
        "not_found": not_found,
    }))
}

fn adjustment_line(line: &Params, quantity_field: &str) -> Map<String, JsonValue> {
    let mut values = Map::new();
    copy_present(line, &["product_id", "location_id"], &mut values);
    if let Some(qty) = line.get("product_qty") {
        values.insert(quantity_field.to_string(), qty.clone());
    }
    values
}

/// Undo a partially applied adjustment.
///
/// Every step runs even when an earlier one fails. Step failures are logged
/// with the ids left behind; the returned error is always `cause`.
async fn roll_back(
    client: &SessionClient,
    collection: &str,
    ids: &[i64],
    steps: &[&str],
    cause: BridgeError,
) -> BridgeError {
    warn!(collection, ?ids, error = %cause, "inventory adjustment failed, rolling back");
    for &step in steps {
        if let Err(e) = client.call_method(collection, step, ids).await {
            warn!(collection, ?ids, step, error = %e, "rollback step failed, records left behind");
        }
    }
    cause
}

/// Record counted quantities.
///
/// Backends that still ship the `stock.inventory` document get one document
/// with nested lines; newer ones get one batched `stock.quant` create in
/// inventory mode. Either way the counts are applied afterwards.
///
/// If applying fails, the document is cancelled and deleted, or the counts
/// set on the quants are cleared. Quants are never deleted: inventory mode
/// may hand back quants that already held stock.
pub(crate) async fn create_adjustment(client: &SessionClient, params: &Params) -> BridgeResult<JsonValue> {
    let name = params.require_str("name")?;
    let lines = params.objects("adjustment_lines");

    let legacy = client
        .search_count(
            "ir.model",
            &Filter::match_all().with(Clause::new("model", Operator::Eq, LEGACY_INVENTORY)),
        )
        .await?
        > 0;

    if legacy {
        let mut values = Map::new();
        values.insert("name".into(), json!(name));
        values.insert(
            "line_ids".into(),
            JsonValue::Array(
                lines
                    .iter()
                    .map(|l| create_command(adjustment_line(l, "product_qty")))
                    .collect(),
            ),
        );
        if let Some(date) = params.str("date") {
            values.insert("accounting_date".into(), json!(date));
        }
        let id = client.create(LEGACY_INVENTORY, values).await?;
        let mut applied = client.call_method(LEGACY_INVENTORY, "action_start", &[id]).await;
        if applied.is_ok() {
            applied = client.call_method(LEGACY_INVENTORY, "action_validate", &[id]).await;
        }
        if let Err(e) = applied {
            let steps = ["action_cancel_draft", "unlink"];
            return Err(roll_back(client, LEGACY_INVENTORY, &[id], &steps, e).await);
        }
        info!(inventory = id, lines = lines.len(), "inventory adjustment validated");
        return Ok(json!({
            "model": LEGACY_INVENTORY,
            "inventory_id": id,
            "name": name,
            "lines": lines.len(),
        }));
    }

    let batch: Vec<JsonValue> = lines
        .iter()
        .map(|l| JsonValue::Object(adjustment_line(l, "inventory_quantity")))
        .collect();
    let mut kwargs = Map::new();
    kwargs.insert("context".into(), json!({"inventory_mode": true, "inventory_name": name}));
    let created = client
        .call(
            RemoteCall::new(QUANT, "create")
                .with_args(vec![JsonValue::Array(batch)])
                .with_kwargs(kwargs),
        )
        .await?;
    let quant_ids: Vec<i64> = match &created {
        JsonValue::Array(ids) => ids.iter().filter_map(JsonValue::as_i64).collect(),
        JsonValue::Number(n) => n.as_i64().into_iter().collect(),
        _ => Vec::new(),
    };
    let applied = if quant_ids.len() != lines.len() {
        Err(BridgeError::validation(format!(
            "{QUANT}.create returned {} ids for {} lines",
            quant_ids.len(),
            lines.len()
        )))
    } else {
        client.call_method(QUANT, "action_apply_inventory", &quant_ids).await
    };
    if let Err(e) = applied {
        if quant_ids.is_empty() {
            return Err(e);
        }
        return Err(roll_back(client, QUANT, &quant_ids, &["action_clear_inventory_quantity"], e).await);
    }
    info!(quants = quant_ids.len(), "inventory counts applied");
    Ok(json!({
        "model": QUANT,
        "quant_ids": quant_ids,
        "name": name,
        "lines": lines.len(),
    }))
}

fn storable_products(params: &Params) -> QuerySpec {
    let mut filter = Filter::match_all().with(Clause::new("type", Operator::Eq, "product"));
    if let Some(ids) = params.int_list("product_ids") {
        filter.push(Clause::new("id", Operator::In, json!(ids)));
    }
    if let Some(category) = params.int("category_id") {
        filter.push(Clause::new("categ_id", Operator::Eq, category));
    }
    QuerySpec::new(PRODUCT)
        .with_filter(filter)
        .with_projection(Projection::fields(["name", "default_code", "categ_id", "standard_price"]))
        .with_page(Page::unbounded())
}

fn outgoing_moves(window: DateWindow, product_ids: &[i64]) -> QuerySpec {
    let filter = Filter::match_all()
        .with(Clause::new("product_id", Operator::In, json!(product_ids)))
        .with(Clause::new("state", Operator::Eq, "done"))
        .with(Clause::new("location_dest_id.usage", Operator::Eq, "customer"))
        .with(Clause::new("date", Operator::Ge, window.from_date_str()))
        .with(Clause::new("date", Operator::Le, window.to_end_of_day()));
    QuerySpec::new("stock.move")
        .with_filter(filter)
        .with_projection(Projection::fields(["product_id", "product_uom_qty", "price_unit", "date"]))
        .with_page(Page::unbounded())
}

fn valuation_layers(window: DateWindow, product_ids: &[i64]) -> QuerySpec {
    let filter = Filter::match_all()
        .with(Clause::new("product_id", Operator::In, json!(product_ids)))
        .with(Clause::new("create_date", Operator::Le, window.to_end_of_day()));
    QuerySpec::new("stock.valuation.layer")
        .with_filter(filter)
        .with_projection(Projection::fields(["product_id", "value", "create_date"]))
        .with_page(Page::unbounded())
}

/// Opening and closing valuation built from cumulative layer values.
///
/// The opening snapshot exists only when some layer predates the window.
#[derive(Debug, Default, Clone, Copy)]
struct Valuation {
    opening: Option<f64>,
    closing: Option<f64>,
}

impl Valuation {
    fn add(&mut self, window: DateWindow, date: chrono::NaiveDate, value: f64) {
        if date < window.from {
            *self.opening.get_or_insert(0.0) += value;
        }
        *self.closing.get_or_insert(0.0) += value;
    }

    fn snapshots(&self, window: DateWindow) -> Vec<ValuationSnapshot> {
        let mut out = Vec::with_capacity(2);
        if let Some(value) = self.opening {
            out.push(ValuationSnapshot { date: window.from, value });
        }
        if let Some(value) = self.closing {
            out.push(ValuationSnapshot { date: window.to, value });
        }
        out
    }
}

pub(crate) async fn analyze_turnover(client: &SessionClient, params: &Params) -> BridgeResult<JsonValue> {
    let window = window(params)?;

    let products = client.search_read(&storable_products(params)).await?;
    if products.is_empty() {
        return Err(BridgeError::not_found("no storable products match the criteria"));
    }
    let ids: Vec<i64> = products.iter().filter_map(id_of).collect();
    let moves = client.search_read(&outgoing_moves(window, &ids)).await?;
    let layers = client.search_read(&valuation_layers(window, &ids)).await?;
    debug!(
        products = products.len(),
        moves = moves.len(),
        layers = layers.len(),
        "fetched inventory turnover inputs"
    );

    let standard_price: BTreeMap<i64, f64> = products
        .iter()
        .filter_map(|p| Some((id_of(p)?, f64_of(p, "standard_price").unwrap_or_default())))
        .collect();

    let mut cogs: BTreeMap<i64, f64> = BTreeMap::new();
    for m in &moves {
        let Some(product) = many2one_of(m, "product_id") else { continue };
        let quantity = f64_of(m, "product_uom_qty").unwrap_or_default();
        let unit_cost = match f64_of(m, "price_unit").map(f64::abs) {
            Some(price) if price > 0.0 => price,
            _ => standard_price.get(&product.id).copied().unwrap_or_default(),
        };
        *cogs.entry(product.id).or_default() += quantity * unit_cost;
    }

    let mut overall = Valuation::default();
    let mut per_product: BTreeMap<i64, Valuation> = BTreeMap::new();
    for layer in &layers {
        let (Some(product), Some(date)) = (many2one_of(layer, "product_id"), date_of(layer, "create_date")) else {
            continue;
        };
        let value = f64_of(layer, "value").unwrap_or_default();
        overall.add(window, date, value);
        per_product.entry(product.id).or_default().add(window, date, value);
    }

    let valuations: Vec<ProductValuation> = products
        .iter()
        .filter_map(|p: &Record| {
            let id = id_of(p)?;
            Some(ProductValuation {
                product: GroupKey::new(id, str_of(p, "name").unwrap_or_default()),
                cost_of_goods_sold: cogs.get(&id).copied().unwrap_or_default(),
                snapshots: per_product.get(&id).map(|v| v.snapshots(window)).unwrap_or_default(),
            })
        })
        .collect();

    let report = turnover_report(
        window,
        cogs.values().sum(),
        &overall.snapshots(window),
        &valuations,
        moves.len(),
    )?;
    to_json(&report)
}
