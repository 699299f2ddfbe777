use serde::Serialize;
use serde_json::{json, Map, Value as JsonValue};
use tracing::warn;

use erpbridge_analytics::GroupKey;
use erpbridge_core::record::many2one_of;
use erpbridge_core::{BridgeError, BridgeResult, DateWindow, Projection, Record, RecordId, RecordRef};
use erpbridge_session::SessionClient;

use crate::validate::Params;

/// The mandatory analysis window.
pub(crate) fn window(params: &Params) -> BridgeResult<DateWindow> {
    DateWindow::parse(params.require_str("date_from")?, params.require_str("date_to")?)
}

/// One-to-many "create" command: `(0, 0, values)`.
pub(crate) fn create_command(values: Map<String, JsonValue>) -> JsonValue {
    json!([0, 0, values])
}

/// Group by a many2one field; unset relations land in the unassigned group.
pub(crate) fn group_key(record: &Record, field: &str) -> GroupKey {
    many2one_of(record, field)
        .map(|m| GroupKey::new(m.id, m.name))
        .unwrap_or_else(GroupKey::unassigned)
}

/// Summarize a freshly created record as `{id, <fields>...}`.
///
/// Once `create` returned the record exists, so a failed read-back is reported
/// as a `warning` next to the id instead of failing the whole tool.
pub(crate) async fn created_summary(
    client: &SessionClient,
    collection: &str,
    id: i64,
    fields: &[&str],
) -> JsonValue {
    let read = async {
        let reference = RecordRef::new(collection, RecordId::new(id)?);
        client
            .read_one(&reference, &Projection::fields(fields.iter().copied()))
            .await
    };

    let mut out = Map::new();
    out.insert("id".into(), json!(id));
    match read.await {
        Ok(record) => {
            for &f in fields {
                out.insert(f.to_string(), record.get(f).cloned().unwrap_or(JsonValue::Null));
            }
        }
        Err(e) => {
            warn!(collection, id, error = %e, "created record could not be read back");
            for &f in fields {
                out.insert(f.to_string(), JsonValue::Null);
            }
            out.insert(
                "warning".into(),
                json!(format!("{collection}({id}) was created but could not be read back: {e}")),
            );
        }
    }
    JsonValue::Object(out)
}

/// Copy the named parameters that are present into `values`.
pub(crate) fn copy_present(params: &Params, names: &[&str], values: &mut Map<String, JsonValue>) {
    for &name in names {
        if let Some(v) = params.get(name) {
            values.insert(name.to_string(), v.clone());
        }
    }
}

/// Serialize an analytics result for the caller.
pub(crate) fn to_json<T: Serialize>(value: &T) -> BridgeResult<JsonValue> {
    serde_json::to_value(value)
        .map_err(|e| BridgeError::validation(format!("result could not be serialized: {e}")))
}
