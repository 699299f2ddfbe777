//! Helpers for reading fields out of raw backend records.
//!
//! Records arrive as JSON objects. Relational (many2one) fields are encoded as
//! `[id, "display name"]` or `false`, dates as `YYYY-MM-DD` and datetimes as
//! `YYYY-MM-DD HH:MM:SS`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// A raw record as returned by `search_read` / `read`.
pub type Record = Map<String, JsonValue>;

/// Decoded many2one value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Many2One {
    pub id: i64,
    pub name: String,
}

impl Many2One {
    pub fn from_value(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Array(items) if !items.is_empty() => {
                let id = items[0].as_i64()?;
                let name = items
                    .get(1)
                    .and_then(JsonValue::as_str)
                    .unwrap_or_default()
                    .to_string();
                Some(Self { id, name })
            }
            JsonValue::Number(n) => n.as_i64().map(|id| Self { id, name: String::new() }),
            _ => None,
        }
    }
}

pub fn id_of(record: &Record) -> Option<i64> {
    record.get("id").and_then(JsonValue::as_i64)
}

pub fn f64_of(record: &Record, field: &str) -> Option<f64> {
    record.get(field).and_then(JsonValue::as_f64)
}

pub fn str_of<'a>(record: &'a Record, field: &str) -> Option<&'a str> {
    record.get(field).and_then(JsonValue::as_str)
}

pub fn many2one_of(record: &Record, field: &str) -> Option<Many2One> {
    record.get(field).and_then(Many2One::from_value)
}

/// Read a date or datetime field as a calendar date.
pub fn date_of(record: &Record, field: &str) -> Option<NaiveDate> {
    let raw = str_of(record, field)?;
    let day = raw.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Read an x2many field (list of ids).
pub fn ids_of(record: &Record, field: &str) -> Vec<i64> {
    record
        .get(field)
        .and_then(JsonValue::as_array)
        .map(|items| items.iter().filter_map(JsonValue::as_i64).collect())
        .unwrap_or_default()
}

/// Decode a JSON array of records, skipping anything that is not an object.
pub fn records_from(value: JsonValue) -> Vec<Record> {
    match value {
        JsonValue::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                JsonValue::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
