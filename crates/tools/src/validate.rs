//! Parameter validation and coercion against a [`ToolSignature`].
//!
//! Runs before any remote effect. On success the returned [`Params`] hold
//! values already coerced to their declared types, so handlers only read.

use serde_json::{Map, Value as JsonValue};

use erpbridge_core::query::parse_date;
use erpbridge_core::{BridgeError, BridgeResult, Filter};

use crate::schema::{Bound, ParamSpec, ParamType, ToolSignature};

/// Validated, coerced parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Map<String, JsonValue>);

impl Params {
    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.0.get(name)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(JsonValue::as_i64)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(JsonValue::as_f64)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(JsonValue::as_str)
    }

    pub fn int_list(&self, name: &str) -> Option<Vec<i64>> {
        self.get(name)
            .and_then(JsonValue::as_array)
            .map(|items| items.iter().filter_map(JsonValue::as_i64).collect())
    }

    pub fn str_list(&self, name: &str) -> Option<Vec<&str>> {
        self.get(name)
            .and_then(JsonValue::as_array)
            .map(|items| items.iter().filter_map(JsonValue::as_str).collect())
    }

    /// Nested object list (line items).
    pub fn objects(&self, name: &str) -> Vec<Params> {
        self.get(name)
            .and_then(JsonValue::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_object().cloned().map(Params))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn require_int(&self, name: &str) -> BridgeResult<i64> {
        self.int(name).ok_or_else(|| missing(name))
    }

    pub fn require_number(&self, name: &str) -> BridgeResult<f64> {
        self.number(name).ok_or_else(|| missing(name))
    }

    pub fn require_str(&self, name: &str) -> BridgeResult<&str> {
        self.str(name).ok_or_else(|| missing(name))
    }

    /// Generic filter clauses, already checked during validation.
    pub fn filters(&self, name: &str) -> BridgeResult<Filter> {
        let mut filter = Filter::match_all();
        if let Some(items) = self.get(name).and_then(JsonValue::as_array) {
            push_filters(&mut filter, items, name)?;
        }
        Ok(filter)
    }
}

fn missing(name: &str) -> BridgeError {
    BridgeError::validation(format!("missing required parameter '{name}'"))
}

/// Validate `raw` against `signature`.
///
/// `null` or an absent object means "no parameters". Unknown parameters are
/// rejected; `null` for an optional parameter counts as absent.
pub fn validate(signature: &ToolSignature, raw: &JsonValue) -> BridgeResult<Params> {
    let object = match raw {
        JsonValue::Null => Map::new(),
        JsonValue::Object(map) => map.clone(),
        other => {
            return Err(BridgeError::validation(format!(
                "{}: parameters must be an object, got {}",
                signature.name,
                type_name(other)
            )));
        }
    };
    let params = validate_object(signature.params, object, "")?;
    check_date_order(&params)?;
    Ok(params)
}

fn validate_object(specs: &[ParamSpec], mut object: Map<String, JsonValue>, path: &str) -> BridgeResult<Params> {
    if let Some(unknown) = object.keys().find(|k| !specs.iter().any(|s| s.name == k.as_str())) {
        let expected: Vec<&str> = specs.iter().map(|s| s.name).collect();
        return Err(BridgeError::validation(format!(
            "unknown parameter '{path}{unknown}' (expected one of: {})",
            expected.join(", ")
        )));
    }

    let mut out = Map::new();
    for spec in specs {
        let at = format!("{path}{}", spec.name);
        match object.remove(spec.name) {
            None | Some(JsonValue::Null) if spec.required => {
                return Err(BridgeError::validation(format!("missing required parameter '{at}'")));
            }
            None | Some(JsonValue::Null) => {}
            Some(value) => {
                let coerced = coerce(spec, value, &at)?;
                check_bound(spec, &coerced, &at)?;
                out.insert(spec.name.to_string(), coerced);
            }
        }
    }
    Ok(Params(out))
}

fn coerce(spec: &ParamSpec, value: JsonValue, at: &str) -> BridgeResult<JsonValue> {
    let mismatch = |expected: &str, got: &JsonValue| {
        BridgeError::validation(format!("parameter '{at}' must be {expected}, got {}", describe(got)))
    };

    match spec.ty {
        ParamType::Integer => coerce_int(&value).map(JsonValue::from).ok_or_else(|| mismatch("an integer", &value)),
        ParamType::Number => coerce_number(&value).map(JsonValue::from).ok_or_else(|| mismatch("a number", &value)),
        ParamType::String => match value {
            JsonValue::String(s) if !s.trim().is_empty() => Ok(JsonValue::String(s)),
            other => Err(mismatch("a non-empty string", &other)),
        },
        ParamType::Boolean => match &value {
            JsonValue::Bool(_) => Ok(value),
            JsonValue::String(s) if s == "true" || s == "false" => Ok(JsonValue::Bool(s == "true")),
            other => Err(mismatch("a boolean", other)),
        },
        ParamType::Date => {
            let raw = value.as_str().ok_or_else(|| mismatch("a date (YYYY-MM-DD)", &value))?;
            let date = parse_date(raw).map_err(|_| mismatch("a date (YYYY-MM-DD)", &value))?;
            Ok(JsonValue::String(date.format("%Y-%m-%d").to_string()))
        }
        ParamType::Enum(allowed) => match value.as_str() {
            Some(s) if allowed.contains(&s) => Ok(value),
            _ => Err(BridgeError::validation(format!(
                "parameter '{at}' must be one of: {} (got {})",
                allowed.join(", "),
                describe(&value)
            ))),
        },
        ParamType::IntegerList => {
            let items = value.as_array().ok_or_else(|| mismatch("a list of integers", &value))?;
            let mut ids = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                match coerce_int(item) {
                    Some(n) if n > 0 => ids.push(n),
                    _ => {
                        return Err(BridgeError::validation(format!(
                            "parameter '{at}[{i}]' must be a positive integer, got {}",
                            describe(item)
                        )));
                    }
                }
            }
            if spec.required && ids.is_empty() {
                return Err(BridgeError::validation(format!("parameter '{at}' must not be empty")));
            }
            Ok(JsonValue::from(ids))
        }
        ParamType::EnumList(allowed) => {
            let items = value.as_array().ok_or_else(|| mismatch("a list", &value))?;
            if items.is_empty() {
                return Err(BridgeError::validation(format!("parameter '{at}' must not be empty")));
            }
            let mut seen: Vec<&str> = Vec::new();
            for item in items {
                match item.as_str() {
                    Some(s) if allowed.contains(&s) => {
                        if !seen.contains(&s) {
                            seen.push(s);
                        }
                    }
                    _ => {
                        return Err(BridgeError::validation(format!(
                            "parameter '{at}' entries must be one of: {} (got {})",
                            allowed.join(", "),
                            describe(item)
                        )));
                    }
                }
            }
            Ok(JsonValue::from(seen))
        }
        ParamType::Objects(fields) => {
            let items = match value {
                JsonValue::Array(items) => items,
                other => return Err(mismatch("a list of objects", &other)),
            };
            if items.is_empty() {
                return Err(BridgeError::validation(format!("parameter '{at}' needs at least one entry")));
            }
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                let object = match item {
                    JsonValue::Object(map) => map,
                    other => {
                        return Err(BridgeError::validation(format!(
                            "parameter '{at}[{i}]' must be an object, got {}",
                            describe(&other)
                        )));
                    }
                };
                let nested = validate_object(fields, object, &format!("{at}[{i}]."))?;
                out.push(JsonValue::Object(nested.0));
            }
            Ok(JsonValue::Array(out))
        }
        ParamType::Filters => {
            let items = value.as_array().ok_or_else(|| mismatch("a list of filter clauses", &value))?;
            push_filters(&mut Filter::match_all(), items, at)?;
            Ok(value)
        }
    }
}

fn push_filters(filter: &mut Filter, items: &[JsonValue], at: &str) -> BridgeResult<()> {
    for (i, item) in items.iter().enumerate() {
        let clause = item.as_object().ok_or_else(|| {
            BridgeError::validation(format!("'{at}[{i}]' must be an object with field, operator, value"))
        })?;
        if let Some(extra) = clause.keys().find(|k| !matches!(k.as_str(), "field" | "operator" | "value")) {
            return Err(BridgeError::validation(format!("'{at}[{i}]' has unknown key '{extra}'")));
        }
        let field = clause.get("field").and_then(JsonValue::as_str);
        let operator = clause.get("operator").and_then(JsonValue::as_str);
        let value = clause.get("value");
        match (field, operator, value) {
            (Some(field), Some(operator), Some(value)) => {
                filter
                    .push_untrusted(field, operator, value.clone())
                    .map_err(|e| match e {
                        BridgeError::Validation(m) => BridgeError::validation(format!("'{at}[{i}]': {m}")),
                        other => other,
                    })?;
            }
            _ => {
                return Err(BridgeError::validation(format!(
                    "'{at}[{i}]' needs string 'field', string 'operator' and a 'value'"
                )));
            }
        }
    }
    Ok(())
}

fn coerce_int(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                .map(|f| f as i64)
        }),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_number(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn check_bound(spec: &ParamSpec, value: &JsonValue, at: &str) -> BridgeResult<()> {
    let Some(n) = value.as_f64() else {
        return Ok(());
    };
    match spec.bound {
        Bound::Positive if n <= 0.0 => Err(BridgeError::validation(format!(
            "parameter '{at}' must be greater than 0, got {n}"
        ))),
        Bound::NonNegative if n < 0.0 => Err(BridgeError::validation(format!(
            "parameter '{at}' must not be negative, got {n}"
        ))),
        _ => Ok(()),
    }
}

fn check_date_order(params: &Params) -> BridgeResult<()> {
    if let (Some(from), Some(to)) = (params.str("date_from"), params.str("date_to")) {
        // Both are normalized YYYY-MM-DD strings, so lexical order is date order.
        if from > to {
            return Err(BridgeError::validation(format!(
                "date_from ({from}) must not be after date_to ({to})"
            )));
        }
    }
    Ok(())
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a list",
        JsonValue::Object(_) => "an object",
    }
}

fn describe(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => format!("'{s}'"),
        JsonValue::Number(n) => n.to_string(),
        other => type_name(other).to_string(),
    }
}
