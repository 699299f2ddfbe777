use serde::Serialize;
use serde_json::Value as JsonValue;

use erpbridge_core::{BridgeError, BridgeResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

impl From<&BridgeError> for ErrorBody {
    fn from(err: &BridgeError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// `{"success": true, "result": ...}` or `{"success": false, "error": {kind, message}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Outcome {
    pub fn ok(result: JsonValue) -> Self {
        Self { success: true, result: Some(result), error: None }
    }

    pub fn err(error: &BridgeError) -> Self {
        Self { success: false, result: None, error: Some(error.into()) }
    }

    pub fn from_result<T: Serialize>(result: BridgeResult<T>) -> Self {
        match result.and_then(|value| {
            serde_json::to_value(value)
                .map_err(|e| BridgeError::validation(format!("result could not be serialized: {e}")))
        }) {
            Ok(value) => Self::ok(value),
            Err(e) => Self::err(&e),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_envelope() {
        let out = Outcome::from_result(Ok(json!({"count": 1})));
        assert_eq!(out.to_json(), json!({"success": true, "result": {"count": 1}}));
    }

    #[test]
    fn error_envelope_carries_kind_and_message() {
        let out = Outcome::from_result::<JsonValue>(Err(BridgeError::not_found("sale.order(9) does not exist")));
        assert_eq!(
            out.to_json(),
            json!({
                "success": false,
                "error": {"kind": "not_found_error", "message": "not found: sale.order(9) does not exist"}
            })
        );
    }
}
