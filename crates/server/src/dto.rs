use serde::Deserialize;
use serde_json::Value as JsonValue;

use erpbridge_core::Domain;

/// One line of harness input.
#[derive(Debug, Deserialize)]
pub struct Request {
    /// Echoed back verbatim so callers can pair responses with requests.
    #[serde(default)]
    pub id: JsonValue,
    #[serde(flatten)]
    pub op: Operation,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    ResolveResource {
        uri: String,
    },
    InvokeTool {
        name: String,
        #[serde(default)]
        parameters: JsonValue,
    },
    RenderPrompt {
        name: String,
        #[serde(default)]
        parameters: JsonValue,
    },
    ListTools {
        #[serde(default)]
        domain: Option<Domain>,
    },
    ListResources,
    ListPrompts,
    Session,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::ResolveResource { .. } => "resolve_resource",
            Operation::InvokeTool { .. } => "invoke_tool",
            Operation::RenderPrompt { .. } => "render_prompt",
            Operation::ListTools { .. } => "list_tools",
            Operation::ListResources => "list_resources",
            Operation::ListPrompts => "list_prompts",
            Operation::Session => "session",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_operation() {
        let r: Request = serde_json::from_str(r#"{"id": 1, "op": "resolve_resource", "uri": "odoo://sales/orders"}"#).unwrap();
        assert!(matches!(r.op, Operation::ResolveResource { ref uri } if uri == "odoo://sales/orders"));

        let r: Request = serde_json::from_str(r#"{"op": "invoke_tool", "name": "search_sales_orders"}"#).unwrap();
        assert!(matches!(r.op, Operation::InvokeTool { ref parameters, .. } if parameters.is_null()));
        assert!(r.id.is_null());

        let r: Request = serde_json::from_str(r#"{"op": "list_tools", "domain": "inventory"}"#).unwrap();
        assert!(matches!(r.op, Operation::ListTools { domain: Some(Domain::Inventory) }));

        let r: Request = serde_json::from_str(r#"{"id": "a", "op": "list_prompts"}"#).unwrap();
        assert_eq!(r.op.name(), "list_prompts");
    }

    #[test]
    fn rejects_unknown_operations() {
        assert!(serde_json::from_str::<Request>(r#"{"op": "execute_method"}"#).is_err());
        assert!(serde_json::from_str::<Request>(r#"{"op": "list_tools", "domain": "hr"}"#).is_err());
    }
}
