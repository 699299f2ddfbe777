//! Declarative tool signatures.
//!
//! Each tool declares its parameters once; the same declaration drives the
//! advertised JSON schema and the validation that runs before dispatch.

use serde::Serialize;
use serde_json::{json, Map, Value as JsonValue};

use erpbridge_core::query::ALLOWED_OPERATORS;
use erpbridge_core::Domain;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ParamType {
    Integer,
    Number,
    String,
    Boolean,
    /// `YYYY-MM-DD`.
    Date,
    /// One of a fixed set of strings.
    Enum(&'static [&'static str]),
    IntegerList,
    /// Non-empty list of distinct values from a fixed set.
    EnumList(&'static [&'static str]),
    /// Non-empty list of objects, each validated against the nested specs.
    Objects(&'static [ParamSpec]),
    /// Generic `{field, operator, value}` filter clauses.
    Filters,
}

/// Numeric bound checked after coercion.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Bound {
    None,
    /// `> 0`
    Positive,
    /// `>= 0`
    NonNegative,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub ty: ParamType,
    pub required: bool,
    pub bound: Bound,
    pub description: &'static str,
}

impl ParamSpec {
    pub const fn required(name: &'static str, ty: ParamType, description: &'static str) -> Self {
        Self { name, ty, required: true, bound: Bound::None, description }
    }

    pub const fn optional(name: &'static str, ty: ParamType, description: &'static str) -> Self {
        Self { name, ty, required: false, bound: Bound::None, description }
    }

    pub const fn positive(mut self) -> Self {
        self.bound = Bound::Positive;
        self
    }

    pub const fn non_negative(mut self) -> Self {
        self.bound = Bound::NonNegative;
        self
    }

    fn json_schema(&self) -> JsonValue {
        let mut schema = match self.ty {
            ParamType::Integer => json!({"type": "integer"}),
            ParamType::Number => json!({"type": "number"}),
            ParamType::String => json!({"type": "string"}),
            ParamType::Boolean => json!({"type": "boolean"}),
            ParamType::Date => json!({"type": "string", "format": "date"}),
            ParamType::Enum(values) => json!({"type": "string", "enum": values}),
            ParamType::IntegerList => json!({"type": "array", "items": {"type": "integer", "minimum": 1}}),
            ParamType::EnumList(values) => json!({
                "type": "array",
                "items": {"type": "string", "enum": values},
                "minItems": 1,
                "uniqueItems": true
            }),
            ParamType::Objects(fields) => {
                let mut item = object_schema(fields);
                item["additionalProperties"] = json!(false);
                json!({"type": "array", "items": item, "minItems": 1})
            }
            ParamType::Filters => json!({
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "field": {"type": "string"},
                        "operator": {"type": "string", "enum": ALLOWED_OPERATORS},
                        "value": {}
                    },
                    "required": ["field", "operator", "value"],
                    "additionalProperties": false
                }
            }),
        };
        match self.bound {
            Bound::Positive => schema["exclusiveMinimum"] = json!(0),
            Bound::NonNegative => schema["minimum"] = json!(0),
            Bound::None => {}
        }
        schema["description"] = json!(self.description);
        schema
    }
}

fn object_schema(params: &[ParamSpec]) -> JsonValue {
    let properties: Map<String, JsonValue> = params
        .iter()
        .map(|p| (p.name.to_string(), p.json_schema()))
        .collect();
    let required: Vec<&str> = params.iter().filter(|p| p.required).map(|p| p.name).collect();
    json!({"type": "object", "properties": properties, "required": required})
}

/// Identifies the handler behind a signature.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ToolId {
    SearchSalesOrders,
    CreateSalesOrder,
    AnalyzeSalesPerformance,
    SearchPurchaseOrders,
    CreatePurchaseOrder,
    AnalyzeSupplierPerformance,
    CheckProductAvailability,
    CreateInventoryAdjustment,
    AnalyzeInventoryTurnover,
    SearchJournalEntries,
    CreateJournalEntry,
    AnalyzeFinancialRatios,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Search,
    Create,
    Inspect,
    Analyze,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ToolSignature {
    pub id: ToolId,
    pub name: &'static str,
    pub domain: Domain,
    pub kind: ToolKind,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
}

impl ToolSignature {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// JSON schema of the parameter object.
    pub fn input_schema(&self) -> JsonValue {
        let mut schema = object_schema(self.params);
        schema["additionalProperties"] = json!(false);
        schema
    }

    /// Advertised description: name, domain, kind and input schema.
    pub fn describe(&self) -> JsonValue {
        json!({
            "name": self.name,
            "domain": self.domain,
            "kind": self.kind,
            "description": self.description,
            "input_schema": self.input_schema(),
        })
    }
}
