//! Query specification: the single description of a remote search.
//!
//! Both the resource resolver and the search tools build a [`QuerySpec`]; the
//! session client turns it into a `search_read` call. Filters and projections
//! are explicit values so "match all" and "default fields" are never inferred
//! from an accidentally empty list.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::error::{BridgeError, BridgeResult};

/// Comparison operator accepted by the backend's domain language.
///
/// Only this allow-listed subset can ever be sent to the backend.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not in")]
    NotIn,
    #[serde(rename = "like")]
    Like,
    #[serde(rename = "ilike")]
    ILike,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::In => "in",
            Operator::NotIn => "not in",
            Operator::Like => "like",
            Operator::ILike => "ilike",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        let op = match raw {
            "=" | "==" => Operator::Eq,
            "!=" => Operator::Ne,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "in" => Operator::In,
            "not in" => Operator::NotIn,
            "like" => Operator::Like,
            "ilike" => Operator::ILike,
            _ => return None,
        };
        Some(op)
    }
}

/// Operators a caller may name, including the `between` date-range shorthand.
pub const ALLOWED_OPERATORS: &[&str] = &[
    "=", "!=", "<", "<=", ">", ">=", "in", "not in", "like", "ilike", "between",
];

/// One ternary filter clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub field: String,
    pub op: Operator,
    pub value: JsonValue,
}

impl Clause {
    /// Build a clause from trusted, compile-time parts.
    pub fn new(field: impl Into<String>, op: Operator, value: impl Into<JsonValue>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    fn to_json(&self) -> JsonValue {
        json!([self.field, self.op.as_str(), self.value])
    }
}

/// Conjunction of clauses. An empty filter explicitly matches every record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    pub fn match_all() -> Self {
        Self::default()
    }

    pub fn from_clauses(clauses: Vec<Clause>) -> Self {
        Self { clauses }
    }

    pub fn is_match_all(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn push(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    pub fn with(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn extend(&mut self, other: &Filter) {
        self.clauses.extend(other.clauses.iter().cloned());
    }

    /// Add a clause supplied by an untrusted caller.
    ///
    /// The field must be a plain (optionally dotted) identifier, the operator
    /// must be allow-listed and the value must fit the operator. `between`
    /// takes `[from, to]` dates and expands into a `>=`/`<=` pair.
    pub fn push_untrusted(
        &mut self,
        field: &str,
        operator: &str,
        value: JsonValue,
    ) -> BridgeResult<()> {
        validate_field_name(field)?;
        let operator = operator.trim().to_ascii_lowercase();

        if operator == "between" {
            let (from, to) = date_pair(field, &value)?;
            self.clauses
                .push(Clause::new(field, Operator::Ge, from.format("%Y-%m-%d").to_string()));
            self.clauses
                .push(Clause::new(field, Operator::Le, to.format("%Y-%m-%d").to_string()));
            return Ok(());
        }

        let op = Operator::parse(&operator).ok_or_else(|| {
            BridgeError::validation(format!(
                "operator '{operator}' is not allowed (allowed: {})",
                ALLOWED_OPERATORS.join(", ")
            ))
        })?;

        match op {
            Operator::In | Operator::NotIn => {
                let items = value.as_array().ok_or_else(|| {
                    BridgeError::validation(format!("'{field} {operator}' expects a list value"))
                })?;
                if items.iter().any(|v| v.is_array() || v.is_object()) {
                    return Err(BridgeError::validation(format!(
                        "'{field} {operator}' list must contain scalar values"
                    )));
                }
            }
            Operator::Like | Operator::ILike => {
                if !value.is_string() {
                    return Err(BridgeError::validation(format!(
                        "'{field} {operator}' expects a string pattern"
                    )));
                }
            }
            _ => {
                if value.is_array() || value.is_object() {
                    return Err(BridgeError::validation(format!(
                        "'{field} {operator}' expects a scalar value"
                    )));
                }
            }
        }

        self.clauses.push(Clause { field: field.to_string(), op, value });
        Ok(())
    }

    /// Render as the backend's domain list: `[[field, op, value], ...]`.
    pub fn to_domain(&self) -> JsonValue {
        JsonValue::Array(self.clauses.iter().map(Clause::to_json).collect())
    }
}

fn date_pair(field: &str, value: &JsonValue) -> BridgeResult<(NaiveDate, NaiveDate)> {
    let err = || {
        BridgeError::validation(format!(
            "'{field} between' expects [\"YYYY-MM-DD\", \"YYYY-MM-DD\"]"
        ))
    };
    let items = value.as_array().ok_or_else(err)?;
    if items.len() != 2 {
        return Err(err());
    }
    let from = parse_date(items[0].as_str().ok_or_else(err)?)?;
    let to = parse_date(items[1].as_str().ok_or_else(err)?)?;
    if from > to {
        return Err(BridgeError::validation(format!(
            "'{field} between' range is reversed ({from} > {to})"
        )));
    }
    Ok((from, to))
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(raw: &str) -> BridgeResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        BridgeError::validation(format!("invalid date format: '{raw}' (use YYYY-MM-DD)"))
    })
}

/// Check that `field` is a plain identifier path such as `partner_id.name`.
pub fn validate_field_name(field: &str) -> BridgeResult<()> {
    let segment_ok = |seg: &str| {
        let mut chars = seg.chars();
        match chars.next() {
            Some(c) if c.is_ascii_lowercase() || c == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    };
    if field.is_empty() || !field.split('.').all(segment_ok) {
        return Err(BridgeError::validation(format!("invalid field name '{field}'")));
    }
    Ok(())
}

/// Which fields to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Projection {
    /// Let the backend choose its default field set.
    Default,
    Fields(Vec<String>),
}

impl Projection {
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Fields(fields.into_iter().map(Into::into).collect())
    }

    pub fn as_fields(&self) -> Option<&[String]> {
        match self {
            Projection::Default => None,
            Projection::Fields(f) => Some(f),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: Direction::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: Direction::Desc }
    }

    /// Parse a caller-supplied sort expression such as `date_order DESC, id`.
    pub fn parse_list(raw: &str) -> BridgeResult<Vec<OrderBy>> {
        let mut out = Vec::new();
        for part in raw.split(',') {
            let mut words = part.split_whitespace();
            let field = words
                .next()
                .ok_or_else(|| BridgeError::validation(format!("empty sort term in '{raw}'")))?;
            validate_field_name(field)?;
            let direction = match words.next().map(|w| w.to_ascii_lowercase()) {
                None => Direction::Asc,
                Some(w) if w == "asc" => Direction::Asc,
                Some(w) if w == "desc" => Direction::Desc,
                Some(w) => {
                    return Err(BridgeError::validation(format!(
                        "invalid sort direction '{w}' (use asc or desc)"
                    )));
                }
            };
            if words.next().is_some() {
                return Err(BridgeError::validation(format!("invalid sort term '{}'", part.trim())));
            }
            out.push(OrderBy { field: field.to_string(), direction });
        }
        Ok(out)
    }
}

/// Render an ordering as the backend's `order` string.
pub fn render_order(order: &[OrderBy]) -> Option<String> {
    if order.is_empty() {
        return None;
    }
    Some(
        order
            .iter()
            .map(|o| match o.direction {
                Direction::Asc => format!("{} asc", o.field),
                Direction::Desc => format!("{} desc", o.field),
            })
            .collect::<Vec<_>>()
            .join(", "),
    )
}

/// Pagination window. `limit: None` means unbounded.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Page {
    pub offset: u32,
    pub limit: Option<u32>,
}

impl Page {
    pub fn bounded(offset: u32, limit: u32) -> Self {
        Self { offset, limit: Some(limit) }
    }

    pub fn unbounded() -> Self {
        Self { offset: 0, limit: None }
    }
}

/// Full description of one `search_read`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub collection: String,
    pub filter: Filter,
    pub projection: Projection,
    pub order: Vec<OrderBy>,
    pub page: Page,
}

impl QuerySpec {
    /// Unpaged query over `collection` matching every record.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: Filter::match_all(),
            projection: Projection::Default,
            order: Vec::new(),
            page: Page::unbounded(),
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn with_order(mut self, order: Vec<OrderBy>) -> Self {
        self.order = order;
        self
    }

    pub fn with_page(mut self, page: Page) -> Self {
        self.page = page;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_renders_match_all_domain() {
        let f = Filter::match_all();
        assert!(f.is_match_all());
        assert_eq!(f.to_domain(), json!([]));
    }

    #[test]
    fn between_expands_into_two_clauses() {
        let mut f = Filter::match_all();
        f.push_untrusted("date_order", "between", json!(["2024-01-01", "2024-01-31"]))
            .unwrap();
        assert_eq!(
            f.to_domain(),
            json!([["date_order", ">=", "2024-01-01"], ["date_order", "<=", "2024-01-31"]])
        );
    }

    #[test]
    fn rejects_operators_outside_allow_list() {
        let mut f = Filter::match_all();
        for op in ["child_of", "=like", "=?", "parent_of", "; drop"] {
            let err = f.push_untrusted("name", op, json!("x")).unwrap_err();
            assert_eq!(err.kind(), "validation_error");
        }
        assert!(f.is_match_all());
    }

    #[test]
    fn rejects_suspicious_field_names() {
        let mut f = Filter::match_all();
        for field in ["", "Name", "a b", "a..b", "1abc", "x'y", ".id"] {
            assert!(f.push_untrusted(field, "=", json!(1)).is_err(), "{field:?}");
        }
    }

    #[test]
    fn checks_value_shape_against_operator() {
        let mut f = Filter::match_all();
        assert!(f.push_untrusted("id", "in", json!(3)).is_err());
        assert!(f.push_untrusted("id", "=", json!([1, 2])).is_err());
        assert!(f.push_untrusted("name", "ilike", json!(5)).is_err());
        assert!(f.push_untrusted("date", "between", json!(["2024-02-01", "2024-01-01"])).is_err());
        assert!(f.push_untrusted("id", "in", json!([1, 2])).is_ok());
        assert!(f.push_untrusted("partner_id.name", "ilike", json!("acme")).is_ok());
    }

    #[test]
    fn parses_sort_expressions() {
        let order = OrderBy::parse_list("date_order DESC, id").unwrap();
        assert_eq!(order, vec![OrderBy::desc("date_order"), OrderBy::asc("id")]);
        assert_eq!(render_order(&order).as_deref(), Some("date_order desc, id asc"));
        assert!(OrderBy::parse_list("date_order sideways").is_err());
        assert!(OrderBy::parse_list("date_order desc; drop").is_err());
    }
}
