//! Search index abstraction
//!
//! The search index holds a denormalized copy of orders and manifests. It
//! has no transactions: every write is visible immediately and can only be
//! undone by writing the previous values back.

use crate::domain::Result;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// Filter over indexed documents
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Full-text match of one field against one value
    Match { field: String, value: Value },
    /// Exact match of one field against any of the values
    Terms { field: String, values: Vec<Value> },
}

impl Query {
    pub fn matching(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Match {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn terms<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Query::Terms {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Query DSL representation
    pub fn to_json(&self) -> Value {
        match self {
            Query::Match { field, value } => json!({ "match": { field.as_str(): value } }),
            Query::Terms { field, values } => json!({ "terms": { field.as_str(): values } }),
        }
    }

    /// Evaluates the query against a document held in memory
    ///
    /// Scalars compare by their text form; `Match` ignores case and
    /// surrounding whitespace like an analyzed field would.
    pub fn matches(&self, document: &Value) -> bool {
        match self {
            Query::Match { field, value } => {
                match (document.get(field).and_then(scalar_text), scalar_text(value)) {
                    (Some(actual), Some(expected)) => {
                        actual.trim().eq_ignore_ascii_case(expected.trim())
                    }
                    _ => false,
                }
            }
            Query::Terms { field, values } => match document.get(field).and_then(scalar_text) {
                Some(actual) => values
                    .iter()
                    .filter_map(scalar_text)
                    .any(|expected| expected == actual),
                None => false,
            },
        }
    }
}

/// Aggregation computed alongside a search
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    /// Sum of a numeric field
    Sum { name: String, field: String },
    /// Sum of a field indexed as text holding a decimal number
    SumParsed { name: String, field: String },
}

impl Aggregation {
    pub fn name(&self) -> &str {
        match self {
            Aggregation::Sum { name, .. } | Aggregation::SumParsed { name, .. } => name,
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Aggregation::Sum { field, .. } | Aggregation::SumParsed { field, .. } => field,
        }
    }
}

/// A search against one index
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: Query,
    pub aggregations: Vec<Aggregation>,
    /// Maximum number of hits; `Some(0)` returns aggregations only
    pub size: Option<usize>,
}

impl SearchRequest {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            aggregations: Vec::new(),
            size: None,
        }
    }

    pub fn aggregate(mut self, aggregation: Aggregation) -> Self {
        self.aggregations.push(aggregation);
        self
    }

    pub fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }
}

/// Result of a search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    /// `_source` of every hit
    pub hits: Vec<Value>,
    /// Aggregation values by name
    pub aggregations: HashMap<String, f64>,
}

impl SearchResponse {
    /// Value of a sum aggregation, zero when the index returned none
    pub fn sum(&self, name: &str) -> f64 {
        self.aggregations.get(name).copied().unwrap_or(0.0)
    }
}

/// Field values written to every document matched by an update-by-query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldPatch(Map<String, Value>);

impl FieldPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Patch restoring the current values of this patch's fields in `snapshot`
    ///
    /// Fields absent from the snapshot are restored as `null`.
    pub fn inverse_from(&self, snapshot: &Value) -> FieldPatch {
        FieldPatch(
            self.0
                .keys()
                .map(|field| {
                    let previous = snapshot.get(field).cloned().unwrap_or(Value::Null);
                    (field.clone(), previous)
                })
                .collect(),
        )
    }

    /// Writes the patch into a document held in memory
    pub fn apply_to(&self, document: &mut Value) {
        if let Value::Object(map) = document {
            for (field, value) in &self.0 {
                map.insert(field.clone(), value.clone());
            }
        }
    }
}

impl From<Map<String, Value>> for FieldPatch {
    fn from(fields: Map<String, Value>) -> Self {
        FieldPatch(fields)
    }
}

/// Denormalized search and aggregation index
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Checks that the index is reachable
    async fn test_connection(&self) -> Result<()>;

    async fn search(&self, index: &str, request: &SearchRequest) -> Result<SearchResponse>;

    /// Writes `patch` into every document matching `query`, returning the
    /// number of updated documents
    async fn update_by_query(&self, index: &str, query: &Query, patch: &FieldPatch) -> Result<u64>;

    /// Human-readable description safe for logs (no credentials)
    fn describe(&self) -> String;
}

/// Text form of a scalar JSON value
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Numeric value of a field that may be indexed as a number or as text
pub(crate) fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_query_json() {
        let query = Query::matching("mnfst_SRC_ID", "M1");
        assert_eq!(query.to_json(), json!({"match": {"mnfst_SRC_ID": "M1"}}));
    }

    #[test]
    fn test_terms_query_json() {
        let query = Query::terms("order_LN_ID", ["O1", "O2"]);
        assert_eq!(
            query.to_json(),
            json!({"terms": {"order_LN_ID": ["O1", "O2"]}})
        );
    }

    #[test]
    fn test_match_ignores_case_and_number_encoding() {
        let doc = json!({"mnfst_SRC_ID": "m1 ", "order_LN_ID": 42});
        assert!(Query::matching("mnfst_SRC_ID", "M1").matches(&doc));
        assert!(Query::terms("order_LN_ID", ["42"]).matches(&doc));
        assert!(!Query::terms("order_LN_ID", ["43"]).matches(&doc));
        assert!(!Query::matching("missing", "x").matches(&doc));
    }

    #[test]
    fn test_inverse_patch_restores_snapshot() {
        let snapshot = json!({"order_STTS": "Unplanned", "mnfst_SRC_ID": "M1"});
        let patch = FieldPatch::new()
            .set("order_STTS", "Planned")
            .set("mnfst_SRC_ID", "M2")
            .set("order_LN_SEQ", 3);
        let inverse = patch.inverse_from(&snapshot);

        let mut doc = snapshot.clone();
        patch.apply_to(&mut doc);
        assert_eq!(doc["mnfst_SRC_ID"], json!("M2"));
        inverse.apply_to(&mut doc);
        assert_eq!(doc["order_STTS"], json!("Unplanned"));
        assert_eq!(doc["mnfst_SRC_ID"], json!("M1"));
        assert_eq!(doc["order_LN_SEQ"], Value::Null);
    }

    #[test]
    fn test_numeric_value_parses_text() {
        assert_eq!(numeric_value(&json!("120.5")), Some(120.5));
        assert_eq!(numeric_value(&json!(3)), Some(3.0));
        assert_eq!(numeric_value(&json!("n/a")), None);
        assert_eq!(numeric_value(&Value::Null), None);
    }

    #[test]
    fn test_response_sum_defaults_to_zero() {
        let response = SearchResponse::default();
        assert_eq!(response.sum("commodityWeight"), 0.0);
    }
}
