//! Relational store abstraction
//!
//! The relational store owns transactions and row locks. Workflows never
//! touch SQL directly: they describe writes against a [`Table`] with
//! [`Fields`] built from the column constants below, and the adapter turns
//! those into parameterised statements.

use crate::domain::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Column names of the relational schema
pub mod columns {
    // manifest
    pub const MANIFEST_ID: &str = "manifest_id";
    pub const MANIFEST_SRC_ID: &str = "manifest_src_id";
    pub const MANIFEST_FREIGHT_TYPE: &str = "manifest_freight_type";
    pub const MANIFEST_LOAD_TYPE: &str = "manifest_load_type";

    // orderline
    pub const ORDERLINE_ID: &str = "orderline_id";
    pub const MANIFEST_SOURCE_ID: &str = "manifest_source_id";
    pub const ORDERLINE_STATUS: &str = "orderline_status";

    // manifest_error_log
    pub const MANIFEST_RULE_ID: &str = "manifest_rule_id";
    pub const MANIFEST_RULE_MSG: &str = "manifest_rule_msg";
}

/// Stored functions shipped with the schema
///
/// Both take one JSON argument and return `{"updated": n}`, the number of
/// order lines they changed.
pub mod functions {
    pub const UPDATE_ORDER_DETAILS: &str = "fn_update_order_details";
    pub const UPDATE_ORDER_SEQUENCE: &str = "fn_update_order_seq";
}

/// Tables the service writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Manifest,
    Orderline,
    ManifestErrorLog,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Manifest => "manifest",
            Table::Orderline => "orderline",
            Table::ManifestErrorLog => "manifest_error_log",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered column/value pairs used both as a SET list and as a WHERE filter
///
/// Column names are always `'static` constants from [`columns`], values are
/// bound as statement parameters. A `None` value means SQL `NULL`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(Vec<(&'static str, Option<String>)>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column with a value
    pub fn with(mut self, column: &'static str, value: impl Into<String>) -> Self {
        self.set(column, Some(value.into()));
        self
    }

    /// Adds a column set to `NULL`
    pub fn with_null(mut self, column: &'static str) -> Self {
        self.set(column, None);
        self
    }

    fn set(&mut self, column: &'static str, value: Option<String>) {
        match self.0.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = value,
            None => self.0.push((column, value)),
        }
    }

    /// Value of a column, `None` when absent or `NULL`
    pub fn get(&self, column: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(c, _)| *c == column)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Option<&str>)> + '_ {
        self.0.iter().map(|(c, v)| (*c, v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether every column of `filter` is present here with the same value
    pub fn matches(&self, filter: &Fields) -> bool {
        filter.iter().all(|(column, value)| {
            self.0
                .iter()
                .any(|(c, v)| *c == column && v.as_deref() == value)
        })
    }

    /// Overwrites the columns present in `other`
    pub fn apply(&mut self, other: &Fields) {
        for (column, value) in other.iter() {
            self.set(column, value.map(str::to_string));
        }
    }
}

/// An open relational transaction
///
/// Dropping a transaction without calling [`commit`](Self::commit) or
/// [`rollback`](Self::rollback) leaves the outcome to the adapter; callers
/// always finish explicitly.
#[async_trait]
pub trait RelationalTxn: Send {
    /// Updates rows matching `filter`, returning the number of affected rows
    async fn update(&mut self, table: Table, set: &Fields, filter: &Fields) -> Result<u64>;

    /// Inserts one row
    async fn create(&mut self, table: Table, fields: &Fields) -> Result<()>;

    /// Deletes rows matching `filter`, returning the number of deleted rows
    async fn destroy(&mut self, table: Table, filter: &Fields) -> Result<u64>;

    /// Calls a stored function with one JSON argument
    async fn call_function(&mut self, name: &str, argument: &Value) -> Result<Vec<Value>>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Transactional relational store
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Checks that the store is reachable
    async fn test_connection(&self) -> Result<()>;

    /// Opens a new transaction
    async fn begin(&self) -> Result<Box<dyn RelationalTxn>>;

    /// Human-readable description safe for logs (no credentials)
    fn describe(&self) -> String;
}
