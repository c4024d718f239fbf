use super::{lock, FailureMode, FailurePlan, Operation};
use crate::adapters::relational::{
    columns, functions, Fields, RelationalStore, RelationalTxn, Table,
};
use crate::domain::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
struct Tables {
    rows: BTreeMap<Table, Vec<Fields>>,
    function_calls: Vec<(String, Value)>,
}

impl Tables {
    fn apply(&mut self, write: &Write) -> u64 {
        match write {
            Write::Update { table, set, filter } => {
                let mut affected = 0;
                for row in self.rows.entry(*table).or_default().iter_mut() {
                    if row.matches(filter) {
                        row.apply(set);
                        affected += 1;
                    }
                }
                affected
            }
            Write::Create { table, fields } => {
                self.rows.entry(*table).or_default().push(fields.clone());
                1
            }
            Write::Destroy { table, filter } => {
                let rows = self.rows.entry(*table).or_default();
                let before = rows.len();
                rows.retain(|row| !row.matches(filter));
                (before - rows.len()) as u64
            }
            Write::Function { name, argument } => {
                self.function_calls.push((name.clone(), argument.clone()));
                self.function_matches(name, argument)
            }
        }
    }

    /// Order lines the stored function `name` would update
    fn function_matches(&self, name: &str, argument: &Value) -> u64 {
        let lines = self
            .rows
            .get(&Table::Orderline)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let count = |filter: Fields| {
            lines.iter().filter(|row| row.matches(&filter)).count() as u64
        };

        match name {
            functions::UPDATE_ORDER_DETAILS => text(argument, "orderLineId")
                .map(|id| count(Fields::new().with(columns::ORDERLINE_ID, id)))
                .unwrap_or(0),
            functions::UPDATE_ORDER_SEQUENCE => {
                let Some(manifest) = text(argument, "manifestSourceId") else {
                    return 0;
                };
                argument
                    .get("orders")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .filter_map(|entry| text(entry, "orderLineId"))
                    .map(|id| {
                        count(
                            Fields::new()
                                .with(columns::ORDERLINE_ID, id)
                                .with(columns::MANIFEST_SOURCE_ID, manifest),
                        )
                    })
                    .sum()
            }
            _ => 0,
        }
    }
}

fn text<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// One write of a transaction, replayed onto the committed tables on commit
#[derive(Debug, Clone)]
enum Write {
    Update { table: Table, set: Fields, filter: Fields },
    Create { table: Table, fields: Fields },
    Destroy { table: Table, filter: Fields },
    Function { name: String, argument: Value },
}

#[derive(Debug, Default)]
struct Inner {
    committed: Mutex<Tables>,
    failures: FailurePlan,
    commits: Mutex<usize>,
    rollbacks: Mutex<usize>,
}

/// Relational store kept in memory
///
/// A transaction reads and writes a private copy of every table. On commit
/// its writes are replayed onto the committed tables, so concurrent
/// transactions on different rows do not lose each other's writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryRelationalStore {
    inner: Arc<Inner>,
}

impl MemoryRelationalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a committed row directly
    pub fn insert(&self, table: Table, row: Fields) {
        lock(&self.inner.committed)
            .rows
            .entry(table)
            .or_default()
            .push(row);
    }

    /// Committed rows of a table
    pub fn rows(&self, table: Table) -> Vec<Fields> {
        lock(&self.inner.committed)
            .rows
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    /// Committed rows of a table matching `filter`
    pub fn find(&self, table: Table, filter: &Fields) -> Vec<Fields> {
        self.rows(table)
            .into_iter()
            .filter(|row| row.matches(filter))
            .collect()
    }

    /// Committed stored function calls, in call order
    pub fn function_calls(&self) -> Vec<(String, Value)> {
        lock(&self.inner.committed).function_calls.clone()
    }

    pub fn commit_count(&self) -> usize {
        *lock(&self.inner.commits)
    }

    pub fn rollback_count(&self) -> usize {
        *lock(&self.inner.rollbacks)
    }

    /// Makes `operation` fail after `successes_first` successful attempts
    pub fn inject_failure(&self, operation: Operation, successes_first: usize) {
        self.inner
            .failures
            .inject(operation, successes_first, FailureMode::Error);
    }

    /// Makes `operation` hang after `successes_first` successful attempts
    pub fn inject_hang(&self, operation: Operation, successes_first: usize) {
        self.inner
            .failures
            .inject(operation, successes_first, FailureMode::Hang);
    }

    pub fn clear_failures(&self) {
        self.inner.failures.clear();
    }
}

#[async_trait]
impl RelationalStore for MemoryRelationalStore {
    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn RelationalTxn>> {
        self.inner.failures.check(&Operation::Begin).await?;
        let working = lock(&self.inner.committed).clone();
        Ok(Box::new(MemoryTxn {
            inner: Arc::clone(&self.inner),
            working,
            journal: Vec::new(),
        }))
    }

    fn describe(&self) -> String {
        "memory relational store".to_string()
    }
}

struct MemoryTxn {
    inner: Arc<Inner>,
    working: Tables,
    journal: Vec<Write>,
}

impl MemoryTxn {
    fn record(&mut self, write: Write) -> u64 {
        let affected = self.working.apply(&write);
        self.journal.push(write);
        affected
    }
}

#[async_trait]
impl RelationalTxn for MemoryTxn {
    async fn update(&mut self, table: Table, set: &Fields, filter: &Fields) -> Result<u64> {
        self.inner.failures.check(&Operation::Update(table)).await?;
        Ok(self.record(Write::Update {
            table,
            set: set.clone(),
            filter: filter.clone(),
        }))
    }

    async fn create(&mut self, table: Table, fields: &Fields) -> Result<()> {
        self.inner.failures.check(&Operation::Create(table)).await?;
        self.record(Write::Create {
            table,
            fields: fields.clone(),
        });
        Ok(())
    }

    async fn destroy(&mut self, table: Table, filter: &Fields) -> Result<u64> {
        self.inner.failures.check(&Operation::Destroy(table)).await?;
        Ok(self.record(Write::Destroy {
            table,
            filter: filter.clone(),
        }))
    }

    async fn call_function(&mut self, name: &str, argument: &Value) -> Result<Vec<Value>> {
        self.inner
            .failures
            .check(&Operation::Function(name.to_string()))
            .await?;
        let updated = self.record(Write::Function {
            name: name.to_string(),
            argument: argument.clone(),
        });
        match name {
            functions::UPDATE_ORDER_DETAILS | functions::UPDATE_ORDER_SEQUENCE => {
                Ok(vec![json!({ "updated": updated })])
            }
            _ => Ok(vec![argument.clone()]),
        }
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTxn { inner, journal, .. } = *self;
        inner.failures.check(&Operation::Commit).await?;
        {
            let mut committed = lock(&inner.committed);
            for write in &journal {
                committed.apply(write);
            }
        }
        *lock(&inner.commits) += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.inner.failures.check(&Operation::Rollback).await?;
        *lock(&self.inner.rollbacks) += 1;
        Ok(())
    }
}
