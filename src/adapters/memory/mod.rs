//! In-memory store implementations
//!
//! Both stores keep their data behind a mutex and accept scripted failures,
//! so coordinated writes can be exercised without a database or a cluster.
//!
//! ```rust
//! use lading::adapters::memory::{MemorySearchIndex, Operation};
//! use serde_json::json;
//!
//! let index = MemorySearchIndex::new();
//! index.insert("unplanned_orders", json!({"order_LN_ID": "O1", "mnfst_SRC_ID": "M1"}));
//!
//! // the first update-by-query succeeds, every later one fails
//! index.inject_failure(Operation::UpdateByQuery("unplanned_orders".into()), 1);
//! ```

mod relational;
mod search;

pub use relational::MemoryRelationalStore;
pub use search::MemorySearchIndex;

use crate::adapters::relational::Table;
use crate::domain::{PersistenceError, Result};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Store operation a failure can be attached to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    Begin,
    Update(Table),
    Create(Table),
    Destroy(Table),
    Function(String),
    Commit,
    Rollback,
    Search(String),
    UpdateByQuery(String),
}

/// How an injected failure manifests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// The operation returns an error
    Error,
    /// The operation never completes within any reasonable step timeout
    Hang,
    /// The operation takes effect but its reply never arrives. Fires once.
    Late,
}

/// Whether the caller of a write gets its reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reply {
    Prompt,
    Lost,
}

#[derive(Debug, Clone)]
struct Injection {
    successes_left: usize,
    mode: FailureMode,
}

/// Scripted failures keyed by operation
#[derive(Debug, Default)]
pub(crate) struct FailurePlan {
    injections: Mutex<HashMap<Operation, Injection>>,
}

impl FailurePlan {
    pub(crate) fn inject(&self, operation: Operation, successes_first: usize, mode: FailureMode) {
        lock(&self.injections).insert(
            operation,
            Injection {
                successes_left: successes_first,
                mode,
            },
        );
    }

    pub(crate) fn clear(&self) {
        lock(&self.injections).clear();
    }

    /// Consumes one attempt of `operation` and fails it if scripted to
    ///
    /// [`Reply::Lost`] tells the caller to apply the write and then call
    /// [`never_reply`].
    pub(crate) async fn check(&self, operation: &Operation) -> Result<Reply> {
        let mode = {
            let mut injections = lock(&self.injections);
            let fired = match injections.get_mut(operation) {
                Some(injection) if injection.successes_left > 0 => {
                    injection.successes_left -= 1;
                    None
                }
                Some(injection) => Some(injection.mode),
                None => None,
            };
            if fired == Some(FailureMode::Late) {
                injections.remove(operation);
            }
            fired
        };

        match mode {
            None => Ok(Reply::Prompt),
            Some(FailureMode::Error) => Err(injected_error(operation).into()),
            Some(FailureMode::Hang) => never_reply(operation).await,
            Some(FailureMode::Late) => Ok(Reply::Lost),
        }
    }
}

pub(crate) async fn never_reply<T>(operation: &Operation) -> Result<T> {
    tokio::time::sleep(Duration::from_secs(3600)).await;
    Err(injected_error(operation).into())
}

fn injected_error(operation: &Operation) -> PersistenceError {
    match operation {
        Operation::Begin | Operation::Commit | Operation::Rollback => {
            PersistenceError::Transaction(format!("injected failure on {operation:?}"))
        }
        Operation::Search(index) => PersistenceError::SearchIndex {
            status: 503,
            message: format!("injected search failure on '{index}'"),
        },
        Operation::UpdateByQuery(index) => PersistenceError::SearchIndex {
            status: 503,
            message: format!("injected update failure on '{index}'"),
        },
        other => PersistenceError::Update(format!("injected failure on {other:?}")),
    }
}

/// Locks a mutex, recovering the data if a panicking test poisoned it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
