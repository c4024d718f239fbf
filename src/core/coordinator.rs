//! Coordinated writes across the relational store and the search index
//!
//! There is no transaction spanning both stores. A coordinated write is a
//! saga: an ordered list of [`Step`]s run inside one relational transaction.
//! Relational steps are undone by rolling the transaction back. Index steps
//! are already visible when they return, so each one may carry a
//! compensating patch that writes the previous values back.
//!
//! Compensable steps:
//! - relational steps, always (transaction rollback)
//! - index steps built with [`Step::compensated_by`]
//!
//! Index steps without a compensation cannot be undone; a failure after one
//! of them leaves the index ahead of the relational store.
//!
//! An index step that timed out, lost its connection or stopped part way
//! may still have been applied by the cluster, so it is compensated as if it
//! had succeeded. The inverse patch restores absolute values and can be
//! written twice.

use crate::adapters::relational::{Fields, RelationalStore, RelationalTxn, Table};
use crate::adapters::search::{FieldPatch, Query, SearchIndex};
use crate::domain::{LadingError, PersistenceError, Result};
use crate::log_compensation_failure;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Error raised when a step that must touch a record touched none
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFound {
    Order(String),
    Manifest(String),
}

impl NotFound {
    fn into_error(self) -> LadingError {
        match self {
            NotFound::Order(id) => LadingError::OrderNotFound(id),
            NotFound::Manifest(id) => LadingError::ManifestNotFound(id),
        }
    }
}

/// Relational write executed inside the saga's transaction
#[derive(Debug, Clone, PartialEq)]
pub enum RelationalOp {
    Update {
        table: Table,
        set: Fields,
        filter: Fields,
    },
    Create {
        table: Table,
        fields: Fields,
    },
    Destroy {
        table: Table,
        filter: Fields,
    },
    CallFunction {
        function: String,
        argument: Value,
    },
}

/// Index write with its optional inverse
#[derive(Debug, Clone, PartialEq)]
pub struct IndexOp {
    pub index: String,
    pub query: Query,
    pub patch: FieldPatch,
    pub compensation: Option<FieldPatch>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    Relational(RelationalOp),
    Index(IndexOp),
}

/// One step of a coordinated write
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub name: String,
    pub kind: StepKind,
    /// Fails the step when it touched fewer than `min_matches` rows or
    /// documents
    pub require_match: Option<NotFound>,
    pub min_matches: u64,
}

impl Step {
    fn relational(name: impl Into<String>, op: RelationalOp) -> Self {
        Self {
            name: name.into(),
            kind: StepKind::Relational(op),
            require_match: None,
            min_matches: 1,
        }
    }

    pub fn update(name: impl Into<String>, table: Table, set: Fields, filter: Fields) -> Self {
        Self::relational(name, RelationalOp::Update { table, set, filter })
    }

    pub fn create(name: impl Into<String>, table: Table, fields: Fields) -> Self {
        Self::relational(name, RelationalOp::Create { table, fields })
    }

    pub fn destroy(name: impl Into<String>, table: Table, filter: Fields) -> Self {
        Self::relational(name, RelationalOp::Destroy { table, filter })
    }

    pub fn call_function(name: impl Into<String>, function: &str, argument: Value) -> Self {
        Self::relational(
            name,
            RelationalOp::CallFunction {
                function: function.to_string(),
                argument,
            },
        )
    }

    /// Index write without compensation
    pub fn index_update(
        name: impl Into<String>,
        index: impl Into<String>,
        query: Query,
        patch: FieldPatch,
    ) -> Self {
        Self {
            name: name.into(),
            kind: StepKind::Index(IndexOp {
                index: index.into(),
                query,
                patch,
                compensation: None,
            }),
            require_match: None,
            min_matches: 1,
        }
    }

    /// Sets the patch that undoes this index step
    ///
    /// Has no effect on relational steps, which are undone by rollback.
    pub fn compensated_by(mut self, patch: FieldPatch) -> Self {
        if let StepKind::Index(op) = &mut self.kind {
            op.compensation = Some(patch);
        }
        self
    }

    pub fn require_match(self, not_found: NotFound) -> Self {
        self.require_matches(1, not_found)
    }

    /// Fails the step unless it touched at least `count` rows or documents
    pub fn require_matches(mut self, count: u64, not_found: NotFound) -> Self {
        self.require_match = Some(not_found);
        self.min_matches = count;
        self
    }

    pub fn is_compensable(&self) -> bool {
        match &self.kind {
            StepKind::Relational(_) => true,
            StepKind::Index(op) => op.compensation.is_some(),
        }
    }
}

/// What a step returned
#[derive(Debug, Clone, PartialEq)]
pub enum StepResult {
    /// Rows affected by an update or delete
    Rows(u64),
    Created,
    /// Rows returned by a stored function. A function that reports its
    /// affected rows returns `{"updated": n}` as its first row.
    Function(Vec<Value>),
    /// Documents updated in the index
    Documents(u64),
}

impl StepResult {
    fn touched(&self) -> Option<u64> {
        match self {
            StepResult::Rows(n) | StepResult::Documents(n) => Some(*n),
            StepResult::Created => Some(1),
            StepResult::Function(rows) => rows
                .first()
                .and_then(|row| row.get("updated"))
                .and_then(Value::as_u64),
        }
    }
}

/// Index step whose compensation may have to be written
struct Applied<'a> {
    step: &'a Step,
    /// Documents the forward write updated, `None` when its outcome is unknown
    documents: Option<u64>,
}

/// Result of a committed coordinated write
#[derive(Debug, Clone, PartialEq)]
pub struct SagaOutcome {
    pub saga_id: Uuid,
    /// One entry per step, in step order
    pub results: Vec<StepResult>,
}

/// Runs coordinated writes
pub struct ConsistencyCoordinator {
    relational: Arc<dyn RelationalStore>,
    search: Arc<dyn SearchIndex>,
    step_timeout: Duration,
}

impl ConsistencyCoordinator {
    pub fn new(
        relational: Arc<dyn RelationalStore>,
        search: Arc<dyn SearchIndex>,
        step_timeout: Duration,
    ) -> Self {
        Self {
            relational,
            search,
            step_timeout,
        }
    }

    pub fn step_timeout(&self) -> Duration {
        self.step_timeout
    }

    /// Runs `steps` in order and commits the relational transaction once
    /// every step succeeded
    ///
    /// On failure, executed index steps are compensated in reverse order and
    /// the transaction is rolled back. The original error is returned, unless
    /// a compensation failed, in which case
    /// [`LadingError::CompensationFailed`] is returned.
    pub async fn run(&self, saga: &str, steps: Vec<Step>) -> Result<SagaOutcome> {
        let saga_id = Uuid::new_v4();
        tracing::debug!(
            saga = %saga,
            saga_id = %saga_id,
            steps = steps.len(),
            "Starting coordinated write"
        );

        let mut txn = self.timed("begin", self.relational.begin()).await?;
        let mut results = Vec::with_capacity(steps.len());
        let mut applied: Vec<Applied<'_>> = Vec::new();

        for step in &steps {
            match self.execute(txn.as_mut(), step).await {
                Ok(result) => {
                    tracing::debug!(
                        saga_id = %saga_id,
                        step = %step.name,
                        result = ?result,
                        "Step applied"
                    );
                    if matches!(step.kind, StepKind::Index(_)) {
                        applied.push(Applied {
                            step,
                            documents: result.touched(),
                        });
                    }
                    results.push(result);
                }
                Err(e) => {
                    tracing::warn!(
                        saga_id = %saga_id,
                        step = %step.name,
                        error = %e,
                        "Step failed, undoing coordinated write"
                    );
                    if matches!(step.kind, StepKind::Index(_)) && e.may_have_applied() {
                        applied.push(Applied {
                            step,
                            documents: None,
                        });
                    }
                    let compensation = self.compensate(saga_id, &applied, &e).await;
                    self.rollback(saga_id, txn).await;
                    return Err(compensation.err().unwrap_or(e));
                }
            }
        }

        if let Err(e) = self.timed("commit", txn.commit()).await {
            tracing::warn!(saga_id = %saga_id, error = %e, "Commit failed, undoing index writes");
            self.compensate(saga_id, &applied, &e).await?;
            return Err(e);
        }

        tracing::info!(
            saga = %saga,
            saga_id = %saga_id,
            steps = results.len(),
            "Coordinated write committed"
        );
        Ok(SagaOutcome { saga_id, results })
    }

    async fn execute(&self, txn: &mut dyn RelationalTxn, step: &Step) -> Result<StepResult> {
        let result = match &step.kind {
            StepKind::Relational(op) => {
                let future = async {
                    match op {
                        RelationalOp::Update { table, set, filter } => {
                            txn.update(*table, set, filter).await.map(StepResult::Rows)
                        }
                        RelationalOp::Create { table, fields } => {
                            txn.create(*table, fields).await.map(|_| StepResult::Created)
                        }
                        RelationalOp::Destroy { table, filter } => {
                            txn.destroy(*table, filter).await.map(StepResult::Rows)
                        }
                        RelationalOp::CallFunction { function, argument } => txn
                            .call_function(function, argument)
                            .await
                            .map(StepResult::Function),
                    }
                };
                self.timed(&step.name, future).await?
            }
            StepKind::Index(op) => {
                let future = self.search.update_by_query(&op.index, &op.query, &op.patch);
                StepResult::Documents(self.timed(&step.name, future).await?)
            }
        };

        if let (Some(not_found), Some(touched)) = (&step.require_match, result.touched()) {
            if touched < step.min_matches {
                return Err(not_found.clone().into_error());
            }
        }
        Ok(result)
    }

    /// Writes the compensation of every applied index step, newest first
    ///
    /// Every compensation is attempted; the first failure is returned. An
    /// inverse write that matches no document after the forward write
    /// updated some counts as failed.
    async fn compensate(
        &self,
        saga_id: Uuid,
        applied: &[Applied<'_>],
        original: &LadingError,
    ) -> Result<()> {
        let mut first_failure = None;

        for Applied { step, documents } in applied.iter().rev() {
            let StepKind::Index(op) = &step.kind else {
                continue;
            };
            let Some(inverse) = &op.compensation else {
                tracing::warn!(
                    saga_id = %saga_id,
                    step = %step.name,
                    "Index step has no compensation, index left ahead of relational store"
                );
                continue;
            };

            let name = format!("compensate:{}", step.name);
            let future = self.search.update_by_query(&op.index, &op.query, inverse);
            let reason = match (self.timed(&name, future).await, documents) {
                (Ok(0), Some(forward)) if *forward > 0 => format!(
                    "compensation matched none of the {forward} documents the step updated"
                ),
                (Ok(restored), _) => {
                    tracing::info!(
                        saga_id = %saga_id,
                        step = %step.name,
                        documents = restored,
                        "Index step compensated"
                    );
                    continue;
                }
                (Err(e), _) => e.to_string(),
            };

            log_compensation_failure!(saga_id, step.name, reason, original);
            if first_failure.is_none() {
                first_failure = Some(LadingError::CompensationFailed {
                    step: step.name.clone(),
                    reason,
                    original: original.to_string(),
                });
            }
        }

        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn rollback(&self, saga_id: Uuid, txn: Box<dyn RelationalTxn>) {
        match self.timed("rollback", txn.rollback()).await {
            Ok(()) => tracing::debug!(saga_id = %saga_id, "Relational transaction rolled back"),
            // the server aborts the transaction once the connection is gone
            Err(e) => tracing::error!(saga_id = %saga_id, error = %e, "Rollback failed"),
        }
    }

    async fn timed<T, F>(&self, step: &str, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.step_timeout, future).await {
            Ok(result) => result,
            Err(_) => Err(PersistenceError::Timeout {
                step: step.to_string(),
                millis: u64::try_from(self.step_timeout.as_millis()).unwrap_or(u64::MAX),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryRelationalStore, MemorySearchIndex, Operation};
    use crate::adapters::relational::columns;
    use serde_json::json;

    const ORDERS: &str = "orders";

    fn setup() -> (MemoryRelationalStore, MemorySearchIndex, ConsistencyCoordinator) {
        let relational = MemoryRelationalStore::new();
        relational.insert(
            Table::Orderline,
            Fields::new()
                .with(columns::ORDERLINE_ID, "O1")
                .with(columns::MANIFEST_SOURCE_ID, "M1")
                .with(columns::ORDERLINE_STATUS, "Unplanned"),
        );
        let search = MemorySearchIndex::new();
        search.insert(
            ORDERS,
            json!({"order_LN_ID": "O1", "mnfst_SRC_ID": "M1", "order_STTS": "Unplanned"}),
        );
        let coordinator = ConsistencyCoordinator::new(
            Arc::new(relational.clone()),
            Arc::new(search.clone()),
            Duration::from_millis(200),
        );
        (relational, search, coordinator)
    }

    fn steps() -> Vec<Step> {
        let snapshot = json!({"order_STTS": "Unplanned", "mnfst_SRC_ID": "M1"});
        let patch = FieldPatch::new()
            .set("order_STTS", "Planned")
            .set("mnfst_SRC_ID", "M2");
        vec![
            Step::update(
                "relational:orderline",
                Table::Orderline,
                Fields::new()
                    .with(columns::MANIFEST_SOURCE_ID, "M2")
                    .with(columns::ORDERLINE_STATUS, "Planned"),
                Fields::new().with(columns::ORDERLINE_ID, "O1"),
            )
            .require_match(NotFound::Order("O1".into())),
            Step::index_update(
                "index:order",
                ORDERS,
                Query::terms("order_LN_ID", ["O1"]),
                patch.clone(),
            )
            .compensated_by(patch.inverse_from(&snapshot)),
        ]
    }

    fn status(relational: &MemoryRelationalStore) -> Option<String> {
        relational.rows(Table::Orderline)[0]
            .get(columns::ORDERLINE_STATUS)
            .map(str::to_string)
    }

    #[tokio::test]
    async fn test_all_steps_commit() {
        let (relational, search, coordinator) = setup();
        let outcome = coordinator.run("reassign", steps()).await.unwrap();

        assert_eq!(
            outcome.results,
            vec![StepResult::Rows(1), StepResult::Documents(1)]
        );
        assert_eq!(status(&relational).as_deref(), Some("Planned"));
        assert_eq!(search.documents(ORDERS)[0]["order_STTS"], json!("Planned"));
    }

    #[tokio::test]
    async fn test_index_failure_rolls_back_relational() {
        let (relational, search, coordinator) = setup();
        search.inject_failure(Operation::UpdateByQuery(ORDERS.into()), 0);

        let err = coordinator.run("reassign", steps()).await.unwrap_err();
        assert!(matches!(err, LadingError::Persistence(_)));
        assert_eq!(status(&relational).as_deref(), Some("Unplanned"));
        assert_eq!(relational.rollback_count(), 1);
        assert_eq!(relational.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_commit_failure_compensates_index() {
        let (relational, search, coordinator) = setup();
        relational.inject_failure(Operation::Commit, 0);

        let err = coordinator.run("reassign", steps()).await.unwrap_err();
        assert!(matches!(err, LadingError::Persistence(PersistenceError::Transaction(_))));
        let doc = &search.documents(ORDERS)[0];
        assert_eq!(doc["order_STTS"], json!("Unplanned"));
        assert_eq!(doc["mnfst_SRC_ID"], json!("M1"));
    }

    #[tokio::test]
    async fn test_failed_compensation_is_reported() {
        let (relational, search, coordinator) = setup();
        relational.inject_failure(Operation::Commit, 0);
        // forward write succeeds, compensation fails
        search.inject_failure(Operation::UpdateByQuery(ORDERS.into()), 1);

        let err = coordinator.run("reassign", steps()).await.unwrap_err();
        match err {
            LadingError::CompensationFailed { step, original, .. } => {
                assert_eq!(step, "index:order");
                assert!(original.contains("Transaction failed"));
            }
            other => panic!("expected CompensationFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_row_fails_with_not_found() {
        let (relational, search, coordinator) = setup();
        let mut steps = steps();
        steps[0] = Step::update(
            "relational:orderline",
            Table::Orderline,
            Fields::new().with(columns::ORDERLINE_STATUS, "Planned"),
            Fields::new().with(columns::ORDERLINE_ID, "O404"),
        )
        .require_match(NotFound::Order("O404".into()));

        let err = coordinator.run("reassign", steps).await.unwrap_err();
        assert!(matches!(err, LadingError::OrderNotFound(id) if id == "O404"));
        assert!(search.updates().is_empty());
        assert_eq!(relational.rollback_count(), 1);
    }

    #[tokio::test]
    async fn test_hanging_step_times_out() {
        let (relational, search, coordinator) = setup();
        relational.inject_hang(Operation::Update(Table::Orderline), 0);

        let err = coordinator.run("reassign", steps()).await.unwrap_err();
        assert!(matches!(
            err,
            LadingError::Persistence(PersistenceError::Timeout { ref step, millis: 200 })
                if step == "relational:orderline"
        ));
        assert!(search.updates().is_empty());
        assert_eq!(status(&relational).as_deref(), Some("Unplanned"));
    }

    #[tokio::test]
    async fn test_index_that_never_answers_fails_compensation() {
        let (relational, search, coordinator) = setup();
        search.inject_hang(Operation::UpdateByQuery(ORDERS.into()), 0);

        let err = coordinator.run("reassign", steps()).await.unwrap_err();
        match err {
            LadingError::CompensationFailed { step, reason, original } => {
                assert_eq!(step, "index:order");
                assert!(reason.contains("compensate:index:order"));
                assert!(original.contains("'index:order' timed out"));
            }
            other => panic!("expected CompensationFailed, got {other:?}"),
        }
        assert_eq!(status(&relational).as_deref(), Some("Unplanned"));
    }

    #[tokio::test]
    async fn test_late_index_write_is_compensated() {
        let (relational, search, coordinator) = setup();
        search.inject_late_reply(Operation::UpdateByQuery(ORDERS.into()), 0);

        let err = coordinator.run("reassign", steps()).await.unwrap_err();
        assert!(err.may_have_applied());
        assert!(err.to_string().contains("timed out after 200ms"));
        let doc = &search.documents(ORDERS)[0];
        assert_eq!(doc["order_STTS"], json!("Unplanned"));
        assert_eq!(doc["mnfst_SRC_ID"], json!("M1"));
        assert_eq!(status(&relational).as_deref(), Some("Unplanned"));
    }

    #[tokio::test]
    async fn test_compensation_matching_nothing_is_reported() {
        let (relational, search, coordinator) = setup();
        relational.inject_failure(Operation::Commit, 0);
        // the patch moves the document out of its own query
        let query = Query::matching("order_STTS", "Unplanned");
        let patch = FieldPatch::new().set("order_STTS", "Planned");
        let inverse = patch.inverse_from(&json!({"order_STTS": "Unplanned"}));
        let step =
            Step::index_update("index:status", ORDERS, query, patch).compensated_by(inverse);

        let err = coordinator.run("status", vec![step]).await.unwrap_err();
        match err {
            LadingError::CompensationFailed { step, reason, .. } => {
                assert_eq!(step, "index:status");
                assert!(reason.contains("matched none"));
            }
            other => panic!("expected CompensationFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_function_reporting_too_few_rows_fails() {
        let (relational, search, coordinator) = setup();
        let steps = vec![Step::call_function(
            "relational:order-sequence",
            "fn_update_order_seq",
            json!({
                "manifestSourceId": "M1",
                "orders": [
                    {"orderLineId": "O1", "sequence": 1},
                    {"orderLineId": "O404", "sequence": 2}
                ]
            }),
        )
        .require_matches(2, NotFound::Manifest("M1".into()))];

        let err = coordinator.run("sequence", steps).await.unwrap_err();
        assert!(matches!(err, LadingError::ManifestNotFound(id) if id == "M1"));
        assert_eq!(relational.rollback_count(), 1);
        assert!(search.updates().is_empty());
    }

    #[test]
    fn test_function_rows_report_touched() {
        assert_eq!(
            StepResult::Function(vec![json!({"updated": 3})]).touched(),
            Some(3)
        );
        assert_eq!(StepResult::Function(vec![json!([1, 2])]).touched(), None);
        assert_eq!(StepResult::Function(Vec::new()).touched(), None);
    }

    #[test]
    fn test_compensability() {
        let steps = steps();
        assert!(steps[0].is_compensable());
        assert!(steps[1].is_compensable());
        let bare = Step::index_update("x", ORDERS, Query::matching("a", "b"), FieldPatch::new());
        assert!(!bare.is_compensable());
    }
}
