//! Manifest error ledger
//!
//! Holds at most one live violation record per `(manifest, rule)`. Recording
//! deletes any prior record for the key and inserts the new one inside the
//! same relational transaction.

use crate::adapters::relational::{columns, Fields, Table};
use crate::core::coordinator::{ConsistencyCoordinator, Step, StepResult};
use crate::domain::ids::ManifestSourceId;
use crate::domain::{ManifestErrorLog, Result, RuleId, Violation};
use std::sync::Arc;

#[derive(Clone)]
pub struct ErrorLedger {
    coordinator: Arc<ConsistencyCoordinator>,
}

impl ErrorLedger {
    pub fn new(coordinator: Arc<ConsistencyCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Replaces the live record for `(manifest_source_id, rule)`
    ///
    /// Repeated identical calls leave exactly one record.
    pub async fn record(&self, entry: &ManifestErrorLog) -> Result<()> {
        let key = key(&entry.manifest_source_id, entry.rule_id);
        let row = key.clone().with(columns::MANIFEST_RULE_MSG, entry.message.as_str());

        self.coordinator
            .run(
                "ledger-record",
                vec![
                    Step::destroy("relational:ledger-delete", Table::ManifestErrorLog, key),
                    Step::create("relational:ledger-insert", Table::ManifestErrorLog, row),
                ],
            )
            .await?;

        tracing::debug!(
            manifest_source_id = %entry.manifest_source_id,
            rule_id = entry.rule_id.code(),
            "Violation recorded"
        );
        Ok(())
    }

    /// Records a violation under its rule code
    pub async fn record_violation(&self, violation: &Violation) -> Result<()> {
        self.record(&ManifestErrorLog {
            manifest_source_id: violation.manifest_source_id.clone(),
            rule_id: violation.rule,
            message: violation.message(),
        })
        .await
    }

    /// Deletes the live record for `(manifest_source_id, rule)`
    ///
    /// Returns whether a record existed.
    pub async fn clear(&self, manifest_source_id: &ManifestSourceId, rule: RuleId) -> Result<bool> {
        let outcome = self
            .coordinator
            .run(
                "ledger-clear",
                vec![Step::destroy(
                    "relational:ledger-delete",
                    Table::ManifestErrorLog,
                    key(manifest_source_id, rule),
                )],
            )
            .await?;

        let cleared = matches!(outcome.results.first(), Some(StepResult::Rows(n)) if *n > 0);
        if cleared {
            tracing::info!(
                manifest_source_id = %manifest_source_id,
                rule_id = rule.code(),
                "Resolved violation cleared"
            );
        }
        Ok(cleared)
    }
}

fn key(manifest_source_id: &ManifestSourceId, rule: RuleId) -> Fields {
    Fields::new()
        .with(columns::MANIFEST_SRC_ID, manifest_source_id.as_str())
        .with(columns::MANIFEST_RULE_ID, rule.code())
}
