//! Rule check commands
//!
//! Implements `check-freight-type` and `check-load-type`.

use super::{connect, report};
use crate::domain::RuleId;
use clap::Args;

/// Arguments for the rule check commands
#[derive(Args, Debug)]
pub struct RuleArgs {
    /// Manifest source id (e.g. M108265)
    pub manifest_source_id: String,
}

impl RuleArgs {
    /// Execute a rule check
    pub async fn execute(&self, config_path: &str, rule: RuleId) -> anyhow::Result<i32> {
        tracing::info!(
            rule_id = %rule,
            manifest_source_id = %self.manifest_source_id,
            "Checking manifest rule"
        );

        let service = match connect(config_path).await {
            Ok(s) => s,
            Err(code) => return Ok(code),
        };

        report(service.check_rule(rule, &self.manifest_source_id).await)
    }
}
