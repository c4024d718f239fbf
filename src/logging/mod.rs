//! Logging and observability
//!
//! Structured logging with:
//! - Human-readable console output
//! - JSON-formatted local log files with rotation
//! - `RUST_LOG` overriding the configured level
//!
//! # Example
//!
//! ```no_run
//! use lading::logging::init_logging;
//! use lading::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!(manifest_source_id = "M1", "Checking freight type");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};

/// Log the verdict of one rule evaluation
///
/// Violations log at `warn`, everything else at `info`.
///
/// # Example
///
/// ```no_run
/// use lading::log_rule_verdict;
/// use lading::domain::{ManifestSourceId, RuleId, RuleVerdict};
///
/// let manifest = ManifestSourceId::new("M1").unwrap();
/// log_rule_verdict!(RuleId::FreightType, &manifest, &RuleVerdict::AllGood);
/// ```
#[macro_export]
macro_rules! log_rule_verdict {
    ($rule:expr, $manifest:expr, $verdict:expr) => {
        match $verdict {
            $crate::domain::RuleVerdict::Violation(violation) => tracing::warn!(
                rule_id = %$rule,
                manifest_source_id = %$manifest,
                status = %$verdict.status(),
                mismatches = violation.mismatches.len(),
                "Business rule violated"
            ),
            other => tracing::info!(
                rule_id = %$rule,
                manifest_source_id = %$manifest,
                status = %other.status(),
                "Business rule satisfied"
            ),
        }
    };
}

/// Log a failed compensation at the highest severity
///
/// The stores are inconsistent after this and need manual reconciliation.
///
/// # Example
///
/// ```no_run
/// use lading::log_compensation_failure;
///
/// log_compensation_failure!(
///     "saga-1",
///     "index:update-order",
///     "timeout",
///     "relational update failed"
/// );
/// ```
#[macro_export]
macro_rules! log_compensation_failure {
    ($saga_id:expr, $step:expr, $reason:expr, $original:expr) => {
        tracing::error!(
            saga_id = %$saga_id,
            step = %$step,
            reason = %$reason,
            original_error = %$original,
            severity = "critical",
            "Compensation failed, stores are inconsistent and need manual reconciliation"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use lading::log_error_with_context;
/// use lading::domain::LadingError;
///
/// let error = LadingError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

#[cfg(test)]
mod tests {
    use crate::domain::{ManifestSourceId, RuleId, RuleVerdict};

    #[test]
    fn test_macros_expand_without_subscriber() {
        let manifest = ManifestSourceId::new("M1").unwrap();
        log_rule_verdict!(RuleId::LoadType, &manifest, &RuleVerdict::AllGood);
        log_compensation_failure!("saga", "step", "reason", "original");
        log_error_with_context!("boom", "context");
    }
}
