//! Business rule identifiers, verdicts and caller-facing statuses

use crate::domain::ids::{ManifestSourceId, OrderLineId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Business rules that gate whether an order may stay on a manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleId {
    /// BR_PLN_6: every order on a manifest shares the manifest's load type
    LoadType,
    /// BR_PLN_7: every order on a manifest shares the manifest's freight type
    FreightType,
}

impl RuleId {
    /// Code stored in the manifest error log
    pub fn code(&self) -> &'static str {
        match self {
            RuleId::LoadType => "6",
            RuleId::FreightType => "7",
        }
    }

    /// Business rule name
    pub fn business_rule(&self) -> &'static str {
        match self {
            RuleId::LoadType => "BR_PLN_6",
            RuleId::FreightType => "BR_PLN_7",
        }
    }

    /// Severity of a violation of this rule
    pub fn severity(&self) -> Severity {
        match self {
            RuleId::LoadType => Severity::Warning,
            RuleId::FreightType => Severity::Critical,
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.business_rule())
    }
}

impl FromStr for RuleId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "6" | "BR_PLN_6" => Ok(RuleId::LoadType),
            "7" | "BR_PLN_7" => Ok(RuleId::FreightType),
            other => Err(format!("Unknown rule id '{other}'")),
        }
    }
}

/// Violation severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    Warning,
}

impl Severity {
    /// Caller-facing status for a violation of this severity
    pub fn status(&self) -> ResponseStatus {
        match self {
            Severity::Critical => ResponseStatus::Critical,
            Severity::Warning => ResponseStatus::Warning,
        }
    }
}

/// Status field of every caller-facing result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseStatus {
    #[serde(rename = "All good")]
    AllGood,
    #[serde(rename = "Critical")]
    Critical,
    #[serde(rename = "Warning")]
    Warning,
    #[serde(rename = "matched")]
    Matched,
    #[serde(rename = "success")]
    Success,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::AllGood => "All good",
            ResponseStatus::Critical => "Critical",
            ResponseStatus::Warning => "Warning",
            ResponseStatus::Matched => "matched",
            ResponseStatus::Success => "success",
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One order whose attribute disagrees with its manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    pub order_line_id: OrderLineId,
    pub expected: String,
    pub actual: String,
}

/// Structured rule violation
///
/// The ledger message is derived from these fields; tests and callers should
/// assert on the fields rather than on the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub rule: RuleId,
    pub manifest_source_id: ManifestSourceId,
    pub severity: Severity,
    pub mismatches: Vec<Mismatch>,
}

impl Violation {
    /// Human-readable message listing each mismatched order once
    pub fn message(&self) -> String {
        self.mismatches
            .iter()
            .map(|m| {
                format!(
                    "Manifest '{}' is an '{}' whereas Order '{}' is a '{}' order",
                    self.manifest_source_id, m.expected, m.order_line_id, m.actual
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Outcome of evaluating one rule against one manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleVerdict {
    /// Every attached order agrees with the manifest attribute
    AllGood,
    /// The manifest attribute was unset and has just been set from an order;
    /// every attached order agrees with it
    Canonicalized { value: String },
    /// At least one attached order disagrees
    Violation(Violation),
}

impl RuleVerdict {
    /// Caller-facing status for this verdict
    pub fn status(&self) -> ResponseStatus {
        match self {
            RuleVerdict::AllGood => ResponseStatus::AllGood,
            RuleVerdict::Canonicalized { .. } => ResponseStatus::Matched,
            RuleVerdict::Violation(v) => v.severity.status(),
        }
    }

    pub fn is_violation(&self) -> bool {
        matches!(self, RuleVerdict::Violation(_))
    }
}
