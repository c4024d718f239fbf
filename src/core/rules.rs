//! Manifest consistency rules
//!
//! BR_PLN_7 (freight type) and BR_PLN_6 (load type) share one shape: every
//! order attached to a manifest must carry the manifest's value of one
//! attribute. A [`ManifestAttribute`] describes where that attribute lives
//! in each store and how values are compared; [`assess`] is the pure
//! decision and [`RuleEvaluator`] wires it to the stores.
//!
//! An unset manifest attribute is canonicalized from the order with the
//! lowest order line id that carries a value. Once set it is never
//! overwritten here: later disagreements are violations.

use crate::adapters::relational::{columns, Fields, Table};
use crate::adapters::search::{FieldPatch, Query};
use crate::core::catalog::{Catalog, ManifestSnapshot};
use crate::core::coordinator::{ConsistencyCoordinator, NotFound, Step};
use crate::domain::ids::{ManifestSourceId, OrderLineId};
use crate::domain::{
    manifest, order, LadingError, Manifest, Mismatch, Order, PersistenceError, Result, RuleId,
    RuleVerdict, Violation,
};
use crate::log_rule_verdict;
use std::fmt;
use std::sync::Arc;

/// How order and manifest values are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// Surrounding whitespace and case are ignored
    CaseInsensitiveTrimmed,
    /// Values must be byte-identical
    Exact,
}

impl Normalization {
    pub fn matches(&self, expected: &str, actual: &str) -> bool {
        match self {
            Normalization::CaseInsensitiveTrimmed => {
                expected.trim().to_lowercase() == actual.trim().to_lowercase()
            }
            Normalization::Exact => expected == actual,
        }
    }
}

/// Describes one rule-governed manifest attribute
#[derive(Clone, Copy)]
pub struct ManifestAttribute {
    pub rule: RuleId,
    /// Field of the indexed order document
    pub order_field: &'static str,
    /// Field of the indexed manifest document
    pub manifest_field: &'static str,
    /// Column of the relational manifest table
    pub column: &'static str,
    pub normalization: Normalization,
    order_value: fn(&Order) -> Option<&str>,
    manifest_value: fn(&Manifest) -> Option<&str>,
}

impl fmt::Debug for ManifestAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManifestAttribute")
            .field("rule", &self.rule)
            .field("order_field", &self.order_field)
            .field("manifest_field", &self.manifest_field)
            .field("column", &self.column)
            .field("normalization", &self.normalization)
            .finish_non_exhaustive()
    }
}

fn order_freight_type(order: &Order) -> Option<&str> {
    order.freight_type.as_deref()
}

fn order_load_type(order: &Order) -> Option<&str> {
    order.load_type.as_deref()
}

fn manifest_freight_type(manifest: &Manifest) -> Option<&str> {
    manifest.freight_type.as_deref()
}

fn manifest_load_type(manifest: &Manifest) -> Option<&str> {
    manifest.load_type.as_deref()
}

impl ManifestAttribute {
    /// BR_PLN_7
    pub const FREIGHT_TYPE: ManifestAttribute = ManifestAttribute {
        rule: RuleId::FreightType,
        order_field: order::fields::FREIGHT_TYPE,
        manifest_field: manifest::fields::FREIGHT_TYPE,
        column: columns::MANIFEST_FREIGHT_TYPE,
        normalization: Normalization::CaseInsensitiveTrimmed,
        order_value: order_freight_type,
        manifest_value: manifest_freight_type,
    };

    /// BR_PLN_6
    pub const LOAD_TYPE: ManifestAttribute = ManifestAttribute {
        rule: RuleId::LoadType,
        order_field: order::fields::LOAD_TYPE,
        manifest_field: manifest::fields::LOAD_TYPE,
        column: columns::MANIFEST_LOAD_TYPE,
        normalization: Normalization::Exact,
        order_value: order_load_type,
        manifest_value: manifest_load_type,
    };

    pub fn for_rule(rule: RuleId) -> Self {
        match rule {
            RuleId::FreightType => Self::FREIGHT_TYPE,
            RuleId::LoadType => Self::LOAD_TYPE,
        }
    }

    /// Value carried by an order, `None` when unset
    pub fn order_value<'a>(&self, order: &'a Order) -> Option<&'a str> {
        (self.order_value)(order).filter(|v| !is_unset(v))
    }

    /// Value recorded on a manifest, `None` when unset
    pub fn manifest_value<'a>(&self, manifest: &'a Manifest) -> Option<&'a str> {
        (self.manifest_value)(manifest).filter(|v| !is_unset(v))
    }
}

fn is_unset(value: &str) -> bool {
    value.trim().is_empty()
}

/// Outcome of comparing a manifest with its orders, before any write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    /// Value to write to an unset manifest attribute
    pub canonical_value: Option<String>,
    /// Orders disagreeing with the (possibly canonicalized) manifest value
    pub mismatches: Vec<Mismatch>,
}

impl Assessment {
    pub fn into_verdict(self, rule: RuleId, manifest_source_id: &ManifestSourceId) -> RuleVerdict {
        if !self.mismatches.is_empty() {
            return RuleVerdict::Violation(Violation {
                rule,
                manifest_source_id: manifest_source_id.clone(),
                severity: rule.severity(),
                mismatches: self.mismatches,
            });
        }
        match self.canonical_value {
            Some(value) => RuleVerdict::Canonicalized { value },
            None => RuleVerdict::AllGood,
        }
    }
}

/// Compares a manifest attribute with the orders attached to the manifest
///
/// Orders are visited by ascending order line id, which makes both the
/// canonical value and the mismatch order independent of fetch order. An
/// order without a value disagrees with any set manifest value.
pub fn assess(
    attribute: &ManifestAttribute,
    manifest: &Manifest,
    orders: &[Order],
) -> Result<Assessment> {
    let mut values = orders
        .iter()
        .map(|o| {
            OrderLineId::new(o.order_line_id.as_str())
                .map(|id| (id, attribute.order_value(o)))
                .map_err(|e| {
                    LadingError::from(PersistenceError::InvalidResponse(format!(
                        "Order without line id on manifest '{}': {e}",
                        manifest.source_id
                    )))
                })
        })
        .collect::<Result<Vec<_>>>()?;
    values.sort_by(|a, b| a.0.cmp(&b.0));

    let (expected, canonical_value) = match attribute.manifest_value(manifest) {
        Some(value) => (value.to_string(), None),
        None => match values.iter().find_map(|(_, v)| *v) {
            Some(value) => (value.to_string(), Some(value.to_string())),
            // nothing to lock the manifest to yet
            None => {
                return Ok(Assessment {
                    canonical_value: None,
                    mismatches: Vec::new(),
                })
            }
        },
    };

    let mismatches = values
        .into_iter()
        .filter(|(_, actual)| !attribute.normalization.matches(&expected, actual.unwrap_or("")))
        .map(|(order_line_id, actual)| Mismatch {
            order_line_id,
            expected: expected.clone(),
            actual: actual.unwrap_or_default().to_string(),
        })
        .collect();

    Ok(Assessment {
        canonical_value,
        mismatches,
    })
}

/// Steps writing a canonical value to the manifest in both stores
///
/// The index step restores the manifest document's previous value if the
/// relational commit fails.
pub fn canonicalization_steps(
    attribute: &ManifestAttribute,
    manifest_source_id: &ManifestSourceId,
    value: &str,
    snapshot: &ManifestSnapshot,
    manifests_index: &str,
) -> Vec<Step> {
    let not_found = NotFound::Manifest(manifest_source_id.to_string());
    let patch = FieldPatch::new().set(attribute.manifest_field, value);
    let inverse = patch.inverse_from(&snapshot.document);

    vec![
        Step::update(
            format!("relational:manifest-{}", attribute.rule.business_rule()),
            Table::Manifest,
            Fields::new().with(attribute.column, value),
            Fields::new().with(columns::MANIFEST_SRC_ID, manifest_source_id.as_str()),
        )
        .require_match(not_found.clone()),
        Step::index_update(
            format!("index:manifest-{}", attribute.rule.business_rule()),
            manifests_index,
            Query::matching(manifest::fields::SOURCE_ID, manifest_source_id.as_str()),
            patch,
        )
        .compensated_by(inverse)
        .require_match(not_found),
    ]
}

/// Evaluates manifest rules against the stores
#[derive(Clone)]
pub struct RuleEvaluator {
    catalog: Catalog,
    coordinator: Arc<ConsistencyCoordinator>,
}

impl RuleEvaluator {
    pub fn new(catalog: Catalog, coordinator: Arc<ConsistencyCoordinator>) -> Self {
        Self {
            catalog,
            coordinator,
        }
    }

    /// Evaluates one rule for one manifest
    ///
    /// Canonicalization is written through the coordinator before the
    /// verdict is returned. The error ledger is not touched here.
    ///
    /// # Errors
    ///
    /// [`LadingError::ManifestNotFound`] when no order is attached to the
    /// manifest or the manifest is not indexed.
    pub async fn evaluate(
        &self,
        attribute: &ManifestAttribute,
        manifest_source_id: &ManifestSourceId,
    ) -> Result<RuleVerdict> {
        let (orders, snapshot) = futures::try_join!(
            self.catalog.orders_on_manifest(manifest_source_id),
            self.catalog.manifest(manifest_source_id),
        )?;
        if orders.is_empty() {
            return Err(LadingError::ManifestNotFound(manifest_source_id.to_string()));
        }
        let snapshot = snapshot
            .ok_or_else(|| LadingError::ManifestNotFound(manifest_source_id.to_string()))?;

        let assessment = assess(attribute, &snapshot.manifest, &orders)?;

        if let Some(value) = &assessment.canonical_value {
            tracing::info!(
                rule_id = %attribute.rule,
                manifest_source_id = %manifest_source_id,
                value = %value,
                "Canonicalizing unset manifest attribute"
            );
            let steps = canonicalization_steps(
                attribute,
                manifest_source_id,
                value,
                &snapshot,
                &self.catalog.indices().manifests,
            );
            self.coordinator.run("canonicalize", steps).await?;
        }

        let verdict = assessment.into_verdict(attribute.rule, manifest_source_id);
        log_rule_verdict!(attribute.rule, manifest_source_id, &verdict);
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn order(id: &str, freight: Option<&str>, load: Option<&str>) -> Order {
        Order {
            order_id: None,
            order_line_id: id.to_string(),
            manifest_source_id: Some("M1".to_string()),
            freight_type: freight.map(str::to_string),
            load_type: load.map(str::to_string),
            status: Some("Planned".to_string()),
        }
    }

    fn manifest(freight: Option<&str>, load: Option<&str>) -> Manifest {
        Manifest {
            id: None,
            source_id: "M1".to_string(),
            freight_type: freight.map(str::to_string),
            load_type: load.map(str::to_string),
        }
    }

    #[test_case("FTL", "FTL", true ; "identical")]
    #[test_case("FTL", "ftl", true ; "case differs")]
    #[test_case("FTL", " FTL  ", true ; "surrounding whitespace")]
    #[test_case("FTL", "LTL", false ; "different value")]
    #[test_case("FTL", "", false ; "empty order value")]
    fn test_freight_type_normalization(expected: &str, actual: &str, matches: bool) {
        assert_eq!(
            Normalization::CaseInsensitiveTrimmed.matches(expected, actual),
            matches
        );
    }

    #[test_case("Dry", "Dry", true ; "identical")]
    #[test_case("Dry", "dry", false ; "case differs")]
    #[test_case("Dry", "Dry ", false ; "trailing whitespace")]
    fn test_load_type_is_exact(expected: &str, actual: &str, matches: bool) {
        assert_eq!(Normalization::Exact.matches(expected, actual), matches);
    }

    #[test]
    fn test_set_attribute_all_agree() {
        let orders = vec![order("O1", Some("ltl"), None), order("O2", Some(" LTL"), None)];
        let manifest = manifest(Some("LTL"), None);
        let assessment = assess(&ManifestAttribute::FREIGHT_TYPE, &manifest, &orders).unwrap();
        assert_eq!(assessment.canonical_value, None);
        assert!(assessment.mismatches.is_empty());
        let id = ManifestSourceId::new("M1").unwrap();
        assert_eq!(assessment.into_verdict(RuleId::FreightType, &id), RuleVerdict::AllGood);
    }

    #[test]
    fn test_set_attribute_lists_each_mismatch_once() {
        let orders = vec![
            order("O3", Some("LTL"), None),
            order("O1", Some("FTL"), None),
            order("O2", None, None),
        ];
        let manifest = manifest(Some("FTL"), None);
        let assessment = assess(&ManifestAttribute::FREIGHT_TYPE, &manifest, &orders).unwrap();
        let ids: Vec<_> = assessment
            .mismatches
            .iter()
            .map(|m| m.order_line_id.as_str())
            .collect();
        assert_eq!(ids, vec!["O2", "O3"]);
        assert_eq!(assessment.mismatches[1].actual, "LTL");
        assert_eq!(assessment.mismatches[1].expected, "FTL");
    }

    #[test]
    fn test_unset_attribute_canonicalizes_from_lowest_id() {
        let orders = vec![
            order("O2", None, Some("Frozen")),
            order("O1", None, Some("Dry")),
        ];
        let assessment =
            assess(&ManifestAttribute::LOAD_TYPE, &manifest(None, Some("  ")), &orders).unwrap();
        assert_eq!(assessment.canonical_value.as_deref(), Some("Dry"));
        assert_eq!(assessment.mismatches.len(), 1);
        assert_eq!(assessment.mismatches[0].order_line_id.as_str(), "O2");
    }

    #[test]
    fn test_canonical_value_follows_numeric_line_order() {
        let orders = vec![
            order("O10", Some("FTL"), None),
            order("O9", Some("LTL"), None),
        ];
        let assessment =
            assess(&ManifestAttribute::FREIGHT_TYPE, &manifest(None, None), &orders).unwrap();
        assert_eq!(assessment.canonical_value.as_deref(), Some("LTL"));
        assert_eq!(assessment.mismatches[0].order_line_id.as_str(), "O10");
    }

    #[test]
    fn test_canonical_value_skips_orders_without_value() {
        let orders = vec![order("O1", Some(""), None), order("O2", Some("LTL"), None)];
        let assessment =
            assess(&ManifestAttribute::FREIGHT_TYPE, &manifest(None, None), &orders).unwrap();
        assert_eq!(assessment.canonical_value.as_deref(), Some("LTL"));
        assert_eq!(assessment.mismatches.len(), 1);
    }

    #[test]
    fn test_unset_everywhere_is_all_good() {
        let orders = vec![order("O1", None, None)];
        let assessment =
            assess(&ManifestAttribute::FREIGHT_TYPE, &manifest(None, None), &orders).unwrap();
        assert_eq!(assessment, Assessment { canonical_value: None, mismatches: vec![] });
    }

    #[test]
    fn test_canonicalized_verdict() {
        let orders = vec![order("O1", Some("LTL"), None), order("O2", Some("LTL"), None)];
        let assessment =
            assess(&ManifestAttribute::FREIGHT_TYPE, &manifest(None, None), &orders).unwrap();
        let id = ManifestSourceId::new("M1").unwrap();
        assert_eq!(
            assessment.into_verdict(RuleId::FreightType, &id),
            RuleVerdict::Canonicalized { value: "LTL".to_string() }
        );
    }

    #[test]
    fn test_canonicalization_steps_target_both_stores() {
        let id = ManifestSourceId::new("M1").unwrap();
        let snapshot = ManifestSnapshot {
            manifest: manifest(None, None),
            document: serde_json::json!({"sourceId": "M1", "freightType": null}),
        };
        let steps = canonicalization_steps(
            &ManifestAttribute::FREIGHT_TYPE,
            &id,
            "LTL",
            &snapshot,
            "manifest",
        );
        assert_eq!(steps.len(), 2);
        assert!(steps.iter().all(Step::is_compensable));
        assert_eq!(steps[0].name, "relational:manifest-BR_PLN_7");
    }
}
