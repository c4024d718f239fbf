//! End-to-end rule checks against the in-memory stores

use fake::Fake;
use lading::adapters::factory::Stores;
use lading::adapters::memory::{MemoryRelationalStore, MemorySearchIndex, Operation};
use lading::adapters::relational::{columns, Fields, Table};
use lading::core::service::{ManifestRuleService, ServiceSettings};
use lading::domain::{LadingError, ResponseStatus, RuleVerdict};
use serde_json::{json, Value};
use std::sync::Arc;

const ORDERS: &str = "unplanned_orders";
const MANIFESTS: &str = "manifest";

struct Harness {
    relational: MemoryRelationalStore,
    search: MemorySearchIndex,
    service: ManifestRuleService,
}

impl Harness {
    fn new() -> Self {
        Self::with_settings(ServiceSettings::default())
    }

    fn with_settings(settings: ServiceSettings) -> Self {
        let relational = MemoryRelationalStore::new();
        let search = MemorySearchIndex::new();
        let stores = Stores::new(Arc::new(relational.clone()), Arc::new(search.clone()));
        Self {
            relational,
            search,
            service: ManifestRuleService::new(stores, settings),
        }
    }

    fn manifest(&self, source_id: &str, freight_type: Option<&str>, load_type: Option<&str>) {
        self.search.insert(
            MANIFESTS,
            json!({
                "id": 1,
                "sourceId": source_id,
                "freightType": freight_type,
                "loadType": load_type,
            }),
        );
        let mut row = Fields::new().with(columns::MANIFEST_SRC_ID, source_id);
        row = match freight_type {
            Some(v) => row.with(columns::MANIFEST_FREIGHT_TYPE, v),
            None => row.with_null(columns::MANIFEST_FREIGHT_TYPE),
        };
        row = match load_type {
            Some(v) => row.with(columns::MANIFEST_LOAD_TYPE, v),
            None => row.with_null(columns::MANIFEST_LOAD_TYPE),
        };
        self.relational.insert(Table::Manifest, row);
    }

    fn order(&self, order_line_id: &str, manifest: &str, freight_type: Value, load_type: Value) {
        self.search.insert(
            ORDERS,
            json!({
                "order_LN_ID": order_line_id,
                "mnfst_SRC_ID": manifest,
                "frght_TYPE": freight_type,
                "order_LN_LOAD_TYPE": load_type,
                "order_STTS": "Planned",
            }),
        );
    }

    fn manifest_document(&self, source_id: &str) -> Value {
        self.search
            .documents(MANIFESTS)
            .into_iter()
            .find(|d| d["sourceId"] == source_id)
            .expect("manifest document")
    }

    fn manifest_row(&self, source_id: &str) -> Fields {
        self.relational
            .find(
                Table::Manifest,
                &Fields::new().with(columns::MANIFEST_SRC_ID, source_id),
            )
            .into_iter()
            .next()
            .expect("manifest row")
    }

    fn ledger(&self, source_id: &str) -> Vec<Fields> {
        self.relational.find(
            Table::ManifestErrorLog,
            &Fields::new().with(columns::MANIFEST_SRC_ID, source_id),
        )
    }
}

#[tokio::test]
async fn test_unset_freight_type_is_canonicalized_in_both_stores() {
    let h = Harness::new();
    h.manifest("M1", None, None);
    h.order("O2", "M1", json!(" ltl "), Value::Null);
    h.order("O1", "M1", json!("LTL"), Value::Null);

    let result = h.service.check_freight_type("M1").await.unwrap();
    assert_eq!(result.status, ResponseStatus::Matched);
    assert_eq!(result.canonical_value.as_deref(), Some("LTL"));

    assert_eq!(h.manifest_document("M1")["freightType"], "LTL");
    assert_eq!(
        h.manifest_row("M1").get(columns::MANIFEST_FREIGHT_TYPE),
        Some("LTL")
    );
    assert!(h.ledger("M1").is_empty());

    // second pass sees the canonical value and the trimmed, case-folded order
    let again = h.service.check_freight_type("M1").await.unwrap();
    assert_eq!(again.status, ResponseStatus::AllGood);
    assert_eq!(again.verdict, RuleVerdict::AllGood);
}

#[tokio::test]
async fn test_canonical_value_comes_from_lowest_populated_order() {
    let h = Harness::new();
    h.manifest("M7", None, None);
    h.order("O9", "M7", json!("FTL"), Value::Null);
    h.order("O3", "M7", json!("   "), Value::Null);
    h.order("O5", "M7", json!("LTL"), Value::Null);

    let result = h.service.check_freight_type("M7").await.unwrap();
    assert_eq!(result.canonical_value.as_deref(), Some("LTL"));
    assert_eq!(h.manifest_document("M7")["freightType"], "LTL");
}

#[tokio::test]
async fn test_freight_type_mismatch_is_critical_and_logged() {
    let h = Harness::new();
    h.manifest("M2", Some("FTL"), None);
    h.order("O1", "M2", json!("ftl"), Value::Null);
    h.order("O3", "M2", json!("LTL"), Value::Null);

    let result = h.service.check_freight_type("M2").await.unwrap();
    assert_eq!(result.status, ResponseStatus::Critical);
    let message = result.message.expect("violation message");
    assert!(message.contains("O3"));
    assert!(message.contains("LTL"));
    assert!(!message.contains("O1"));

    let ledger = h.ledger("M2");
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].get(columns::MANIFEST_RULE_ID), Some("7"));
    assert_eq!(ledger[0].get(columns::MANIFEST_RULE_MSG), Some(message.as_str()));

    // the manifest value itself is never rewritten on a violation
    assert_eq!(h.manifest_document("M2")["freightType"], "FTL");
}

#[tokio::test]
async fn test_repeated_violation_keeps_one_ledger_record() {
    let h = Harness::new();
    h.manifest("M2", Some("FTL"), None);
    h.order("O3", "M2", json!("LTL"), Value::Null);

    h.service.check_freight_type("M2").await.unwrap();
    h.service.check_freight_type("M2").await.unwrap();

    assert_eq!(h.ledger("M2").len(), 1);
}

#[tokio::test]
async fn test_load_type_comparison_is_exact_and_warns() {
    let h = Harness::new();
    h.manifest("M3", None, Some("Floor"));
    h.order("O1", "M3", Value::Null, json!("Floor"));
    h.order("O2", "M3", Value::Null, json!("floor"));

    let result = h.service.check_load_type("M3").await.unwrap();
    assert_eq!(result.status, ResponseStatus::Warning);
    assert_eq!(result.rule_id, "6");
    assert!(result.message.unwrap().contains("O2"));

    let ledger = h.ledger("M3");
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].get(columns::MANIFEST_RULE_ID), Some("6"));
}

#[tokio::test]
async fn test_canonicalization_then_mismatch_reports_violation() {
    let h = Harness::new();
    h.manifest("M4", None, None);
    h.order("O1", "M4", Value::Null, json!("Pallet"));
    h.order("O2", "M4", Value::Null, json!("Floor"));

    let result = h.service.check_load_type("M4").await.unwrap();
    assert_eq!(result.status, ResponseStatus::Warning);
    assert_eq!(h.manifest_document("M4")["loadType"], "Pallet");
    assert_eq!(h.ledger("M4").len(), 1);
}

#[tokio::test]
async fn test_all_orders_unset_is_all_good() {
    let h = Harness::new();
    h.manifest("M5", None, None);
    h.order("O1", "M5", Value::Null, Value::Null);
    h.order("O2", "M5", json!(""), json!(" "));

    let result = h.service.check_freight_type("M5").await.unwrap();
    assert_eq!(result.status, ResponseStatus::AllGood);
    assert!(h.manifest_document("M5")["freightType"].is_null());
    assert!(h.search.updates().is_empty());
}

#[tokio::test]
async fn test_resolved_violation_is_cleared() {
    let h = Harness::new();
    h.manifest("M6", Some("FTL"), None);
    h.manifest("M13", Some("LTL"), None);
    h.order("O1", "M6", json!("LTL"), Value::Null);
    h.order("O2", "M6", json!("FTL"), Value::Null);
    h.relational.insert(
        Table::Orderline,
        Fields::new()
            .with(columns::ORDERLINE_ID, "O1")
            .with(columns::MANIFEST_SOURCE_ID, "M6")
            .with(columns::ORDERLINE_STATUS, "Planned"),
    );

    h.service.check_freight_type("M6").await.unwrap();
    assert_eq!(h.ledger("M6").len(), 1);

    // moving the offending order away resolves the violation on M6
    h.service.remove_order_from_manifest("O1", "M13").await.unwrap();

    let result = h.service.check_freight_type("M6").await.unwrap();
    assert_eq!(result.status, ResponseStatus::AllGood);
    assert!(h.ledger("M6").is_empty());
}

#[tokio::test]
async fn test_violation_is_kept_when_clearing_is_disabled() {
    let h = Harness::with_settings(ServiceSettings {
        clear_resolved_violations: false,
        ..ServiceSettings::default()
    });
    h.manifest("M8", Some("FTL"), None);
    h.order("O1", "M8", json!("FTL"), Value::Null);
    h.relational.insert(
        Table::ManifestErrorLog,
        Fields::new()
            .with(columns::MANIFEST_SRC_ID, "M8")
            .with(columns::MANIFEST_RULE_ID, "7")
            .with(columns::MANIFEST_RULE_MSG, "stale"),
    );

    let result = h.service.check_freight_type("M8").await.unwrap();
    assert_eq!(result.status, ResponseStatus::AllGood);
    assert_eq!(h.ledger("M8").len(), 1);
}

#[tokio::test]
async fn test_passing_rule_clears_live_record() {
    let h = Harness::new();
    h.manifest("M9", Some("FTL"), None);
    h.order("O1", "M9", json!("FTL"), Value::Null);
    h.relational.insert(
        Table::ManifestErrorLog,
        Fields::new()
            .with(columns::MANIFEST_SRC_ID, "M9")
            .with(columns::MANIFEST_RULE_ID, "7")
            .with(columns::MANIFEST_RULE_MSG, "stale"),
    );
    h.relational.insert(
        Table::ManifestErrorLog,
        Fields::new()
            .with(columns::MANIFEST_SRC_ID, "M9")
            .with(columns::MANIFEST_RULE_ID, "6")
            .with(columns::MANIFEST_RULE_MSG, "load type"),
    );

    let result = h.service.check_freight_type("M9").await.unwrap();
    assert_eq!(result.status, ResponseStatus::AllGood);

    let ledger = h.ledger("M9");
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].get(columns::MANIFEST_RULE_ID), Some("6"));
}

#[tokio::test]
async fn test_manifest_without_orders_is_not_found() {
    let h = Harness::new();
    h.manifest("M10", Some("FTL"), None);

    let err = h.service.check_freight_type("M10").await.unwrap_err();
    assert!(matches!(err, LadingError::ManifestNotFound(ref id) if id == "M10"));
    assert!(err.is_client_error());
}

#[tokio::test]
async fn test_blank_manifest_id_touches_no_store() {
    let h = Harness::new();
    h.search.inject_failure(Operation::Search(ORDERS.to_string()), 0);

    let err = h.service.check_load_type("   ").await.unwrap_err();
    match err {
        LadingError::Validation { fields } => assert_eq!(fields, vec!["manifestSourceId"]),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(h.relational.commit_count(), 0);
}

#[tokio::test]
async fn test_failed_canonicalization_leaves_manifest_unset() {
    let h = Harness::new();
    h.manifest("M11", None, None);
    h.order("O1", "M11", json!("LTL"), Value::Null);
    h.search
        .inject_failure(Operation::UpdateByQuery(MANIFESTS.to_string()), 0);

    let err = h.service.check_freight_type("M11").await.unwrap_err();
    assert!(!err.is_client_error());
    assert_eq!(err.public_message(), "Internal error");

    assert!(h.manifest_document("M11")["freightType"].is_null());
    assert_eq!(h.manifest_row("M11").get(columns::MANIFEST_FREIGHT_TYPE), None);
    assert_eq!(h.relational.rollback_count(), 1);
}

#[tokio::test]
async fn test_many_orders_report_each_mismatch_once() {
    let h = Harness::new();
    h.manifest("M12", Some("FTL"), None);
    let count: usize = (3..12).fake();
    for i in 0..count {
        h.order(&format!("O{i:03}"), "M12", json!("LTL"), Value::Null);
    }

    let result = h.service.check_freight_type("M12").await.unwrap();
    match result.verdict {
        RuleVerdict::Violation(violation) => assert_eq!(violation.mismatches.len(), count),
        other => panic!("expected violation, got {other:?}"),
    }
}
