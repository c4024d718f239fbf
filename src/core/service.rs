//! Manifest rule service
//!
//! The caller-facing operations. Every operation validates its identifiers
//! before touching a store and reports every missing field at once.

use crate::adapters::factory::Stores;
use crate::adapters::search::Aggregation;
use crate::config::LadingConfig;
use crate::core::catalog::{Catalog, IndexNames};
use crate::core::coordinator::ConsistencyCoordinator;
use crate::core::ledger::ErrorLedger;
use crate::core::rules::{ManifestAttribute, RuleEvaluator};
use crate::core::workflows::{self, UpdateStamp};
use crate::domain::ids::{ManifestSourceId, OrderId, OrderLineId};
use crate::domain::order::fields;
use crate::domain::{
    LadingError, OrderDetailsUpdate, OrderSequenceUpdate, ResponseStatus, Result, RuleId,
    RuleVerdict,
};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub const REMOVE_ORDER_MESSAGE: &str = "Remove Order Successfully";
pub const ORDER_DETAILS_MESSAGE: &str = "Order details updated successfully";
pub const ORDER_SEQUENCE_MESSAGE: &str = "Order sequence updated successfully";

/// Service settings taken from configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    pub indices: IndexNames,
    pub step_timeout: Duration,
    /// Delete the live ledger record when a rule is satisfied again
    pub clear_resolved_violations: bool,
    /// User id stamped on order updates
    pub update_user_id: i64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            indices: IndexNames::default(),
            step_timeout: Duration::from_secs(30),
            clear_resolved_violations: true,
            update_user_id: 9999,
        }
    }
}

impl From<&LadingConfig> for ServiceSettings {
    fn from(config: &LadingConfig) -> Self {
        Self {
            indices: IndexNames {
                orders: config.elasticsearch.orders_index.clone(),
                manifests: config.elasticsearch.manifests_index.clone(),
            },
            step_timeout: Duration::from_secs(config.coordinator.step_timeout_seconds),
            clear_resolved_violations: config.rules.clear_resolved_violations,
            update_user_id: config.application.update_user_id,
        }
    }
}

/// Result of one rule check
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCheckResult {
    pub status: ResponseStatus,
    pub manifest_source_id: String,
    pub rule_id: String,
    pub business_rule: String,
    /// Ledger message of a violation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Value the manifest attribute was just set to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_value: Option<String>,
    #[serde(skip)]
    pub verdict: RuleVerdict,
}

impl RuleCheckResult {
    fn new(rule: RuleId, manifest_source_id: &ManifestSourceId, verdict: RuleVerdict) -> Self {
        let (message, canonical_value) = match &verdict {
            RuleVerdict::AllGood => (None, None),
            RuleVerdict::Canonicalized { value } => (None, Some(value.clone())),
            RuleVerdict::Violation(violation) => (Some(violation.message()), None),
        };
        Self {
            status: verdict.status(),
            manifest_source_id: manifest_source_id.to_string(),
            rule_id: rule.code().to_string(),
            business_rule: rule.business_rule().to_string(),
            message,
            canonical_value,
            verdict,
        }
    }
}

/// Outcome of re-checking one rule after a reassignment
///
/// A failed re-check does not undo the committed reassignment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRefresh {
    pub business_rule: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ResponseStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignmentResult {
    pub status: ResponseStatus,
    pub message: String,
    pub order_line_id: String,
    pub manifest_source_id: String,
    pub rules: Vec<RuleRefresh>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub status: ResponseStatus,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommodityWeightResult {
    pub status: ResponseStatus,
    pub manifest_source_id: String,
    pub commodity_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PalletCountResult {
    pub status: ResponseStatus,
    pub manifest_source_id: String,
    pub pallet_count: f64,
}

/// Collects every missing required field before failing
#[derive(Debug, Default)]
struct Required {
    missing: Vec<String>,
}

impl Required {
    fn field<T: FromStr>(&mut self, name: impl Into<String>, value: &str) -> Option<T> {
        match T::from_str(value) {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                self.missing.push(name.into());
                None
            }
        }
    }

    fn check(&mut self, name: impl Into<String>, present: bool) {
        if !present {
            self.missing.push(name.into());
        }
    }

    fn finish<T>(self, value: Option<T>) -> Result<T> {
        match (self.missing.is_empty(), value) {
            (true, Some(value)) => Ok(value),
            _ => Err(LadingError::missing_fields(self.missing)),
        }
    }
}

/// Manifest rule checks and order workflows over both stores
pub struct ManifestRuleService {
    catalog: Catalog,
    coordinator: Arc<ConsistencyCoordinator>,
    evaluator: RuleEvaluator,
    ledger: ErrorLedger,
    settings: ServiceSettings,
}

impl ManifestRuleService {
    pub fn new(stores: Stores, settings: ServiceSettings) -> Self {
        let catalog = Catalog::new(Arc::clone(&stores.search), settings.indices.clone());
        let coordinator = Arc::new(ConsistencyCoordinator::new(
            stores.relational,
            stores.search,
            settings.step_timeout,
        ));
        Self {
            evaluator: RuleEvaluator::new(catalog.clone(), Arc::clone(&coordinator)),
            ledger: ErrorLedger::new(Arc::clone(&coordinator)),
            catalog,
            coordinator,
            settings,
        }
    }

    pub fn from_config(stores: Stores, config: &LadingConfig) -> Self {
        Self::new(stores, ServiceSettings::from(config))
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// BR_PLN_7: every order on the manifest carries its freight type
    pub async fn check_freight_type(&self, manifest_source_id: &str) -> Result<RuleCheckResult> {
        self.check_rule(RuleId::FreightType, manifest_source_id).await
    }

    /// BR_PLN_6: every order on the manifest carries its load type
    pub async fn check_load_type(&self, manifest_source_id: &str) -> Result<RuleCheckResult> {
        self.check_rule(RuleId::LoadType, manifest_source_id).await
    }

    /// Evaluates a rule and brings the error ledger in line with the verdict
    pub async fn check_rule(
        &self,
        rule: RuleId,
        manifest_source_id: &str,
    ) -> Result<RuleCheckResult> {
        let mut required = Required::default();
        let id = required.field::<ManifestSourceId>("manifestSourceId", manifest_source_id);
        let id = required.finish(id)?;

        self.check(&ManifestAttribute::for_rule(rule), &id).await
    }

    async fn check(
        &self,
        attribute: &ManifestAttribute,
        manifest_source_id: &ManifestSourceId,
    ) -> Result<RuleCheckResult> {
        let verdict = self.evaluator.evaluate(attribute, manifest_source_id).await?;

        match &verdict {
            RuleVerdict::Violation(violation) => self.ledger.record_violation(violation).await?,
            _ if self.settings.clear_resolved_violations => {
                self.ledger.clear(manifest_source_id, attribute.rule).await?;
            }
            _ => {}
        }

        Ok(RuleCheckResult::new(attribute.rule, manifest_source_id, verdict))
    }

    /// Moves an order line onto a manifest, then re-checks both rules for it
    ///
    /// # Errors
    ///
    /// [`LadingError::OrderNotFound`] when the order line is in neither
    /// store; persistence failures after rollback and compensation.
    pub async fn remove_order_from_manifest(
        &self,
        order_line_id: &str,
        manifest_source_id: &str,
    ) -> Result<ReassignmentResult> {
        let mut required = Required::default();
        let order_line = required.field::<OrderLineId>("orderLineId", order_line_id);
        let manifest = required.field::<ManifestSourceId>("manifestSourceId", manifest_source_id);
        let (order_line_id, manifest_source_id) = required.finish(order_line.zip(manifest))?;

        tracing::info!(
            order_line_id = %order_line_id,
            manifest_source_id = %manifest_source_id,
            "Reassigning order"
        );

        let snapshot = self
            .catalog
            .order_document(&order_line_id)
            .await?
            .ok_or_else(|| LadingError::OrderNotFound(order_line_id.to_string()))?;

        let steps = workflows::reassignment_steps(
            &order_line_id,
            &manifest_source_id,
            &snapshot,
            &self.settings.indices.orders,
        );
        self.coordinator.run("reassign-order", steps).await?;

        // one rule at a time: each check may rewrite the manifest in both stores
        let freight = self
            .check(&ManifestAttribute::FREIGHT_TYPE, &manifest_source_id)
            .await;
        let load = self
            .check(&ManifestAttribute::LOAD_TYPE, &manifest_source_id)
            .await;
        let rules = vec![
            refresh(RuleId::FreightType, &manifest_source_id, freight),
            refresh(RuleId::LoadType, &manifest_source_id, load),
        ];

        Ok(ReassignmentResult {
            status: ResponseStatus::Success,
            message: REMOVE_ORDER_MESSAGE.to_string(),
            order_line_id: order_line_id.into_inner(),
            manifest_source_id: manifest_source_id.into_inner(),
            rules,
        })
    }

    /// Writes edited order details to the index, then to the relational store
    pub async fn update_order_details(
        &self,
        order_id: &str,
        details: &OrderDetailsUpdate,
    ) -> Result<OperationResult> {
        let mut required = Required::default();
        let order = required.field::<OrderId>("orderId", order_id);
        let order_line = required.field::<OrderLineId>(
            "orderLineId",
            details.order_line_id.as_deref().unwrap_or_default(),
        );
        let (order_id, order_line_id) = required.finish(order.zip(order_line))?;

        tracing::info!(
            order_id = %order_id,
            order_line_id = %order_line_id,
            "Updating order details"
        );

        let snapshot = self
            .catalog
            .order_document(&order_line_id)
            .await?
            .ok_or_else(|| LadingError::OrderNotFound(order_line_id.to_string()))?;

        let steps = workflows::order_details_steps(
            &order_id,
            &order_line_id,
            details,
            &snapshot,
            &UpdateStamp::now(self.settings.update_user_id),
            &self.settings.indices.orders,
        );
        self.coordinator.run("update-order-details", steps).await?;

        Ok(OperationResult {
            status: ResponseStatus::Success,
            message: ORDER_DETAILS_MESSAGE.to_string(),
        })
    }

    /// Writes new sequence numbers for orders of one manifest
    pub async fn update_order_sequence(
        &self,
        update: &OrderSequenceUpdate,
    ) -> Result<OperationResult> {
        let mut required = Required::default();
        let manifest =
            required.field::<ManifestSourceId>("manifestSourceId", &update.manifest_source_id);
        required.check("orders", !update.orders.is_empty());
        let entries: Vec<Option<(OrderLineId, i64)>> = update
            .orders
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                required
                    .field::<OrderLineId>(format!("orders[{i}].orderLineId"), &entry.order_line_id)
                    .map(|id| (id, entry.sequence))
            })
            .collect();
        let entries: Option<Vec<(OrderLineId, i64)>> = entries.into_iter().collect();
        let (manifest_source_id, entries) = required.finish(manifest.zip(entries))?;

        tracing::info!(
            manifest_source_id = %manifest_source_id,
            orders = entries.len(),
            "Updating order sequence"
        );

        let ids: Vec<OrderLineId> = entries.iter().map(|(id, _)| id.clone()).collect();
        let mut snapshots = self.catalog.order_documents(&ids).await?;
        let orders = entries
            .into_iter()
            .map(|(id, sequence)| match snapshots.remove(&id) {
                Some(snapshot) => Ok((id, sequence, snapshot)),
                None => Err(LadingError::OrderNotFound(id.into_inner())),
            })
            .collect::<Result<Vec<_>>>()?;

        let steps = workflows::order_sequence_steps(
            &manifest_source_id,
            &orders,
            &UpdateStamp::now(self.settings.update_user_id),
            &self.settings.indices.orders,
        );
        self.coordinator.run("update-order-sequence", steps).await?;

        Ok(OperationResult {
            status: ResponseStatus::Success,
            message: ORDER_SEQUENCE_MESSAGE.to_string(),
        })
    }

    /// Total weight of the orders on a manifest
    ///
    /// Weights indexed as decimal text are parsed before summing.
    pub async fn commodity_weight(
        &self,
        manifest_source_id: &str,
    ) -> Result<CommodityWeightResult> {
        let mut required = Required::default();
        let id = required.field::<ManifestSourceId>("manifestSourceId", manifest_source_id);
        let id = required.finish(id)?;

        let total = self
            .catalog
            .sum_over_manifest(
                &id,
                Aggregation::SumParsed {
                    name: "commodityWeight".to_string(),
                    field: fields::WEIGHT.to_string(),
                },
            )
            .await?;

        Ok(CommodityWeightResult {
            status: ResponseStatus::Success,
            manifest_source_id: id.into_inner(),
            commodity_weight: total,
        })
    }

    /// Total pallet count of the orders on a manifest
    pub async fn pallet_count(&self, manifest_source_id: &str) -> Result<PalletCountResult> {
        let mut required = Required::default();
        let id = required.field::<ManifestSourceId>("manifestSourceId", manifest_source_id);
        let id = required.finish(id)?;

        let total = self
            .catalog
            .sum_over_manifest(
                &id,
                Aggregation::Sum {
                    name: "palletCount".to_string(),
                    field: fields::PALLET_COUNT.to_string(),
                },
            )
            .await?;

        Ok(PalletCountResult {
            status: ResponseStatus::Success,
            manifest_source_id: id.into_inner(),
            pallet_count: total,
        })
    }
}

fn refresh(
    rule: RuleId,
    manifest_source_id: &ManifestSourceId,
    outcome: Result<RuleCheckResult>,
) -> RuleRefresh {
    match outcome {
        Ok(result) => RuleRefresh {
            business_rule: rule.business_rule().to_string(),
            status: Some(result.status),
            error: None,
        },
        Err(e) => {
            tracing::warn!(
                rule_id = %rule,
                manifest_source_id = %manifest_source_id,
                error = %e,
                "Rule re-check after reassignment failed"
            );
            RuleRefresh {
                business_rule: rule.business_rule().to_string(),
                status: None,
                error: Some(e.public_message()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryRelationalStore, MemorySearchIndex};

    fn service() -> (MemoryRelationalStore, MemorySearchIndex, ManifestRuleService) {
        let relational = MemoryRelationalStore::new();
        let search = MemorySearchIndex::new();
        let stores = Stores::new(Arc::new(relational.clone()), Arc::new(search.clone()));
        (relational, search, ManifestRuleService::new(stores, ServiceSettings::default()))
    }

    #[tokio::test]
    async fn test_validation_lists_every_missing_field() {
        let (relational, search, service) = service();
        let err = service.remove_order_from_manifest("", "  ").await.unwrap_err();
        match err {
            LadingError::Validation { fields } => {
                assert_eq!(fields, vec!["orderLineId", "manifestSourceId"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(relational.commit_count() + relational.rollback_count(), 0);
        assert!(search.updates().is_empty());
    }

    #[tokio::test]
    async fn test_sequence_validation_names_entries() {
        let (_, _, service) = service();
        let update: OrderSequenceUpdate = serde_json::from_value(serde_json::json!({
            "manifestSourceId": "M1",
            "orders": [{"orderLineId": "O1", "sequence": 1}, {"orderLineId": "", "sequence": 2}]
        }))
        .unwrap();
        let err = service.update_order_sequence(&update).await.unwrap_err();
        match err {
            LadingError::Validation { fields } => assert_eq!(fields, vec!["orders[1].orderLineId"]),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_sequence_is_rejected() {
        let (_, _, service) = service();
        let update = OrderSequenceUpdate {
            manifest_source_id: String::new(),
            orders: vec![],
        };
        let err = service.update_order_sequence(&update).await.unwrap_err();
        assert!(matches!(err, LadingError::Validation { ref fields } if fields.len() == 2));
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let (relational, _, service) = service();
        let err = service.remove_order_from_manifest("O404", "M1").await.unwrap_err();
        assert!(matches!(err, LadingError::OrderNotFound(ref id) if id == "O404"));
        assert_eq!(relational.commit_count(), 0);
    }

    #[test]
    fn test_settings_from_config_defaults() {
        let settings = ServiceSettings::default();
        assert_eq!(settings.indices.orders, "unplanned_orders");
        assert_eq!(settings.step_timeout, Duration::from_secs(30));
        assert!(settings.clear_resolved_violations);
    }

    #[test]
    fn test_rule_check_result_json() {
        let id = ManifestSourceId::new("M1").unwrap();
        let result = RuleCheckResult::new(
            RuleId::FreightType,
            &id,
            RuleVerdict::Canonicalized {
                value: "LTL".to_string(),
            },
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "matched");
        assert_eq!(json["ruleId"], "7");
        assert_eq!(json["canonicalValue"], "LTL");
        assert!(json.get("message").is_none());
        assert!(json.get("verdict").is_none());
    }
}
