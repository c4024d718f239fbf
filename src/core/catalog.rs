//! Reads from the search index
//!
//! Orders and manifests are always read from the indexed copy. Raw
//! documents are kept alongside the parsed records because coordinated
//! writes need them as compensation snapshots.

use crate::adapters::search::{Aggregation, Query, SearchIndex, SearchRequest};
use crate::domain::ids::{ManifestSourceId, OrderLineId};
use crate::domain::{manifest, order, LadingError, Manifest, Order, PersistenceError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Names of the two indices the service reads and writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexNames {
    pub orders: String,
    pub manifests: String,
}

impl Default for IndexNames {
    fn default() -> Self {
        Self {
            orders: "unplanned_orders".to_string(),
            manifests: "manifest".to_string(),
        }
    }
}

/// Indexed manifest with the document it was parsed from
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestSnapshot {
    pub manifest: Manifest,
    pub document: Value,
}

#[derive(Clone)]
pub struct Catalog {
    search: Arc<dyn SearchIndex>,
    indices: IndexNames,
}

impl Catalog {
    pub fn new(search: Arc<dyn SearchIndex>, indices: IndexNames) -> Self {
        Self { search, indices }
    }

    pub fn indices(&self) -> &IndexNames {
        &self.indices
    }

    /// Orders currently attached to a manifest, in index order
    pub async fn orders_on_manifest(
        &self,
        manifest_source_id: &ManifestSourceId,
    ) -> Result<Vec<Order>> {
        let request = SearchRequest::new(Query::matching(
            order::fields::MANIFEST_SOURCE_ID,
            manifest_source_id.as_str(),
        ));
        let response = self.search.search(&self.indices.orders, &request).await?;

        response
            .hits
            .iter()
            .map(|hit| {
                Order::from_document(hit).map_err(|e| {
                    LadingError::from(PersistenceError::InvalidResponse(format!(
                        "Malformed order document: {e}"
                    )))
                })
            })
            .collect()
    }

    /// The indexed manifest, `None` when it does not exist
    pub async fn manifest(
        &self,
        manifest_source_id: &ManifestSourceId,
    ) -> Result<Option<ManifestSnapshot>> {
        let request = SearchRequest::new(Query::matching(
            manifest::fields::SOURCE_ID,
            manifest_source_id.as_str(),
        ))
        .size(1);
        let response = self.search.search(&self.indices.manifests, &request).await?;

        let Some(document) = response.hits.into_iter().next() else {
            return Ok(None);
        };
        let manifest = Manifest::from_document(&document).map_err(|e| {
            PersistenceError::InvalidResponse(format!("Malformed manifest document: {e}"))
        })?;
        Ok(Some(ManifestSnapshot { manifest, document }))
    }

    /// Indexed documents of the given order lines, keyed by order line id
    ///
    /// Ids without a document are absent from the map.
    pub async fn order_documents(
        &self,
        order_line_ids: &[OrderLineId],
    ) -> Result<HashMap<OrderLineId, Value>> {
        if order_line_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let request = SearchRequest::new(Query::terms(
            order::fields::ORDER_LINE_ID,
            order_line_ids.iter().map(OrderLineId::as_str),
        ));
        let response = self.search.search(&self.indices.orders, &request).await?;

        let mut documents = HashMap::new();
        for hit in response.hits {
            let order = Order::from_document(&hit).map_err(|e| {
                PersistenceError::InvalidResponse(format!("Malformed order document: {e}"))
            })?;
            if let Ok(id) = OrderLineId::new(order.order_line_id) {
                documents.entry(id).or_insert(hit);
            }
        }
        Ok(documents)
    }

    /// Indexed document of one order line
    pub async fn order_document(&self, order_line_id: &OrderLineId) -> Result<Option<Value>> {
        let mut documents = self.order_documents(std::slice::from_ref(order_line_id)).await?;
        Ok(documents.remove(order_line_id))
    }

    /// Sum of one order field over the orders attached to a manifest
    pub async fn sum_over_manifest(
        &self,
        manifest_source_id: &ManifestSourceId,
        aggregation: Aggregation,
    ) -> Result<f64> {
        let name = aggregation.name().to_string();
        let request = SearchRequest::new(Query::matching(
            order::fields::MANIFEST_SOURCE_ID,
            manifest_source_id.as_str(),
        ))
        .aggregate(aggregation)
        .size(0);
        let response = self.search.search(&self.indices.orders, &request).await?;
        Ok(response.sum(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemorySearchIndex;
    use serde_json::json;

    fn catalog() -> Catalog {
        let search = MemorySearchIndex::new();
        search.insert(
            "unplanned_orders",
            json!({"order_LN_ID": "O1", "mnfst_SRC_ID": "M1", "weight": "10.5"}),
        );
        search.insert(
            "unplanned_orders",
            json!({"order_LN_ID": "O2", "mnfst_SRC_ID": "M1", "weight": "4"}),
        );
        search.insert("unplanned_orders", json!({"order_LN_ID": 3, "mnfst_SRC_ID": "M2"}));
        search.insert("manifest", json!({"id": 1, "sourceId": "M1", "freightType": "FTL"}));
        Catalog::new(Arc::new(search), IndexNames::default())
    }

    fn manifest_id(id: &str) -> ManifestSourceId {
        ManifestSourceId::new(id).unwrap()
    }

    #[tokio::test]
    async fn test_orders_on_manifest() {
        let orders = catalog().orders_on_manifest(&manifest_id("M1")).await.unwrap();
        let ids: Vec<_> = orders.iter().map(|o| o.order_line_id.as_str()).collect();
        assert_eq!(ids, vec!["O1", "O2"]);
    }

    #[tokio::test]
    async fn test_manifest_lookup() {
        let catalog = catalog();
        let snapshot = catalog.manifest(&manifest_id("M1")).await.unwrap().unwrap();
        assert_eq!(snapshot.manifest.freight_type.as_deref(), Some("FTL"));
        assert_eq!(snapshot.document["id"], json!(1));
        assert!(catalog.manifest(&manifest_id("M9")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_order_documents_by_id() {
        let ids: Vec<OrderLineId> = ["O2", "3", "O9"]
            .into_iter()
            .map(|id| OrderLineId::new(id).unwrap())
            .collect();
        let documents = catalog().order_documents(&ids).await.unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[&ids[1]]["mnfst_SRC_ID"], json!("M2"));
        assert!(!documents.contains_key(&ids[2]));
    }

    #[tokio::test]
    async fn test_sum_over_manifest() {
        let total = catalog()
            .sum_over_manifest(
                &manifest_id("M1"),
                Aggregation::SumParsed {
                    name: "commodityWeight".to_string(),
                    field: "weight".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(total, 14.5);
    }
}
