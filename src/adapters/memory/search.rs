use super::{lock, never_reply, FailureMode, FailurePlan, Operation, Reply};
use crate::adapters::search::{
    numeric_value, FieldPatch, Query, SearchIndex, SearchRequest, SearchResponse,
};
use crate::domain::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Inner {
    indices: Mutex<HashMap<String, Vec<Value>>>,
    failures: FailurePlan,
    updates: Mutex<Vec<(String, Query, FieldPatch)>>,
}

/// Search index kept in memory
///
/// Writes are applied immediately, like a refreshed index.
#[derive(Debug, Clone, Default)]
pub struct MemorySearchIndex {
    inner: Arc<Inner>,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a document to an index
    pub fn insert(&self, index: &str, document: Value) {
        lock(&self.inner.indices)
            .entry(index.to_string())
            .or_default()
            .push(document);
    }

    /// All documents of an index
    pub fn documents(&self, index: &str) -> Vec<Value> {
        lock(&self.inner.indices)
            .get(index)
            .cloned()
            .unwrap_or_default()
    }

    /// Documents of an index matching `query`
    pub fn find(&self, index: &str, query: &Query) -> Vec<Value> {
        self.documents(index)
            .into_iter()
            .filter(|doc| query.matches(doc))
            .collect()
    }

    /// Successful update-by-query calls, in call order
    pub fn updates(&self) -> Vec<(String, Query, FieldPatch)> {
        lock(&self.inner.updates).clone()
    }

    /// Makes `operation` fail after `successes_first` successful attempts
    pub fn inject_failure(&self, operation: Operation, successes_first: usize) {
        self.inner
            .failures
            .inject(operation, successes_first, FailureMode::Error);
    }

    /// Makes `operation` hang after `successes_first` successful attempts
    pub fn inject_hang(&self, operation: Operation, successes_first: usize) {
        self.inner
            .failures
            .inject(operation, successes_first, FailureMode::Hang);
    }

    /// Makes the next `operation` after `successes_first` successful
    /// attempts apply its write and then hang, as a request that reaches
    /// the cluster while its caller gives up
    pub fn inject_late_reply(&self, operation: Operation, successes_first: usize) {
        self.inner
            .failures
            .inject(operation, successes_first, FailureMode::Late);
    }

    pub fn clear_failures(&self) {
        self.inner.failures.clear();
    }
}

#[async_trait]
impl SearchIndex for MemorySearchIndex {
    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    async fn search(&self, index: &str, request: &SearchRequest) -> Result<SearchResponse> {
        self.inner
            .failures
            .check(&Operation::Search(index.to_string()))
            .await?;

        let matched = self.find(index, &request.query);

        let aggregations = request
            .aggregations
            .iter()
            .map(|aggregation| {
                let total: f64 = matched
                    .iter()
                    .filter_map(|doc| doc.get(aggregation.field()).and_then(numeric_value))
                    .sum();
                (aggregation.name().to_string(), total)
            })
            .collect();

        let hits = match request.size {
            Some(size) => matched.into_iter().take(size).collect(),
            None => matched,
        };

        Ok(SearchResponse { hits, aggregations })
    }

    async fn update_by_query(&self, index: &str, query: &Query, patch: &FieldPatch) -> Result<u64> {
        let operation = Operation::UpdateByQuery(index.to_string());
        let reply = self.inner.failures.check(&operation).await?;

        let mut updated = 0;
        if let Some(documents) = lock(&self.inner.indices).get_mut(index) {
            for doc in documents.iter_mut().filter(|doc| query.matches(doc)) {
                patch.apply_to(doc);
                updated += 1;
            }
        }

        lock(&self.inner.updates).push((index.to_string(), query.clone(), patch.clone()));
        match reply {
            Reply::Prompt => Ok(updated),
            Reply::Lost => never_reply(&operation).await,
        }
    }

    fn describe(&self) -> String {
        "memory search index".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::search::Aggregation;
    use serde_json::json;

    fn seeded() -> MemorySearchIndex {
        let index = MemorySearchIndex::new();
        index.insert(
            "orders",
            json!({
                "order_LN_ID": "O1", "mnfst_SRC_ID": "M1", "weight": "10.5", "order_LN_PLET_CNT": 2
            }),
        );
        index.insert(
            "orders",
            json!({
                "order_LN_ID": "O2", "mnfst_SRC_ID": "M1", "weight": "4.5", "order_LN_PLET_CNT": 3
            }),
        );
        index.insert(
            "orders",
            json!({"order_LN_ID": "O3", "mnfst_SRC_ID": "M2", "weight": "100"}),
        );
        index
    }

    #[tokio::test]
    async fn test_search_with_aggregations() {
        let index = seeded();
        let request = SearchRequest::new(Query::matching("mnfst_SRC_ID", "M1"))
            .aggregate(Aggregation::SumParsed {
                name: "weight".into(),
                field: "weight".into(),
            })
            .aggregate(Aggregation::Sum {
                name: "pallets".into(),
                field: "order_LN_PLET_CNT".into(),
            })
            .size(0);

        let response = index.search("orders", &request).await.unwrap();
        assert!(response.hits.is_empty());
        assert_eq!(response.sum("weight"), 15.0);
        assert_eq!(response.sum("pallets"), 5.0);
    }

    #[tokio::test]
    async fn test_update_by_query_counts_documents() {
        let index = seeded();
        let updated = index
            .update_by_query(
                "orders",
                &Query::terms("order_LN_ID", ["O1", "O3"]),
                &FieldPatch::new().set("order_STTS", "Planned"),
            )
            .await
            .unwrap();
        assert_eq!(updated, 2);
        assert_eq!(
            index
                .find("orders", &Query::matching("order_STTS", "Planned"))
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn test_update_unknown_index_touches_nothing() {
        let index = MemorySearchIndex::new();
        let updated = index
            .update_by_query(
                "missing",
                &Query::matching("a", "b"),
                &FieldPatch::new().set("a", "c"),
            )
            .await
            .unwrap();
        assert_eq!(updated, 0);
    }

    #[tokio::test]
    async fn test_late_reply_still_applies_write() {
        let index = seeded();
        index.inject_late_reply(Operation::UpdateByQuery("orders".into()), 0);

        let late = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            index.update_by_query(
                "orders",
                &Query::terms("order_LN_ID", ["O1"]),
                &FieldPatch::new().set("order_STTS", "Planned"),
            ),
        )
        .await;
        assert!(late.is_err());
        assert_eq!(
            index
                .find("orders", &Query::matching("order_STTS", "Planned"))
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_injected_search_failure() {
        let index = seeded();
        index.inject_failure(Operation::Search("orders".into()), 0);
        let result = index
            .search("orders", &SearchRequest::new(Query::matching("a", "b")))
            .await;
        assert!(result.is_err());
    }
}
