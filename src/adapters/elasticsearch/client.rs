//! Elasticsearch REST client
//!
//! Talks to the `_search` and `_update_by_query` endpoints with `reqwest`.
//! Transient failures (connection errors, 429 and 5xx answers) are retried
//! with exponential backoff.

use crate::adapters::search::{
    Aggregation, FieldPatch, Query, SearchIndex, SearchRequest, SearchResponse,
};
use crate::config::ElasticsearchConfig;
use crate::domain::{LadingError, PersistenceError, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, RequestBuilder};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Painless script writing every entry of `params.fields` into the document
const PATCH_SCRIPT: &str =
    "for (entry in params.fields.entrySet()) { ctx._source[entry.getKey()] = entry.getValue(); }";

/// Painless script summing a text field holding decimals
const PARSED_SUM_SCRIPT: &str =
    "doc[params.field].size() == 0 ? 0 : Double.parseDouble(doc[params.field].value)";

/// Elasticsearch implementation of [`SearchIndex`]
pub struct ElasticsearchClient {
    /// Base URL, always ending with `/`
    base_url: Url,

    /// HTTP client for making requests
    client: Client,

    config: ElasticsearchConfig,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    hits: HitsBody,
    #[serde(default)]
    aggregations: HashMap<String, AggregationBody>,
}

#[derive(Debug, Deserialize)]
struct HitsBody {
    #[serde(default)]
    hits: Vec<HitBody>,
}

#[derive(Debug, Deserialize)]
struct HitBody {
    #[serde(rename = "_source", default)]
    source: Value,
}

#[derive(Debug, Deserialize)]
struct AggregationBody {
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct UpdateByQueryBody {
    #[serde(default)]
    updated: u64,
    #[serde(default)]
    version_conflicts: u64,
    #[serde(default)]
    failures: Vec<Value>,
}

impl ElasticsearchClient {
    /// Create a new client
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn new(config: ElasticsearchConfig) -> Result<Self> {
        let mut base = config.base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base).map_err(|e| {
            LadingError::Configuration(format!(
                "Invalid elasticsearch.base_url '{}': {e}",
                config.base_url
            ))
        })?;

        let mut client_builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(30));

        if !config.tls_verify {
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        let client = client_builder.build().map_err(|e| {
            LadingError::Configuration(format!("Failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            base_url,
            client,
            config,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|e| {
            LadingError::Configuration(format!("Invalid index path '{path}': {e}"))
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match (&self.config.username, &self.config.password) {
            (Some(username), Some(password)) => {
                request.basic_auth(username, Some(password.expose_secret().as_str()))
            }
            _ => request,
        }
    }

    /// Sends a JSON request and decodes a successful JSON answer
    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &Url,
        body: &Value,
    ) -> Result<T> {
        let request = self.authorized(self.client.post(url.clone()).json(body));

        let response = request.send().await.map_err(|e| {
            PersistenceError::Connection(format!("Request to {url} failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PersistenceError::SearchIndex {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        response
            .json::<T>()
            .await
            .map_err(|e| PersistenceError::InvalidResponse(e.to_string()).into())
    }

    /// Retry a request with exponential backoff
    async fn retry_request<F, T, Fut>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let retry = &self.config.retry;
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    attempt += 1;
                    if attempt >= retry.max_retries || !is_transient(&e) {
                        return Err(e);
                    }

                    let delay_ms = (retry.initial_delay_ms as f64
                        * retry.backoff_multiplier.powi(attempt as i32 - 1))
                        as u64;
                    let delay_ms = delay_ms.min(retry.max_delay_ms);

                    tracing::warn!(
                        attempt = attempt,
                        max_retries = retry.max_retries,
                        delay_ms = delay_ms,
                        error = %e,
                        "Retrying search index request after error"
                    );

                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }
    }
}

fn is_transient(error: &LadingError) -> bool {
    match error {
        LadingError::Persistence(PersistenceError::Connection(_)) => true,
        LadingError::Persistence(PersistenceError::SearchIndex { status, .. }) => {
            *status == 429 || *status >= 500
        }
        _ => false,
    }
}

/// `_search` request body
fn search_body(request: &SearchRequest, max_hits: usize) -> Value {
    let mut body = json!({
        "query": request.query.to_json(),
        "size": request.size.unwrap_or(max_hits).min(max_hits),
    });

    if !request.aggregations.is_empty() {
        let aggs: Map<String, Value> = request
            .aggregations
            .iter()
            .map(|aggregation| {
                let definition = match aggregation {
                    Aggregation::Sum { field, .. } => json!({ "sum": { "field": field } }),
                    Aggregation::SumParsed { field, .. } => json!({
                        "sum": {
                            "script": {
                                "lang": "painless",
                                "source": PARSED_SUM_SCRIPT,
                                "params": { "field": format!("{field}.keyword") }
                            }
                        }
                    }),
                };
                (aggregation.name().to_string(), definition)
            })
            .collect();
        body["aggs"] = Value::Object(aggs);
    }

    body
}

/// `_update_by_query` request body
fn update_body(query: &Query, patch: &FieldPatch) -> Value {
    json!({
        "query": query.to_json(),
        "script": {
            "lang": "painless",
            "source": PATCH_SCRIPT,
            "params": { "fields": patch.fields() }
        }
    })
}

#[async_trait]
impl SearchIndex for ElasticsearchClient {
    async fn test_connection(&self) -> Result<()> {
        let request = self.authorized(self.client.get(self.base_url.clone()));
        let response = request
            .send()
            .await
            .map_err(|e| PersistenceError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PersistenceError::SearchIndex {
                status: response.status().as_u16(),
                message: "cluster check failed".to_string(),
            }
            .into());
        }

        tracing::info!(cluster = %self.base_url, "Elasticsearch connection test successful");
        Ok(())
    }

    async fn search(&self, index: &str, request: &SearchRequest) -> Result<SearchResponse> {
        let url = self.endpoint(&format!("{index}/_search"))?;
        let body = search_body(request, self.config.max_hits);
        tracing::debug!(index = %index, query = %body["query"], "Searching index");

        let response: SearchBody = self.retry_request(|| self.send_json(&url, &body)).await?;

        Ok(SearchResponse {
            hits: response.hits.hits.into_iter().map(|hit| hit.source).collect(),
            aggregations: response
                .aggregations
                .into_iter()
                .map(|(name, agg)| (name, agg.value.unwrap_or(0.0)))
                .collect(),
        })
    }

    async fn update_by_query(&self, index: &str, query: &Query, patch: &FieldPatch) -> Result<u64> {
        let mut url = self.endpoint(&format!("{index}/_update_by_query"))?;
        url.query_pairs_mut()
            .append_pair("refresh", "true")
            .append_pair("conflicts", "proceed");
        let body = update_body(query, patch);
        tracing::debug!(index = %index, query = %body["query"], "Updating documents by query");

        let response: UpdateByQueryBody =
            self.retry_request(|| self.send_json(&url, &body)).await?;

        // conflicts=proceed keeps going past conflicts, so a conflict means
        // the query was only partly written
        let detail = if !response.failures.is_empty() {
            format!(
                "{} failure(s): {}",
                response.failures.len(),
                Value::Array(response.failures)
            )
        } else if response.version_conflicts > 0 {
            format!("{} version conflict(s)", response.version_conflicts)
        } else {
            return Ok(response.updated);
        };

        Err(PersistenceError::PartialUpdate {
            index: index.to_string(),
            updated: response.updated,
            detail,
        }
        .into())
    }

    fn describe(&self) -> String {
        self.base_url.to_string()
    }
}
