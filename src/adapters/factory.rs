//! Store factory
//!
//! Builds the relational store and the search index from configuration.

use crate::adapters::elasticsearch::ElasticsearchClient;
use crate::adapters::postgresql::{PostgreSQLClient, PostgreSQLStore};
use crate::adapters::relational::RelationalStore;
use crate::adapters::search::SearchIndex;
use crate::config::schema::LadingConfig;
use crate::domain::Result;
use std::sync::Arc;

/// The two stores kept consistent by the service
#[derive(Clone)]
pub struct Stores {
    pub relational: Arc<dyn RelationalStore>,
    pub search: Arc<dyn SearchIndex>,
}

impl Stores {
    pub fn new(relational: Arc<dyn RelationalStore>, search: Arc<dyn SearchIndex>) -> Self {
        Self { relational, search }
    }

    /// Checks that both stores are reachable
    pub async fn test_connections(&self) -> Result<()> {
        self.relational.test_connection().await?;
        self.search.test_connection().await?;
        Ok(())
    }
}

/// Create the PostgreSQL store
///
/// When `ensure_schema` is set, the migration is applied first.
///
/// # Errors
///
/// Returns an error if the pool cannot be built or the migration fails.
pub async fn create_relational_store(
    config: &LadingConfig,
    ensure_schema: bool,
) -> Result<Arc<dyn RelationalStore>> {
    tracing::info!("Creating PostgreSQL store");
    let client = PostgreSQLClient::new(config.postgresql.clone())?;
    if ensure_schema {
        client.ensure_schema().await?;
    }
    Ok(Arc::new(PostgreSQLStore::new(client)) as Arc<dyn RelationalStore>)
}

/// Create the Elasticsearch index client
pub fn create_search_index(config: &LadingConfig) -> Result<Arc<dyn SearchIndex>> {
    tracing::info!(base_url = %config.elasticsearch.base_url, "Creating Elasticsearch client");
    let client = ElasticsearchClient::new(config.elasticsearch.clone())?;
    Ok(Arc::new(client) as Arc<dyn SearchIndex>)
}

/// Create both stores
pub async fn create_stores(config: &LadingConfig, ensure_schema: bool) -> Result<Stores> {
    let relational = create_relational_store(config, ensure_schema).await?;
    let search = create_search_index(config)?;
    Ok(Stores::new(relational, search))
}
