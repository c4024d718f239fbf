//! Status command implementation
//!
//! This module implements the `status` command for checking that the
//! relational store and the search index are reachable.

use super::{EXIT_CONFIG, EXIT_CONNECTION, EXIT_OK};
use crate::adapters::factory::create_stores;
use crate::config::load_config;
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Apply the relational schema migration before checking
    #[arg(long)]
    pub ensure_schema: bool,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking store connectivity");

        println!("📊 Store Status");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let stores = match create_stores(&config, self.ensure_schema).await {
            Ok(s) => s,
            Err(e) => {
                println!("❌ Failed to create store clients");
                println!("   Error: {e}");
                return Ok(EXIT_CONNECTION);
            }
        };

        let mut healthy = true;

        match stores.relational.test_connection().await {
            Ok(()) => println!("✅ PostgreSQL: {}", stores.relational.describe()),
            Err(e) => {
                healthy = false;
                println!("❌ PostgreSQL: {}", stores.relational.describe());
                println!("   Error: {e}");
            }
        }

        match stores.search.test_connection().await {
            Ok(()) => println!("✅ Elasticsearch: {}", stores.search.describe()),
            Err(e) => {
                healthy = false;
                println!("❌ Elasticsearch: {}", stores.search.describe());
                println!("   Error: {e}");
            }
        }

        println!();
        println!("  Orders index: {}", config.elasticsearch.orders_index);
        println!("  Manifests index: {}", config.elasticsearch.manifests_index);
        println!(
            "  Step timeout: {}s",
            config.coordinator.step_timeout_seconds
        );

        Ok(if healthy { EXIT_OK } else { EXIT_CONNECTION })
    }
}
