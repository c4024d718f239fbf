//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Lading configuration file.

use super::{EXIT_CONFIG, EXIT_OK};
use crate::config::load_config;
use crate::config::secret::redact_credentials;
use clap::Args;
use secrecy::ExposeSecret;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates after parsing
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                println!();
                return Ok(EXIT_CONFIG);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Environment: {:?}", config.environment);
        println!("  Log Level: {}", config.application.log_level);
        println!(
            "  PostgreSQL: {}",
            redact_credentials(config.postgresql.connection_string.expose_secret().as_str())
        );
        println!("  Max Connections: {}", config.postgresql.max_connections);
        println!("  SSL Mode: {}", config.postgresql.ssl_mode);
        println!("  Elasticsearch: {}", config.elasticsearch.base_url);
        println!("  Orders Index: {}", config.elasticsearch.orders_index);
        println!("  Manifests Index: {}", config.elasticsearch.manifests_index);
        println!(
            "  Step Timeout: {}s",
            config.coordinator.step_timeout_seconds
        );
        println!(
            "  Clear Resolved Violations: {}",
            config.rules.clear_resolved_violations
        );
        println!();
        Ok(EXIT_OK)
    }
}
