//! Configuration management for Lading.
//!
//! # Overview
//!
//! Lading uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `LADING_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use lading::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("lading.toml")?;
//!
//! println!("Orders index: {}", config.elasticsearch.orders_index);
//! println!("Step timeout: {}s", config.coordinator.step_timeout_seconds);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level and the user id stamped on updates
//! - [`PostgreSQLConfig`] - Relational store connection pool
//! - [`ElasticsearchConfig`] - Search index connection, index names and retries
//! - [`CoordinatorConfig`] - Per-step time budget of coordinated writes
//! - [`RulesConfig`] - Business rule behaviour
//! - [`LoggingConfig`] - Local file logging
//!
//! # Example Configuration
//!
//! ```toml
//! environment = "production"
//!
//! [application]
//! log_level = "info"
//!
//! [postgresql]
//! connection_string = "${LADING_DATABASE_URL}"
//!
//! [elasticsearch]
//! base_url = "https://search.example.com:9200"
//! username = "lading"
//! password = "${LADING_ES_PASSWORD}"
//!
//! [coordinator]
//! step_timeout_seconds = 30
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::load_config;
pub use schema::{
    ApplicationConfig, CoordinatorConfig, ElasticsearchConfig, Environment, LadingConfig,
    LoggingConfig, PostgreSQLConfig, RetryConfig, RulesConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
