//! Core business logic for Lading.
//!
//! # Modules
//!
//! - [`catalog`] - Reads of orders and manifests from the search index
//! - [`rules`] - Freight type (BR_PLN_7) and load type (BR_PLN_6) evaluation
//! - [`ledger`] - Manifest error log with one live record per manifest and rule
//! - [`coordinator`] - Coordinated writes across both stores with compensation
//! - [`workflows`] - Write plans for reassignment, order details and sequencing
//! - [`service`] - Caller-facing operations
//!
//! # Rule Check Workflow
//!
//! 1. **Fetch**: Orders on the manifest and the manifest itself, from the index
//! 2. **Assess**: Compare every order with the manifest attribute
//! 3. **Canonicalize**: Lock an unset attribute to the lowest order line's value
//! 4. **Ledger**: Record a violation, or clear a resolved one
//!
//! # Example
//!
//! ```rust,no_run
//! use lading::adapters::factory::create_stores;
//! use lading::config::load_config;
//! use lading::core::service::ManifestRuleService;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("lading.toml")?;
//! let stores = create_stores(&config, false).await?;
//! let service = ManifestRuleService::from_config(stores, &config);
//!
//! let result = service.check_freight_type("M108265").await?;
//! println!("{}", result.status);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod coordinator;
pub mod ledger;
pub mod rules;
pub mod service;
pub mod workflows;
