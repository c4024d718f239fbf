// Lading - Manifest planning rules engine
// Copyright (c) 2025 Lading Contributors
// Licensed under the MIT License

//! # Lading - Manifest planning rules engine
//!
//! Lading keeps freight manifests and the order lines attached to them
//! consistent across a relational store (PostgreSQL) and a denormalized
//! search index (Elasticsearch).
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Checking** that every order on a manifest shares its freight type
//!   (BR_PLN_7) and load type (BR_PLN_6)
//! - **Canonicalizing** an unset manifest attribute from its orders
//! - **Recording** violations in a manifest error log with one live record
//!   per manifest and rule
//! - **Coordinating** writes across both stores, compensating index writes
//!   when the relational side fails
//!
//! ## Architecture
//!
//! Lading follows a layered architecture:
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (rules, ledger, coordinator, workflows)
//! - [`adapters`] - External integrations (PostgreSQL, Elasticsearch, in-memory)
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lading::adapters::factory::create_stores;
//! use lading::config::load_config;
//! use lading::core::service::ManifestRuleService;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("lading.toml")?;
//!     let stores = create_stores(&config, false).await?;
//!     let service = ManifestRuleService::from_config(stores, &config);
//!
//!     let result = service.check_freight_type("M108265").await?;
//!     println!("BR_PLN_7: {}", result.status);
//!     Ok(())
//! }
//! ```
//!
//! ## Coordinated Writes
//!
//! The search index has no transactions. Each multi-store write runs as a
//! saga inside one relational transaction: index steps carry an inverse
//! patch built from a snapshot taken before the write, and a failure rolls
//! the transaction back after compensating the index in reverse order.
//!
//! ```rust
//! use lading::adapters::memory::{MemoryRelationalStore, MemorySearchIndex};
//! use lading::adapters::search::{FieldPatch, Query};
//! use lading::core::coordinator::{ConsistencyCoordinator, Step};
//! use serde_json::json;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let index = MemorySearchIndex::new();
//! index.insert("unplanned_orders", json!({"order_LN_ID": "O1", "order_STTS": "Unplanned"}));
//!
//! let coordinator = ConsistencyCoordinator::new(
//!     Arc::new(MemoryRelationalStore::new()),
//!     Arc::new(index.clone()),
//!     Duration::from_secs(30),
//! );
//!
//! let patch = FieldPatch::new().set("order_STTS", "Planned");
//! let inverse = patch.inverse_from(&json!({"order_STTS": "Unplanned"}));
//! let step = Step::index_update(
//!     "index:order",
//!     "unplanned_orders",
//!     Query::terms("order_LN_ID", ["O1"]),
//!     patch,
//! )
//! .compensated_by(inverse);
//!
//! coordinator.run("example", vec![step]).await.unwrap();
//! assert_eq!(index.documents("unplanned_orders")[0]["order_STTS"], "Planned");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Lading uses the [`domain::LadingError`] type for all errors. Client errors
//! (validation, unknown manifest or order) carry their message; persistence
//! and compensation failures only expose a generic message to callers:
//!
//! ```rust
//! use lading::domain::LadingError;
//!
//! let error = LadingError::missing_fields(["orderLineId", "manifestSourceId"]);
//! assert!(error.is_client_error());
//! ```
//!
//! ## Logging
//!
//! Lading uses structured logging with the `tracing` crate:
//!
//! ```rust,no_run
//! use tracing::{info, warn};
//!
//! info!(manifest_source_id = "M108265", "Checking freight type");
//! warn!(rule_id = "BR_PLN_7", "Business rule violated");
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
