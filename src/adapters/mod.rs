//! External system integrations for Lading.
//!
//! - [`relational`] - Relational store traits (transactions, table writes, stored functions)
//! - [`search`] - Search index trait and query types
//! - [`postgresql`] - PostgreSQL implementation of the relational store
//! - [`elasticsearch`] - Elasticsearch implementation of the search index
//! - [`memory`] - In-memory implementations of both, with failure injection
//! - [`factory`] - Builds the stores from configuration
//!
//! # Design Pattern
//!
//! Adapters isolate the drivers behind two traits so the core only ever sees
//! [`relational::RelationalStore`] and [`search::SearchIndex`]:
//!
//! ```rust
//! use lading::adapters::factory::Stores;
//! use lading::adapters::memory::{MemoryRelationalStore, MemorySearchIndex};
//! use std::sync::Arc;
//!
//! let stores = Stores::new(
//!     Arc::new(MemoryRelationalStore::new()),
//!     Arc::new(MemorySearchIndex::new()),
//! );
//! assert_eq!(stores.search.describe(), "memory search index");
//! ```

pub mod elasticsearch;
pub mod factory;
pub mod memory;
pub mod postgresql;
pub mod relational;
pub mod search;
