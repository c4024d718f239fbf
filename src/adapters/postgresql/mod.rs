//! PostgreSQL integration
//!
//! The relational store holding manifests, order lines and the manifest
//! error log. Schema and stored functions live in
//! `migrations/001_initial_schema.sql`.

pub mod adapter;
pub mod client;

pub use adapter::PostgreSQLStore;
pub use client::PostgreSQLClient;
