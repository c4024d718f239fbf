//! Elasticsearch integration
//!
//! The search index holding the denormalized order line and manifest
//! documents, accessed over its REST API.

pub mod client;

pub use client::ElasticsearchClient;
