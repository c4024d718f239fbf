//! Domain error types
//!
//! This module defines the error hierarchy for Lading. Store failures are
//! wrapped in [`PersistenceError`] so that callers never see driver or HTTP
//! client types.

use thiserror::Error;

/// Message returned to callers for server-side failures.
pub const GENERIC_SERVER_MESSAGE: &str = "Internal error";

/// Main Lading error type
///
/// Validation and not-found errors are recoverable and reported to the caller
/// with their message. Persistence and compensation failures are server-side
/// and only expose [`GENERIC_SERVER_MESSAGE`] through [`LadingError::public_message`].
#[derive(Debug, Error)]
pub enum LadingError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// One or more required identifiers were missing or empty
    #[error("Validation error: {} is required", .fields.join(", "))]
    Validation { fields: Vec<String> },

    /// No manifest record, or no order attached to it
    #[error("Manifest not found: {0}")]
    ManifestNotFound(String),

    /// No order record matched the given identifier
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// A relational or search index operation failed
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// The inverse write of a partially applied coordinated write failed.
    ///
    /// The stores are left inconsistent and need manual reconciliation.
    #[error("Compensation failed for step '{step}': {reason} (original failure: {original})")]
    CompensationFailed {
        step: String,
        reason: String,
        original: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

impl LadingError {
    /// Builds a validation error from the list of missing field names
    pub fn missing_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LadingError::Validation {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the failure was caused by the request rather than the system.
    ///
    /// The HTTP layer maps these to a 4xx response.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            LadingError::Validation { .. }
                | LadingError::ManifestNotFound(_)
                | LadingError::OrderNotFound(_)
        )
    }

    /// Whether the stores were left in a known-inconsistent state
    pub fn is_fatal(&self) -> bool {
        matches!(self, LadingError::CompensationFailed { .. })
    }

    /// Whether the failed write may still have been applied by the store,
    /// fully or in part
    ///
    /// A timed-out or dropped request can complete on the server after the
    /// caller gave up on it.
    pub fn may_have_applied(&self) -> bool {
        matches!(
            self,
            LadingError::Persistence(
                PersistenceError::Timeout { .. }
                    | PersistenceError::Connection(_)
                    | PersistenceError::PartialUpdate { .. }
            )
        )
    }

    /// Message safe to hand back to an external caller
    pub fn public_message(&self) -> String {
        if self.is_client_error() {
            self.to_string()
        } else {
            GENERIC_SERVER_MESSAGE.to_string()
        }
    }
}

/// Store-level errors
///
/// Errors raised by the relational store or the search index. These errors
/// don't expose third-party driver types.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Failed to obtain a connection
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Failed to begin, commit or roll back a transaction
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// A read query failed
    #[error("Query failed: {0}")]
    Query(String),

    /// A write failed
    #[error("Update failed: {0}")]
    Update(String),

    /// The search index answered with a non-success status
    #[error("Search index error: {status} - {message}")]
    SearchIndex { status: u16, message: String },

    /// An update by query stopped part way; some matching documents carry
    /// the write and some do not
    #[error("Update by query on '{index}' stopped after {updated} document(s): {detail}")]
    PartialUpdate {
        index: String,
        updated: u64,
        detail: String,
    },

    /// A coordinated step exceeded its time budget
    #[error("Step '{step}' timed out after {millis}ms")]
    Timeout { step: String, millis: u64 },

    /// The store answered with something we could not interpret
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

// Conversion from std::io::Error
impl From<std::io::Error> for LadingError {
    fn from(err: std::io::Error) -> Self {
        LadingError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for LadingError {
    fn from(err: serde_json::Error) -> Self {
        LadingError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for LadingError {
    fn from(err: toml::de::Error) -> Self {
        LadingError::Configuration(format!("TOML parse error: {err}"))
    }
}
