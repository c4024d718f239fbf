//! Domain models and types for Lading.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`ManifestSourceId`], [`OrderLineId`], [`OrderId`])
//! - **Records** shared by both stores ([`Order`], [`Manifest`], [`ManifestErrorLog`])
//! - **Rule outcomes** ([`RuleId`], [`RuleVerdict`], [`Violation`], [`ResponseStatus`])
//! - **Error types** ([`LadingError`], [`PersistenceError`])
//! - **Result type alias** ([`Result`])
//!
//! # Type Safety
//!
//! Identifiers use the newtype pattern so a manifest key can never be passed
//! where an order line key is expected:
//!
//! ```rust
//! use lading::domain::{ManifestSourceId, OrderLineId};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manifest = ManifestSourceId::new("M108265")?;
//! let order_line = OrderLineId::new("OL-1")?;
//!
//! // This won't compile
//! // let wrong: ManifestSourceId = order_line;
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod ids;
pub mod manifest;
pub mod order;
pub mod result;
pub mod rule;

// Re-export commonly used types for convenience
pub use errors::{LadingError, PersistenceError};
pub use ids::{ManifestSourceId, OrderId, OrderLineId};
pub use manifest::{Manifest, ManifestErrorLog};
pub use order::{Order, OrderDetailsUpdate, OrderSequenceEntry, OrderSequenceUpdate, OrderStatus};
pub use result::Result;
pub use rule::{Mismatch, ResponseStatus, RuleId, RuleVerdict, Severity, Violation};
