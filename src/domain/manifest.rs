//! Manifest records and the manifest error log

use crate::domain::ids::ManifestSourceId;
use crate::domain::rule::RuleId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Indexed field names of a manifest document
pub mod fields {
    pub const ID: &str = "id";
    pub const SOURCE_ID: &str = "sourceId";
    pub const FREIGHT_TYPE: &str = "freightType";
    pub const LOAD_TYPE: &str = "loadType";
}

/// Manifest as read from the search index
///
/// Freight type and load type are write-once: they stay unset until the
/// first order lands on the manifest and are then locked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Internal numeric id of the relational row
    #[serde(default)]
    pub id: Option<Value>,

    #[serde(rename = "sourceId")]
    pub source_id: String,

    #[serde(rename = "freightType", default)]
    pub freight_type: Option<String>,

    #[serde(rename = "loadType", default)]
    pub load_type: Option<String>,
}

impl Manifest {
    /// Parses a manifest from an indexed `_source` document
    pub fn from_document(document: &Value) -> crate::domain::Result<Self> {
        Ok(serde_json::from_value(document.clone())?)
    }
}

/// Most recent rule violation recorded for a manifest
///
/// At most one live record exists per `(manifest_source_id, rule_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestErrorLog {
    pub manifest_source_id: ManifestSourceId,
    pub rule_id: RuleId,
    pub message: String,
}
