//! Aggregate read commands
//!
//! Implements `commodity-weight` and `pallet-count`.

use super::{connect, report};
use clap::Args;

/// Arguments for the aggregate commands
#[derive(Args, Debug)]
pub struct ManifestArgs {
    /// Manifest source id (e.g. M108265)
    pub manifest_source_id: String,
}

impl ManifestArgs {
    /// Execute the commodity-weight command
    pub async fn execute_commodity_weight(&self, config_path: &str) -> anyhow::Result<i32> {
        let service = match connect(config_path).await {
            Ok(s) => s,
            Err(code) => return Ok(code),
        };
        report(service.commodity_weight(&self.manifest_source_id).await)
    }

    /// Execute the pallet-count command
    pub async fn execute_pallet_count(&self, config_path: &str) -> anyhow::Result<i32> {
        let service = match connect(config_path).await {
            Ok(s) => s,
            Err(code) => return Ok(code),
        };
        report(service.pallet_count(&self.manifest_source_id).await)
    }
}
