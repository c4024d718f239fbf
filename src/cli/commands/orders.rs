//! Order workflow commands
//!
//! Implements `remove-order`, `update-order` and `update-order-sequence`.
//! Request bodies are JSON, given inline or read from a file.

use super::{connect, read_body, report, EXIT_CLIENT};
use crate::domain::{OrderDetailsUpdate, OrderSequenceUpdate};
use clap::Args;
use std::path::PathBuf;

/// Arguments for the remove-order command
#[derive(Args, Debug)]
pub struct RemoveOrderArgs {
    /// Order line to move
    #[arg(long)]
    pub order_line_id: String,

    /// Manifest the order line moves onto
    #[arg(long)]
    pub manifest_source_id: String,
}

impl RemoveOrderArgs {
    /// Execute the remove-order command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let service = match connect(config_path).await {
            Ok(s) => s,
            Err(code) => return Ok(code),
        };

        report(
            service
                .remove_order_from_manifest(&self.order_line_id, &self.manifest_source_id)
                .await,
        )
    }
}

/// Arguments for the update-order command
#[derive(Args, Debug)]
pub struct UpdateOrderArgs {
    /// Order the line belongs to
    #[arg(long)]
    pub order_id: String,

    /// Details as JSON, keyed like the indexed order document
    #[arg(long, value_name = "JSON", conflicts_with = "file")]
    pub details: Option<String>,

    /// File holding the details JSON
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
}

impl UpdateOrderArgs {
    /// Execute the update-order command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let details: OrderDetailsUpdate =
            match read_body(self.details.as_deref(), self.file.as_deref()) {
                Ok(d) => d,
                Err(e) => {
                    eprintln!("❌ {e}");
                    return Ok(EXIT_CLIENT);
                }
            };

        let service = match connect(config_path).await {
            Ok(s) => s,
            Err(code) => return Ok(code),
        };

        report(service.update_order_details(&self.order_id, &details).await)
    }
}

/// Arguments for the update-order-sequence command
#[derive(Args, Debug)]
pub struct UpdateSequenceArgs {
    /// Sequence as JSON:
    /// {"manifestSourceId": ..., "orders": [{"orderLineId": ..., "sequence": ...}]}
    #[arg(long, value_name = "JSON", conflicts_with = "file")]
    pub sequence: Option<String>,

    /// File holding the sequence JSON
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
}

impl UpdateSequenceArgs {
    /// Execute the update-order-sequence command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let update: OrderSequenceUpdate =
            match read_body(self.sequence.as_deref(), self.file.as_deref()) {
                Ok(u) => u,
                Err(e) => {
                    eprintln!("❌ {e}");
                    return Ok(EXIT_CLIENT);
                }
            };

        let service = match connect(config_path).await {
            Ok(s) => s,
            Err(code) => return Ok(code),
        };

        report(service.update_order_sequence(&update).await)
    }
}
