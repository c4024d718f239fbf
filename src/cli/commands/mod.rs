//! CLI command implementations
//!
//! This module contains all CLI command implementations.

pub mod aggregates;
pub mod init;
pub mod orders;
pub mod rules;
pub mod status;
pub mod validate;

use crate::adapters::factory::create_stores;
use crate::config::load_config;
use crate::core::service::ManifestRuleService;
use crate::domain::{LadingError, PersistenceError, Result};
use crate::log_error_with_context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

pub const EXIT_OK: i32 = 0;
pub const EXIT_CONFIG: i32 = 2;
pub const EXIT_CLIENT: i32 = 3;
pub const EXIT_CONNECTION: i32 = 4;
pub const EXIT_FATAL: i32 = 5;

/// Exit code for a failed operation
pub fn exit_code(error: &LadingError) -> i32 {
    match error {
        e if e.is_client_error() => EXIT_CLIENT,
        LadingError::Configuration(_) => EXIT_CONFIG,
        LadingError::Persistence(PersistenceError::Connection(_)) => EXIT_CONNECTION,
        _ => EXIT_FATAL,
    }
}

/// Loads the configuration and builds the service
///
/// Failures are reported on stderr and returned as the exit code.
pub(crate) async fn connect(config_path: &str) -> std::result::Result<ManifestRuleService, i32> {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("❌ Failed to load configuration file");
            eprintln!("   Error: {e}");
            return Err(EXIT_CONFIG);
        }
    };

    match create_stores(&config, false).await {
        Ok(stores) => Ok(ManifestRuleService::from_config(stores, &config)),
        Err(e) => {
            eprintln!("❌ Failed to create store clients");
            eprintln!("   Error: {e}");
            Err(EXIT_CONNECTION)
        }
    }
}

/// Prints an operation outcome as JSON and returns the exit code
///
/// Server-side failures only expose a generic message; details go to the log.
pub(crate) fn report<T: Serialize>(outcome: Result<T>) -> anyhow::Result<i32> {
    match outcome {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(EXIT_OK)
        }
        Err(e) => {
            log_error_with_context!(&e, "Operation failed");
            let body = serde_json::json!({
                "status": "error",
                "message": e.public_message(),
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(exit_code(&e))
        }
    }
}

/// Reads a JSON request body given inline or as a file path
pub(crate) fn read_body<T: DeserializeOwned>(
    inline: Option<&str>,
    file: Option<&Path>,
) -> Result<T> {
    let text = match (inline, file) {
        (Some(text), _) => text.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => return Err(LadingError::missing_fields(["body"])),
    };
    serde_json::from_str(&text)
        .map_err(|e| LadingError::Serialization(format!("Invalid request body: {e}")))
}
