//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Lading using clap.
//! Service commands print their result as JSON on stdout.
//!
//! # Exit codes
//!
//! | Code | Meaning                                        |
//! |------|------------------------------------------------|
//! | 0    | Success (including rule violations)            |
//! | 2    | Configuration error                            |
//! | 3    | Client error (validation, unknown manifest or order) |
//! | 4    | Store connection error                         |
//! | 5    | Fatal error                                    |

pub mod commands;

use clap::{Parser, Subcommand};

/// Lading - Manifest planning rules engine
#[derive(Parser, Debug)]
#[command(name = "lading")]
#[command(version, about, long_about = None)]
#[command(author = "Lading Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "lading.toml", env = "LADING_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "LADING_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that every order on a manifest shares its freight type (BR_PLN_7)
    CheckFreightType(commands::rules::RuleArgs),

    /// Check that every order on a manifest shares its load type (BR_PLN_6)
    CheckLoadType(commands::rules::RuleArgs),

    /// Move an order line onto a manifest and re-check both rules
    RemoveOrder(commands::orders::RemoveOrderArgs),

    /// Update the editable details of an order line
    UpdateOrder(commands::orders::UpdateOrderArgs),

    /// Resequence the order lines of a manifest
    UpdateOrderSequence(commands::orders::UpdateSequenceArgs),

    /// Total weight of the orders on a manifest
    CommodityWeight(commands::aggregates::ManifestArgs),

    /// Total pallet count of the orders on a manifest
    PalletCount(commands::aggregates::ManifestArgs),

    /// Check connectivity of both stores
    Status(commands::status::StatusArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

impl Commands {
    /// Whether the command reads the configuration file
    pub fn uses_config(&self) -> bool {
        !matches!(self, Commands::Init(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_check_freight_type() {
        let cli = Cli::parse_from(["lading", "check-freight-type", "M108265"]);
        assert_eq!(cli.config, "lading.toml");
        match cli.command {
            Commands::CheckFreightType(args) => assert_eq!(args.manifest_source_id, "M108265"),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["lading", "--config", "custom.toml", "check-load-type", "M1"]);
        assert_eq!(cli.config, "custom.toml");
        assert!(matches!(cli.command, Commands::CheckLoadType(_)));
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["lading", "--log-level", "debug", "status"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_parse_remove_order() {
        let cli = Cli::parse_from([
            "lading",
            "remove-order",
            "--order-line-id",
            "O1",
            "--manifest-source-id",
            "M2",
        ]);
        match cli.command {
            Commands::RemoveOrder(args) => {
                assert_eq!(args.order_line_id, "O1");
                assert_eq!(args.manifest_source_id, "M2");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_validate_config() {
        let cli = Cli::parse_from(["lading", "validate-config"]);
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
        assert!(cli.command.uses_config());
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["lading", "init"]);
        assert!(matches!(cli.command, Commands::Init(_)));
        assert!(!cli.command.uses_config());
    }
}
