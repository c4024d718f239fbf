// Lading - Manifest planning rules engine
// Copyright (c) 2025 Lading Contributors
// Licensed under the MIT License

use lading::cli::commands::EXIT_FATAL;
use lading::cli::{Cli, Commands};
use lading::config::{load_config, LoggingConfig};
use lading::domain::RuleId;
use lading::logging::init_logging;
use clap::Parser;
use std::process;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // File logging follows the configuration when it loads; commands report
    // configuration errors themselves
    let config = if cli.command.uses_config() {
        load_config(&cli.config).ok()
    } else {
        None
    };
    let log_level = cli
        .log_level
        .clone()
        .or_else(|| config.as_ref().map(|c| c.application.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    let logging_config = match config {
        Some(c) => c.logging,
        None => LoggingConfig {
            local_enabled: false,
            ..LoggingConfig::default()
        },
    };

    // Held until exit so buffered file logs are flushed
    let guard = match init_logging(&log_level, &logging_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(EXIT_FATAL);
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Lading - Manifest planning rules engine"
    );

    let exit_code = match execute_command(&cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command execution failed");
            eprintln!("Error: {e}");
            EXIT_FATAL
        }
    };

    drop(guard);
    process::exit(exit_code);
}

/// Execute the CLI command
async fn execute_command(cli: &Cli) -> anyhow::Result<i32> {
    match &cli.command {
        Commands::CheckFreightType(args) => args.execute(&cli.config, RuleId::FreightType).await,
        Commands::CheckLoadType(args) => args.execute(&cli.config, RuleId::LoadType).await,
        Commands::RemoveOrder(args) => args.execute(&cli.config).await,
        Commands::UpdateOrder(args) => args.execute(&cli.config).await,
        Commands::UpdateOrderSequence(args) => args.execute(&cli.config).await,
        Commands::CommodityWeight(args) => args.execute_commodity_weight(&cli.config).await,
        Commands::PalletCount(args) => args.execute_pallet_count(&cli.config).await,
        Commands::Status(args) => args.execute(&cli.config).await,
        Commands::ValidateConfig(args) => args.execute(&cli.config).await,
        Commands::Init(args) => args.execute().await,
    }
}
