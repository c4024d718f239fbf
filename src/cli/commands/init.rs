//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use super::{EXIT_CONFIG, EXIT_FATAL, EXIT_OK};
use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "lading.toml")]
    pub output: String,

    /// Include example values and comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing Lading configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(EXIT_CONFIG);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. Create a .env file with your credentials:");
                println!("     - LADING_DATABASE_URL");
                println!("     - LADING_ES_USERNAME and LADING_ES_PASSWORD");
                println!("  3. Apply the schema: lading status --ensure-schema");
                println!("  4. Validate configuration: lading validate-config");
                println!();
                Ok(EXIT_OK)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(EXIT_FATAL)
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# Lading Configuration File
# Manifest planning rules engine

environment = "development"

[application]
log_level = "info"

[postgresql]
connection_string = "${LADING_DATABASE_URL}"

[elasticsearch]
base_url = "http://localhost:9200"
orders_index = "unplanned_orders"
manifests_index = "manifest"

[logging]
local_enabled = false
"#
        .to_string()
    }

    /// Generate configuration with examples and comments
    fn generate_config_with_examples() -> String {
        r#"# Lading Configuration File
# Manifest planning rules engine
#
# Values of the form ${VAR} are read from the environment (or a .env file).
# Any key can also be overridden with LADING_<SECTION>_<KEY>,
# e.g. LADING_COORDINATOR_STEP_TIMEOUT_SECONDS=10.

# development | staging | production
# TLS verification cannot be disabled in production.
environment = "production"

[application]
# trace | debug | info | warn | error
log_level = "info"
# User id stamped on order detail and sequence updates
update_user_id = 9999

[postgresql]
connection_string = "${LADING_DATABASE_URL}"
max_connections = 10
connection_timeout_seconds = 30
# Applied to every coordinated write with SET LOCAL statement_timeout
statement_timeout_seconds = 60
# disable | prefer | require | verify-ca | verify-full
ssl_mode = "require"

[elasticsearch]
base_url = "https://search.example.com:9200"
username = "${LADING_ES_USERNAME}"
password = "${LADING_ES_PASSWORD}"
orders_index = "unplanned_orders"
manifests_index = "manifest"
# Upper bound on hits returned by one search (at most 10000)
max_hits = 10000
tls_verify = true
timeout_seconds = 60

[elasticsearch.retry]
# Only connection failures, 429 and 5xx responses are retried
max_retries = 3
initial_delay_ms = 1000
max_delay_ms = 30000
backoff_multiplier = 2.0

[coordinator]
# Time budget of each step of a coordinated write (1-600)
step_timeout_seconds = 30

[rules]
# Delete the live error log record once a rule passes again
clear_resolved_violations = true

[logging]
local_enabled = true
local_path = "/var/log/lading"
# daily | hourly | never
local_rotation = "daily"
"#
        .to_string()
    }
}
