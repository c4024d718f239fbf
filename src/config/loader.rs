//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::LadingConfig;
use super::secret::secret_string;
use crate::domain::errors::LadingError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into LadingConfig
/// 4. Applies environment variable overrides (LADING_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - A referenced environment variable is not set
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use lading::config::loader::load_config;
///
/// let config = load_config("lading.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<LadingConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(LadingError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        LadingError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: LadingConfig = toml::from_str(&contents)
        .map_err(|e| LadingError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config);

    config.validate().map_err(|e| {
        LadingError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched. Every missing variable is reported in
/// one error.
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| LadingError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut lines = Vec::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let processed = re.replace_all(line, |cap: &regex::Captures<'_>| {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    String::new()
                }
            }
        });
        lines.push(processed.into_owned());
    }

    if !missing_vars.is_empty() {
        return Err(LadingError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env(name).and_then(|v| v.trim().parse().ok())
}

/// Applies environment variable overrides using the LADING_* prefix
///
/// Environment variables follow the pattern: LADING_<SECTION>_<KEY>
/// For example: LADING_ELASTICSEARCH_BASE_URL, LADING_COORDINATOR_STEP_TIMEOUT_SECONDS.
/// Unparseable numeric or boolean values are ignored.
fn apply_env_overrides(config: &mut LadingConfig) {
    // Application
    if let Some(val) = env("LADING_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(val) = env_parse("LADING_APPLICATION_UPDATE_USER_ID") {
        config.application.update_user_id = val;
    }
    if let Some(val) = env("LADING_ENVIRONMENT") {
        if let Ok(environment) = toml::Value::String(val).try_into() {
            config.environment = environment;
        }
    }

    // PostgreSQL
    if let Some(val) = env("LADING_POSTGRESQL_CONNECTION_STRING") {
        config.postgresql.connection_string = secret_string(val);
    }
    if let Some(val) = env_parse("LADING_POSTGRESQL_MAX_CONNECTIONS") {
        config.postgresql.max_connections = val;
    }
    if let Some(val) = env_parse("LADING_POSTGRESQL_STATEMENT_TIMEOUT_SECONDS") {
        config.postgresql.statement_timeout_seconds = val;
    }
    if let Some(val) = env("LADING_POSTGRESQL_SSL_MODE") {
        config.postgresql.ssl_mode = val;
    }

    // Elasticsearch
    if let Some(val) = env("LADING_ELASTICSEARCH_BASE_URL") {
        config.elasticsearch.base_url = val;
    }
    if let Some(val) = env("LADING_ELASTICSEARCH_USERNAME") {
        config.elasticsearch.username = Some(val);
    }
    if let Some(val) = env("LADING_ELASTICSEARCH_PASSWORD") {
        config.elasticsearch.password = Some(secret_string(val));
    }
    if let Some(val) = env("LADING_ELASTICSEARCH_ORDERS_INDEX") {
        config.elasticsearch.orders_index = val;
    }
    if let Some(val) = env("LADING_ELASTICSEARCH_MANIFESTS_INDEX") {
        config.elasticsearch.manifests_index = val;
    }
    if let Some(val) = env_parse("LADING_ELASTICSEARCH_TLS_VERIFY") {
        config.elasticsearch.tls_verify = val;
    }
    if let Some(val) = env_parse("LADING_ELASTICSEARCH_TIMEOUT_SECONDS") {
        config.elasticsearch.timeout_seconds = val;
    }

    // Coordinator
    if let Some(val) = env_parse("LADING_COORDINATOR_STEP_TIMEOUT_SECONDS") {
        config.coordinator.step_timeout_seconds = val;
    }

    // Rules
    if let Some(val) = env_parse("LADING_RULES_CLEAR_RESOLVED_VIOLATIONS") {
        config.rules.clear_resolved_violations = val;
    }

    // Logging
    if let Some(val) = env_parse("LADING_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val;
    }
    if let Some(val) = env("LADING_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Some(val) = env("LADING_LOGGING_LOCAL_ROTATION") {
        config.logging.local_rotation = val;
    }
}
