//! Integration tests for logging functionality

use lading::config::LoggingConfig;
use lading::domain::{ManifestSourceId, RuleId, RuleVerdict};
use lading::logging::init_logging;
use tempfile::TempDir;

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert!(config.local_enabled);
    assert_eq!(config.local_rotation, "daily");
    assert_eq!(config.local_path, "/var/log/lading");
}

// A global subscriber can only be installed once per process, so every
// init_logging assertion lives in this one test.
#[test]
fn test_init_logging_creates_directory() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("logs");

    let config = LoggingConfig {
        local_enabled: true,
        local_path: log_path.to_string_lossy().to_string(),
        local_rotation: "never".to_string(),
    };
    assert!(!log_path.exists());

    assert!(init_logging("verbose", &config).is_err());

    let guard = init_logging("debug", &config).expect("logging initializes");
    assert!(log_path.is_dir());

    let manifest = ManifestSourceId::new("M1").unwrap();
    lading::log_rule_verdict!(RuleId::FreightType, &manifest, &RuleVerdict::AllGood);

    assert!(init_logging("info", &config).is_err());
    drop(guard);
}
