/*!
 * Tests for application configuration functionality
 */

use log::LevelFilter;
use std::path::PathBuf;

use modlingo::app_config::{Config, LogLevel};
use modlingo::deletion::{DeletionOptions, DEFAULT_BATCH_SIZE};

use crate::common;

/// Test default configuration values
#[test]
fn test_default_config_withNoParameters_shouldHaveCorrectDefaults() {
    let config = Config::default();

    assert_eq!(config.database.path, None);
    assert!(!config.database.vacuum_after_delete);
    assert_eq!(config.deletion.batch_size, DEFAULT_BATCH_SIZE);
    assert!(config.deletion.log_scope_counts);
    assert_eq!(config.log_level, LogLevel::Info);
}

/// Test configuration validation
#[test]
fn test_config_validation_withVariousConfigs_shouldValidateCorrectly() {
    let mut config = Config::default();
    assert!(config.validate().is_ok());

    // Zero batch size would never make progress
    config.deletion.batch_size = 0;
    assert!(config.validate().is_err());

    config.deletion.batch_size = 2_000_000;
    assert!(config.validate().is_err());

    config.deletion.batch_size = 1;
    assert!(config.validate().is_ok());

    config.database.path = Some(PathBuf::new());
    assert!(config.validate().is_err());

    config.database.path = Some(PathBuf::from("/tmp/modlingo.db"));
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_saveAndLoad_withTempFile_shouldRoundTrip() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("conf.json");

    let mut config = Config::default();
    config.database.path = Some(dir.path().join("store.db"));
    config.database.vacuum_after_delete = true;
    config.deletion.batch_size = 750;
    config.log_level = LogLevel::Debug;
    config.save(&path).unwrap();

    let loaded = Config::from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_config_fromFile_withPartialJson_shouldFillDefaults() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("conf.json");
    std::fs::write(&path, r#"{ "deletion": { "batch_size": 100 }, "log_level": "warn" }"#).unwrap();

    let config = Config::from_file(&path).unwrap();

    assert_eq!(config.deletion.batch_size, 100);
    assert!(config.deletion.log_scope_counts);
    assert_eq!(config.database.path, None);
    assert_eq!(config.log_level, LogLevel::Warn);
}

#[test]
fn test_config_fromFile_withMissingFile_shouldFail() {
    let dir = common::create_temp_dir().unwrap();
    let result = Config::from_file(dir.path().join("absent.json"));

    assert!(result.is_err());
}

#[test]
fn test_logLevel_intoLevelFilter_shouldMapEachLevel() {
    assert_eq!(LevelFilter::from(LogLevel::Error), LevelFilter::Error);
    assert_eq!(LevelFilter::from(LogLevel::Warn), LevelFilter::Warn);
    assert_eq!(LevelFilter::from(LogLevel::Info), LevelFilter::Info);
    assert_eq!(LevelFilter::from(LogLevel::Debug), LevelFilter::Debug);
    assert_eq!(LevelFilter::from(LogLevel::Trace), LevelFilter::Trace);
}

#[test]
fn test_deletionOptions_fromConfig_shouldFollowDeletionSection() {
    let mut config = Config::default();
    config.deletion.batch_size = 42;
    config.deletion.log_scope_counts = false;

    let options = DeletionOptions::from(&config.deletion);

    assert_eq!(options.batch_size, 42);
    assert!(!options.collect_scope_counts);
}
