use anyhow::{anyhow, Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::deletion::DEFAULT_BATCH_SIZE;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Store location
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Deletion engine settings
    #[serde(default)]
    pub deletion: DeletionConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Database configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct DatabaseConfig {
    // @field: Database file; the user data directory is used when unset
    #[serde(default)]
    pub path: Option<PathBuf>,

    // @field: Run VACUUM after a deletion to give space back to the OS
    #[serde(default)]
    pub vacuum_after_delete: bool,
}

/// Deletion engine configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DeletionConfig {
    // @field: Rows per statement when purging large tables
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    // @field: Count rows in scope before deleting (debug log)
    #[serde(default = "default_true")]
    pub log_scope_counts: bool,
}

impl Default for DeletionConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            log_scope_counts: default_true(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Largest accepted batch size; larger batches hold the write lock too long
const MAX_BATCH_SIZE: usize = 1_000_000;

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.deletion.batch_size == 0 {
            return Err(anyhow!("Deletion batch size must be greater than zero"));
        }
        if self.deletion.batch_size > MAX_BATCH_SIZE {
            return Err(anyhow!(
                "Deletion batch size {} exceeds the maximum of {}",
                self.deletion.batch_size,
                MAX_BATCH_SIZE
            ));
        }
        if let Some(path) = &self.database.path {
            if path.as_os_str().is_empty() {
                return Err(anyhow!("Database path must not be empty"));
            }
        }

        Ok(())
    }

    /// Load a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config to file: {}", path.display()))?;
        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            database: DatabaseConfig::default(),
            deletion: DeletionConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
