//! Storage configuration
//!
//! Loaded from YAML; every section falls back to its defaults when omitted.
//!
//! ```yaml
//! data_dir: ./data
//! backend: rocksdb
//! sync_writes: false
//! lock_stripes: 64
//! binlog:
//!   enabled: true
//!   capacity: 1000000
//!   kind: sync
//! ```

use crate::binlog::ReplicationKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ordered store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Persistent RocksDB under `data_dir`
    #[default]
    Rocksdb,
    /// Volatile in-memory store
    Memory,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data storage directory
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Store backend
    #[serde(default)]
    pub backend: Backend,
    /// fsync the store's write-ahead log on every commit
    #[serde(default)]
    pub sync_writes: bool,
    /// Number of per-name write lock stripes
    #[serde(default = "default_lock_stripes")]
    pub lock_stripes: usize,
    /// Binlog configuration
    #[serde(default)]
    pub binlog: BinlogConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backend: Backend::default(),
            sync_writes: false,
            lock_stripes: default_lock_stripes(),
            binlog: BinlogConfig::default(),
        }
    }
}

impl StorageConfig {
    /// In-memory configuration, mostly for tests and embedding
    pub fn memory() -> Self {
        Self {
            backend: Backend::Memory,
            ..Default::default()
        }
    }

    /// Load configuration from YAML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_yaml(&content)
    }

    /// Load configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), ConfigError> {
        let yaml =
            serde_yaml::to_string(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;
        std::fs::write(path, yaml).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lock_stripes == 0 {
            return Err(ConfigError::Invalid(
                "lock_stripes must be greater than 0".to_string(),
            ));
        }
        if self.backend == Backend::Rocksdb && self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "data_dir is required for the rocksdb backend".to_string(),
            ));
        }
        Ok(())
    }

    /// RocksDB directory under `data_dir`
    pub fn rocksdb_path(&self) -> PathBuf {
        self.data_dir.join("rocksdb")
    }
}

/// Binlog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinlogConfig {
    /// Write binlog records alongside mutations
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Number of most recent records kept (0 keeps everything)
    #[serde(default = "default_binlog_capacity")]
    pub capacity: u64,
    /// Replication kind stamped on every record
    #[serde(default)]
    pub kind: ReplicationKind,
}

impl Default for BinlogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_binlog_capacity(),
            kind: ReplicationKind::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_lock_stripes() -> usize {
    64
}

fn default_binlog_capacity() -> u64 {
    1_000_000
}

fn default_true() -> bool {
    true
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Serialize error: {0}")]
    SerializeError(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
