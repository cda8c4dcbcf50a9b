//! Session configuration.
//!
//! # Responsibility
//! - Describe where the keyspace lives and how the connection pool behaves.
//! - Load settings from an optional file layered under `RESERVATION__*`
//!   environment overrides.
//!
//! # Invariants
//! - Every field has a default; an empty source set yields an in-memory
//!   session on keyspace `reservation` with logging left to the host.

use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_KEYSPACE: &str = "reservation";
const DEFAULT_POOL_SIZE: usize = 4;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const ENV_PREFIX: &str = "RESERVATION";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_LOG_BASENAME: &str = "reservation_store";
const DEFAULT_LOG_FILE_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_LOG_FILES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory holding `<keyspace>.db`. `None` keeps the keyspace in memory.
    pub storage_dir: Option<PathBuf>,
    pub keyspace: String,
    /// Pooled connections for file-backed keyspaces. In-memory sessions always use one.
    pub pool_size: usize,
    /// Upper bound a single statement waits on a locked database.
    pub busy_timeout_ms: u64,
    /// When set, `Session::open` starts process logging before anything else.
    pub logging: Option<LoggingConfig>,
}

/// Rolling log file settings, e.g. `RESERVATION__LOGGING__LEVEL=debug`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: PathBuf,
    pub file_basename: String,
    /// Size at which the current file is rotated.
    pub max_file_bytes: u64,
    pub keep_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            directory: PathBuf::from("logs"),
            file_basename: DEFAULT_LOG_BASENAME.to_string(),
            max_file_bytes: DEFAULT_LOG_FILE_BYTES,
            keep_files: DEFAULT_LOG_FILES,
        }
    }
}

impl LoggingConfig {
    pub fn in_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_dir: None,
            keyspace: DEFAULT_KEYSPACE.to_string(),
            pool_size: DEFAULT_POOL_SIZE,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            logging: None,
        }
    }
}

impl SessionConfig {
    pub fn in_memory(keyspace: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            ..Self::default()
        }
    }

    pub fn file_backed(storage_dir: impl Into<PathBuf>, keyspace: impl Into<String>) -> Self {
        Self {
            storage_dir: Some(storage_dir.into()),
            keyspace: keyspace.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from `file` (when given) and the environment.
    ///
    /// Environment keys use `RESERVATION__` as prefix and `__` as separator,
    /// e.g. `RESERVATION__POOL_SIZE=8`.
    pub fn load(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }
        builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn is_in_memory(&self) -> bool {
        self.storage_dir.is_none()
    }
}
