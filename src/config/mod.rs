//! Application configuration.
//!
//! Loaded from YAML files and environment variables into a single
//! [`Config`] struct.

mod storage;

pub use storage::{ScyllaConfig, SchemaConfig, StorageConfig, StorageType, DEFAULT_KEYSPACE};

use serde::Deserialize;

use crate::storage::schema::validate_keyspace;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "RESERVATIONS_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "RESERVATIONS";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "RESERVATIONS_LOG";

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix,
    ///    e.g. `RESERVATIONS__STORAGE__KEYSPACE`
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("storage.scylla.contact_points")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would only fail later at the storage layer.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_keyspace(&self.storage.keyspace)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.storage.schema.replication_factor == 0 {
            return Err(ConfigError::Invalid(
                "storage.schema.replication_factor must be at least 1".to_string(),
            ));
        }
        if self.storage.storage_type == StorageType::Scylla
            && self.storage.scylla.contact_points.is_empty()
        {
            return Err(ConfigError::Invalid(
                "storage.scylla.contact_points must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self::default()
    }
}
