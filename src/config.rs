//! Mapper configuration
//!
//! Environment variables:
//! - `JOINGRAPH_SUPPRESS_DUPLICATES` (default: true)
//! - `JOINGRAPH_COLUMN_SEPARATOR` (default: ".")
//! - `JOINGRAPH_IDENTITY_CACHE_CAPACITY` (default: 64)

use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Per-query mapper configuration with validation
#[derive(Clone, Debug, PartialEq, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Report rows for an already-seen key as duplicates instead of entities
    pub suppress_duplicates: bool,

    /// Separator between alias and column name, as in `emails.address`
    #[validate(length(min = 1, message = "Column separator cannot be empty"))]
    pub column_separator: String,

    /// Initial capacity of the identity cache
    #[validate(range(
        max = 1_000_000,
        message = "Identity cache capacity must be at most 1000000"
    ))]
    pub identity_cache_capacity: usize,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            suppress_duplicates: true,
            column_separator: ".".to_string(),
            identity_cache_capacity: 64,
        }
    }
}

impl MapperConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            suppress_duplicates: parse_env_var("JOINGRAPH_SUPPRESS_DUPLICATES", "true")?,
            column_separator: env::var("JOINGRAPH_COLUMN_SEPARATOR")
                .unwrap_or_else(|_| ".".to_string()),
            identity_cache_capacity: parse_env_var("JOINGRAPH_IDENTITY_CACHE_CAPACITY", "64")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file
    ///
    /// Read failures report the file, parse failures carry the YAML text so a
    /// bad key or separator is visible in the error.
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}
