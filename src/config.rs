//! Configuration for the ledger server
//!
//! Values come from an optional TOML file, then `LEDGER_*` environment
//! variables, then validation.

use serde::Deserialize;
use thiserror::Error;

use std::fs;
use std::path::{Path, PathBuf};

use crate::blockchain::ChainConfig;

/// Default configuration file, overridden by `LEDGER_CONFIG`
pub const DEFAULT_CONFIG_PATH: &str = "ledger.toml";

/// Difficulty beyond the length of a hex SHA-256 digest can never be met
const MAX_DIFFICULTY: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub chain: ChainConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            data_dir: PathBuf::from("data/blockchain"),
        }
    }
}

impl Config {
    /// Loads the configuration the server starts with
    ///
    /// Reads `LEDGER_CONFIG` (or `ledger.toml`) when the file exists, then
    /// applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("LEDGER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(Path::new(&path))?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file, falling back to defaults when it does not exist
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Applies `LEDGER_*` overrides read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("LEDGER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = parse_env(&lookup, "LEDGER_PORT")? {
            self.server.port = port;
        }
        if let Some(data_dir) = lookup("LEDGER_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(data_dir);
        }
        if let Some(difficulty) = parse_env(&lookup, "LEDGER_DIFFICULTY")? {
            self.chain.difficulty = difficulty;
        }
        if let Some(threshold) = parse_env(&lookup, "LEDGER_SEAL_THRESHOLD")? {
            self.chain.seal_threshold = threshold;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain.seal_threshold == 0 {
            return Err(ConfigError::Invalid(
                "chain.seal_threshold must be at least 1".to_string(),
            ));
        }

        if self.chain.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::Invalid(format!(
                "chain.difficulty must be at most {}",
                MAX_DIFFICULTY
            )));
        }

        if self.storage.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("storage.data_dir must be set".to_string()));
        }

        Ok(())
    }
}

fn parse_env<F, T>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let value = match lookup(name) {
        Some(value) => value,
        None => return Ok(None),
    };

    let parsed = value.trim().parse::<T>();
    match parsed {
        Ok(parsed) => Ok(Some(parsed)),
        Err(_) => Err(ConfigError::InvalidEnv {
            name: name.to_string(),
            value,
        }),
    }
}
