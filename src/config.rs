//! Configuration management for the round settlement server
//!
//! Defaults, an optional TOML file, `RGS_*` environment overrides and
//! validation, applied in that order.

use crate::common::Amount;
use crate::errors::{ConfigurationError, RgsResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RgsConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub ledger: LedgerConfig,
    pub games: GamesConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    Memory,
    Rocksdb,
}

impl std::str::FromStr for StorageBackendKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "rocksdb" | "rocks" => Ok(Self::Rocksdb),
            _ => Err(ConfigurationError::InvalidValue {
                field: "storage.backend".to_string(),
                value: s.to_string(),
                reason: "expected 'memory' or 'rocksdb'".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackendKind,
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub lock_timeout_ms: u64,
    /// Balance of a new wallet, in major units
    pub starting_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GamesConfig {
    /// Extra paytable TOML files registered next to the built-in game
    pub paytables: Vec<PathBuf>,
}

impl Default for RgsConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            ledger: LedgerConfig::default(),
            games: GamesConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::Memory,
            data_dir: None,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5_000,
            starting_balance: 1000.0,
        }
    }
}

impl LedgerConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn starting_amount(&self) -> Result<Amount, ConfigurationError> {
        Amount::from_major(self.starting_balance)
            .filter(|amount| !amount.is_zero())
            .ok_or_else(|| ConfigurationError::InvalidValue {
                field: "ledger.starting_balance".to_string(),
                value: self.starting_balance.to_string(),
                reason: "Starting balance must be a positive amount".to_string(),
            })
    }
}

/// Configuration loader with environment variable support
#[derive(Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> RgsResult<RgsConfig> {
        self.load_with(|key| env::var(key).ok())
    }

    /// Same as `load` with a custom variable lookup
    pub fn load_with<F>(&self, lookup: F) -> RgsResult<RgsConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match &self.config_path {
            Some(path) => Self::load_from_file(path)?,
            None => RgsConfig::default(),
        };

        Self::apply_overrides(&mut config, lookup)?;
        Self::validate(&config)?;

        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<RgsConfig, ConfigurationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path.display(), e))
        })?;

        toml::from_str(&content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)))
    }

    fn apply_overrides<F>(config: &mut RgsConfig, lookup: F) -> Result<(), ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, value: String, reason: &str) -> Result<T, ConfigurationError> {
            value.parse().map_err(|_| ConfigurationError::InvalidValue {
                field: key.to_string(),
                value,
                reason: reason.to_string(),
            })
        }

        if let Some(host) = lookup("RGS_HOST") {
            config.server.host = host;
        }
        if let Some(port) = lookup("RGS_PORT") {
            config.server.port = parse("RGS_PORT", port, "Invalid port number")?;
        }
        if let Some(backend) = lookup("RGS_STORAGE_BACKEND") {
            config.storage.backend = backend.parse()?;
        }
        if let Some(dir) = lookup("RGS_DATA_DIR") {
            config.storage.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(timeout) = lookup("RGS_LOCK_TIMEOUT_MS") {
            config.ledger.lock_timeout_ms = parse("RGS_LOCK_TIMEOUT_MS", timeout, "Invalid timeout value")?;
        }
        if let Some(balance) = lookup("RGS_STARTING_BALANCE") {
            config.ledger.starting_balance = parse("RGS_STARTING_BALANCE", balance, "Invalid amount")?;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(config: &RgsConfig) -> Result<(), ConfigurationError> {
        if config.server.port == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "server.port".to_string(),
                value: "0".to_string(),
                reason: "Port cannot be zero".to_string(),
            });
        }

        if config.ledger.lock_timeout_ms < 10 {
            return Err(ConfigurationError::InvalidValue {
                field: "ledger.lock_timeout_ms".to_string(),
                value: config.ledger.lock_timeout_ms.to_string(),
                reason: "Lock timeout must be at least 10ms".to_string(),
            });
        }

        config.ledger.starting_amount()?;

        if config.storage.backend == StorageBackendKind::Rocksdb && config.storage.data_dir.is_none() {
            return Err(ConfigurationError::MissingRequired("storage.data_dir".to_string()));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, config: &RgsConfig, path: P) -> RgsResult<()> {
        let path = path.as_ref();
        let toml_string = toml::to_string_pretty(config)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string).map_err(|e| {
            ConfigurationError::SaveFailed(format!("Failed to write to {}: {}", path.display(), e)).into()
        })
    }
}

/// Builder pattern for creating configurations
#[derive(Default)]
pub struct ConfigBuilder {
    config: RgsConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, host: &str, port: u16) -> Self {
        self.config.server.host = host.to_string();
        self.config.server.port = port;
        self
    }

    pub fn memory_storage(mut self) -> Self {
        self.config.storage = StorageConfig::default();
        self
    }

    pub fn rocksdb_storage<P: AsRef<Path>>(mut self, data_dir: P) -> Self {
        self.config.storage = StorageConfig {
            backend: StorageBackendKind::Rocksdb,
            data_dir: Some(data_dir.as_ref().to_path_buf()),
        };
        self
    }

    pub fn lock_timeout_ms(mut self, ms: u64) -> Self {
        self.config.ledger.lock_timeout_ms = ms;
        self
    }

    pub fn starting_balance(mut self, major: f64) -> Self {
        self.config.ledger.starting_balance = major;
        self
    }

    pub fn paytable<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.games.paytables.push(path.as_ref().to_path_buf());
        self
    }

    /// Build and validate
    pub fn build(self) -> RgsResult<RgsConfig> {
        ConfigLoader::validate(&self.config)?;
        Ok(self.config)
    }
}
