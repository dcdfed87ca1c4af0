//! Client configuration

use serde::{Deserialize, Serialize};
use solana_program::pubkey::Pubkey;
use std::{fs, path::Path, str::FromStr, time::Duration};
use thiserror::Error;

/// Program id the demo deployment used.
pub const DEFAULT_PROGRAM_ID: &str = "6QhuZSVhdX6NFR6FFparMqCFRqwzjWNaSFXVxvZrEwuj";

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("toml parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("toml serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("inconsistent configuration: {0}")]
    Inconsistent(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Ledger RPC endpoint
    pub rpc_url: String,
    /// Multisig program id (base58)
    pub program_id: String,
    /// Commitment level used for reads and preflight (processed, confirmed, finalized)
    pub commitment: String,
    /// Upper bound for any single ledger call, in seconds
    pub request_timeout_secs: u64,
    /// Interval between finality checks of a pending submission
    pub poll_interval_ms: u64,
    /// Give up polling after this many seconds; unbounded when unset
    pub finality_timeout_secs: Option<u64>,
    pub min_threshold: u64,
    pub max_threshold: u64,
    pub min_owners: usize,
    pub max_owners: usize,
    /// Amount requested per faucet call
    pub faucet_lamports: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8899".to_string(),
            program_id: DEFAULT_PROGRAM_ID.to_string(),
            commitment: "confirmed".to_string(),
            request_timeout_secs: 30,
            poll_interval_ms: 3_000,
            finality_timeout_secs: None,
            min_threshold: 2,
            max_threshold: 3,
            min_owners: 2,
            max_owners: 3,
            faucet_lamports: LAMPORTS_PER_SOL,
        }
    }
}

impl ClientConfig {
    /// Load configuration from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.program_id()?;
        if self.min_threshold == 0 || self.min_threshold > self.max_threshold {
            return Err(ConfigError::Inconsistent(format!(
                "threshold range {}..={} is empty or starts at zero",
                self.min_threshold, self.max_threshold
            )));
        }
        if self.min_owners == 0 || self.min_owners > self.max_owners {
            return Err(ConfigError::Inconsistent(format!(
                "owner range {}..={} is empty or starts at zero",
                self.min_owners, self.max_owners
            )));
        }
        if self.max_threshold as usize > self.max_owners {
            return Err(ConfigError::Inconsistent(
                "max_threshold exceeds max_owners".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Inconsistent(
                "poll_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn program_id(&self) -> Result<Pubkey, ConfigError> {
        Pubkey::from_str(&self.program_id).map_err(|_| ConfigError::InvalidValue {
            key: "program_id".to_string(),
            value: self.program_id.clone(),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn finality_timeout(&self) -> Option<Duration> {
        self.finality_timeout_secs.map(Duration::from_secs)
    }

    /// Set a configuration value
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
            value.parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            })
        }

        match key {
            "rpc_url" => self.rpc_url = value.to_string(),
            "program_id" => {
                Pubkey::from_str(value).map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })?;
                self.program_id = value.to_string();
            }
            "commitment" => match value {
                "processed" | "confirmed" | "finalized" => self.commitment = value.to_string(),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: key.to_string(),
                        value: value.to_string(),
                    })
                }
            },
            "request_timeout_secs" => self.request_timeout_secs = parse(key, value)?,
            "poll_interval_ms" => self.poll_interval_ms = parse(key, value)?,
            "finality_timeout_secs" => {
                self.finality_timeout_secs = match value {
                    "" | "none" => None,
                    v => Some(parse(key, v)?),
                }
            }
            "min_threshold" => self.min_threshold = parse(key, value)?,
            "max_threshold" => self.max_threshold = parse(key, value)?,
            "min_owners" => self.min_owners = parse(key, value)?,
            "max_owners" => self.max_owners = parse(key, value)?,
            "faucet_lamports" => self.faucet_lamports = parse(key, value)?,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(3));
        assert_eq!(config.finality_timeout(), None);
        assert_eq!(config.faucet_lamports, LAMPORTS_PER_SOL);
        assert_eq!(config.program_id().unwrap().to_string(), DEFAULT_PROGRAM_ID);
        config.validate().unwrap();
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = ClientConfig::default();
        config.rpc_url = "https://api.devnet.solana.com".to_string();
        config.finality_timeout_secs = Some(90);
        config.save_to_file(&path).unwrap();

        let loaded = ClientConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "poll_interval_ms = 500\n").unwrap();

        let loaded = ClientConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.poll_interval(), Duration::from_millis(500));
        assert_eq!(loaded.rpc_url, ClientConfig::default().rpc_url);
    }

    #[test]
    fn test_set_values() {
        let mut config = ClientConfig::default();
        config.set("commitment", "finalized").unwrap();
        config.set("finality_timeout_secs", "120").unwrap();
        assert_eq!(config.finality_timeout(), Some(Duration::from_secs(120)));
        config.set("finality_timeout_secs", "none").unwrap();
        assert_eq!(config.finality_timeout(), None);

        assert!(matches!(
            config.set("commitment", "eventually"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config.set("program_id", "not-a-key"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config.set("poll_interval_ms", "soon"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config.set("colour", "blue"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_validate_rejects_inconsistent_bounds() {
        let mut config = ClientConfig::default();
        config.min_threshold = 4;
        assert!(matches!(config.validate(), Err(ConfigError::Inconsistent(_))));

        let mut config = ClientConfig::default();
        config.max_threshold = 5;
        assert!(matches!(config.validate(), Err(ConfigError::Inconsistent(_))));

        let mut config = ClientConfig::default();
        config.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }
}
