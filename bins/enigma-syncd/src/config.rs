use enigma_sync::config::SyncConfig;
use enigma_sync::ids::{FeedId, PublicKey};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Clone, Debug, Deserialize)]
pub struct SyncdConfig {
    pub data_dir: PathBuf,
    pub identity: IdentityConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub feeds: FeedsConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct IdentityConfig {
    pub public_key: String,
    #[serde(default)]
    pub master_public_key: Option<String>,
    /// Epoch ms of the last backup restore; older envelopes show no errors.
    #[serde(default)]
    pub restoration_time: u64,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PushConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct FeedsConfig {
    #[serde(default)]
    pub subscribed: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io")]
    Io,
    #[error("parse")]
    Parse,
    #[error("invalid {0}")]
    Invalid(String),
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl SyncdConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.local_key()?;
        self.master_key()?;
        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid("logging.level".to_string()));
        }
        if self.feeds.subscribed.iter().any(|url| url.trim().is_empty()) {
            return Err(ConfigError::Invalid("feeds.subscribed".to_string()));
        }
        self.sync
            .validate()
            .map_err(|err| ConfigError::Invalid(err.to_string()))
    }

    pub fn local_key(&self) -> Result<PublicKey, ConfigError> {
        PublicKey::from_hex(&self.identity.public_key)
            .ok_or_else(|| ConfigError::Invalid("identity.public_key".to_string()))
    }

    pub fn master_key(&self) -> Result<Option<PublicKey>, ConfigError> {
        match self.identity.master_public_key.as_deref() {
            None => Ok(None),
            Some(value) => PublicKey::from_hex(value)
                .map(Some)
                .ok_or_else(|| ConfigError::Invalid("identity.master_public_key".to_string())),
        }
    }

    pub fn subscribed_feeds(&self) -> Vec<FeedId> {
        self.feeds
            .subscribed
            .iter()
            .map(|url| FeedId::new(url.trim()))
            .collect()
    }
}

pub fn load_config(path: &Path) -> Result<SyncdConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|_| ConfigError::Io)?;
    toml::from_str(&content).map_err(|_| ConfigError::Parse)
}
