use crate::error::SyncError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 20 * 60 * 1000;
pub const DEFAULT_FEED_POLL_TIMEOUT_MS: u64 = 30 * 1000;
pub const DEFAULT_PRIMARY_FETCH_TIMEOUT_MS: u64 = 60 * 1000;
pub const DEFAULT_DEDUP_CAPACITY: usize = 64 * 1024;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Failures are logged at debug level and dropped.
    #[default]
    Absorb,
    /// Failures are logged as warnings and published on the event bus.
    Surface,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DedupKeyMode {
    /// Two senders sharing a timestamp collide.
    #[default]
    TimestampOnly,
    SenderAndTimestamp,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DedupConfig {
    #[serde(default)]
    pub key_mode: DedupKeyMode,
    /// Zero keeps every key for the lifetime of the process.
    #[serde(default = "default_dedup_capacity")]
    pub capacity: usize,
    #[serde(default)]
    pub ttl_ms: Option<u64>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            key_mode: DedupKeyMode::TimestampOnly,
            capacity: default_dedup_capacity(),
            ttl_ms: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_feed_poll_timeout_ms")]
    pub feed_poll_timeout_ms: u64,
    /// Upper bound on the primary inbox fetch; zero waits indefinitely.
    #[serde(default = "default_primary_fetch_timeout_ms")]
    pub primary_fetch_timeout_ms: u64,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub dedup: DedupConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            feed_poll_timeout_ms: DEFAULT_FEED_POLL_TIMEOUT_MS,
            primary_fetch_timeout_ms: DEFAULT_PRIMARY_FETCH_TIMEOUT_MS,
            failure_policy: FailurePolicy::Absorb,
            dedup: DedupConfig::default(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_feed_poll_timeout_ms() -> u64 {
    DEFAULT_FEED_POLL_TIMEOUT_MS
}

fn default_primary_fetch_timeout_ms() -> u64 {
    DEFAULT_PRIMARY_FETCH_TIMEOUT_MS
}

fn default_dedup_capacity() -> usize {
    DEFAULT_DEDUP_CAPACITY
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.poll_interval_ms == 0 {
            return Err(SyncError::Config("poll_interval_ms".to_string()));
        }
        if self.dedup.ttl_ms == Some(0) {
            return Err(SyncError::Config("dedup.ttl_ms".to_string()));
        }
        Ok(())
    }
}
