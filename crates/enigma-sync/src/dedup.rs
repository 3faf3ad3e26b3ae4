use crate::config::{DedupConfig, DedupKeyMode};
use crate::ids::PublicKey;
use crate::time::Clock;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct SeenKey {
    sender: Option<PublicKey>,
    timestamp: u64,
}

/// Seen-set for envelope timestamps plus the restore cutover used to gate
/// error display.
///
/// In `TimestampOnly` mode the sender is not part of the key, so two senders
/// that emit the same timestamp deduplicate against each other.
#[derive(Clone)]
pub struct DedupCache {
    seen: Arc<Mutex<LruCache<SeenKey, u64>>>,
    key_mode: DedupKeyMode,
    ttl_ms: Option<u64>,
    restoration_cutover: u64,
    clock: Arc<dyn Clock>,
}

impl DedupCache {
    pub fn new(config: &DedupConfig, restoration_cutover: u64, clock: Arc<dyn Clock>) -> Self {
        let seen = match NonZeroUsize::new(config.capacity) {
            Some(capacity) => LruCache::new(capacity),
            None => LruCache::unbounded(),
        };
        Self {
            seen: Arc::new(Mutex::new(seen)),
            key_mode: config.key_mode,
            ttl_ms: config.ttl_ms,
            restoration_cutover,
            clock,
        }
    }

    /// Reports whether the envelope was already seen and records it if not.
    ///
    /// The TTL runs from the first sighting; repeats do not extend it.
    pub async fn should_ignore_message(&self, timestamp: u64, sender: &PublicKey) -> bool {
        let key = self.key(timestamp, sender);
        let now = self.clock.now_ms();
        let mut seen = self.seen.lock().await;
        let first_seen = seen.get(&key).copied();
        match (first_seen, self.ttl_ms) {
            (Some(_), None) => true,
            (Some(first), Some(ttl)) if now.saturating_sub(first) < ttl => true,
            _ => {
                seen.put(key, now);
                false
            }
        }
    }

    pub async fn drop_from_timestamp_cache_if_needed(&self, timestamp: u64, sender: &PublicKey) {
        let key = self.key(timestamp, sender);
        self.seen.lock().await.pop(&key);
    }

    pub fn should_error_message_show(&self, timestamp: u64) -> bool {
        timestamp > self.restoration_cutover
    }

    pub fn restoration_cutover(&self) -> u64 {
        self.restoration_cutover
    }

    pub async fn len(&self) -> usize {
        self.seen.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.seen.lock().await.is_empty()
    }

    fn key(&self, timestamp: u64, sender: &PublicKey) -> SeenKey {
        let sender = match self.key_mode {
            DedupKeyMode::TimestampOnly => None,
            DedupKeyMode::SenderAndTimestamp => Some(sender.clone()),
        };
        SeenKey { sender, timestamp }
    }
}
