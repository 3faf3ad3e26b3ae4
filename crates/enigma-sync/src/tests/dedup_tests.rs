use super::{key, LINKED_KEY, STRANGER_KEY};
use crate::config::{DedupConfig, DedupKeyMode};
use crate::dedup::DedupCache;
use crate::time::ManualClock;
use std::sync::Arc;

fn cache(config: DedupConfig) -> (DedupCache, ManualClock) {
    let clock = ManualClock::new(10_000);
    (DedupCache::new(&config, 100, Arc::new(clock.clone())), clock)
}

#[tokio::test]
async fn first_sighting_passes_then_every_repeat_is_ignored() {
    let (cache, _) = cache(DedupConfig::default());
    let sender = key(STRANGER_KEY);
    assert!(!cache.should_ignore_message(42, &sender).await);
    assert!(cache.should_ignore_message(42, &sender).await);
    assert!(cache.should_ignore_message(42, &sender).await);
    assert!(!cache.should_ignore_message(43, &sender).await);
}

#[tokio::test]
async fn dropped_timestamp_is_forgotten() {
    let (cache, _) = cache(DedupConfig::default());
    let sender = key(STRANGER_KEY);
    assert!(!cache.should_ignore_message(7, &sender).await);
    cache.drop_from_timestamp_cache_if_needed(7, &sender).await;
    assert!(!cache.should_ignore_message(7, &sender).await);
    assert!(cache.should_ignore_message(7, &sender).await);
}

#[tokio::test]
async fn dropping_unknown_timestamp_is_a_noop() {
    let (cache, _) = cache(DedupConfig::default());
    let sender = key(STRANGER_KEY);
    assert!(!cache.should_ignore_message(1, &sender).await);
    cache.drop_from_timestamp_cache_if_needed(99, &sender).await;
    assert_eq!(cache.len().await, 1);
    assert!(cache.should_ignore_message(1, &sender).await);
}

#[tokio::test]
async fn timestamp_only_keys_collide_across_senders() {
    let (cache, _) = cache(DedupConfig::default());
    assert!(!cache.should_ignore_message(500, &key(STRANGER_KEY)).await);
    assert!(cache.should_ignore_message(500, &key(LINKED_KEY)).await);
}

#[tokio::test]
async fn sender_keyed_mode_separates_senders() {
    let (cache, _) = cache(DedupConfig {
        key_mode: DedupKeyMode::SenderAndTimestamp,
        ..DedupConfig::default()
    });
    assert!(!cache.should_ignore_message(500, &key(STRANGER_KEY)).await);
    assert!(!cache.should_ignore_message(500, &key(LINKED_KEY)).await);
    assert!(cache.should_ignore_message(500, &key(LINKED_KEY)).await);
}

#[tokio::test]
async fn capacity_evicts_least_recently_seen() {
    let (cache, _) = cache(DedupConfig {
        capacity: 2,
        ..DedupConfig::default()
    });
    let sender = key(STRANGER_KEY);
    assert!(!cache.should_ignore_message(1, &sender).await);
    assert!(!cache.should_ignore_message(2, &sender).await);
    assert!(cache.should_ignore_message(1, &sender).await);
    assert!(!cache.should_ignore_message(3, &sender).await);
    assert_eq!(cache.len().await, 2);
    assert!(!cache.should_ignore_message(2, &sender).await);
}

#[tokio::test]
async fn zero_capacity_keeps_everything() {
    let (cache, _) = cache(DedupConfig {
        capacity: 0,
        ..DedupConfig::default()
    });
    let sender = key(STRANGER_KEY);
    for ts in 0..500u64 {
        assert!(!cache.should_ignore_message(ts, &sender).await);
    }
    assert_eq!(cache.len().await, 500);
    assert!(cache.should_ignore_message(0, &sender).await);
}

#[tokio::test]
async fn ttl_expires_old_sightings() {
    let (cache, clock) = cache(DedupConfig {
        ttl_ms: Some(1_000),
        ..DedupConfig::default()
    });
    let sender = key(STRANGER_KEY);
    assert!(!cache.should_ignore_message(9, &sender).await);
    clock.advance(999);
    assert!(cache.should_ignore_message(9, &sender).await);
    clock.advance(1_000);
    assert!(!cache.should_ignore_message(9, &sender).await);
}

#[tokio::test]
async fn repeats_do_not_extend_ttl() {
    let (cache, clock) = cache(DedupConfig {
        ttl_ms: Some(100),
        ..DedupConfig::default()
    });
    let sender = key(STRANGER_KEY);
    assert!(!cache.should_ignore_message(5, &sender).await);
    for _ in 0..3 {
        clock.advance(30);
        assert!(cache.should_ignore_message(5, &sender).await);
    }
    clock.advance(10);
    assert!(!cache.should_ignore_message(5, &sender).await);
    clock.advance(99);
    assert!(cache.should_ignore_message(5, &sender).await);
}

#[tokio::test]
async fn errors_show_only_after_restoration_cutover() {
    let (cache, _) = cache(DedupConfig::default());
    assert_eq!(cache.restoration_cutover(), 100);
    assert!(cache.should_error_message_show(101));
    assert!(!cache.should_error_message_show(100));
    assert!(!cache.should_error_message_show(99));
}
