pub mod dedup_tests;
pub mod feeds_tests;

use crate::config::SyncConfig;
use crate::contacts::{InMemoryContactStore, InMemoryDeviceLinks};
use crate::feeds::{InMemoryFeedRegistry, InMemoryFeedServer};
use crate::ids::{FeedId, PublicKey};
use crate::inbox::{CollectingPipeline, InMemorySwarm, RawMessage};
use crate::jobs::InMemoryJobQueue;
use crate::prefs::InMemoryPreferences;
use crate::time::{Clock, ManualClock};
use crate::{SyncCollaborators, SyncEngine};
use std::sync::Arc;

pub const LOCAL_KEY: &str = "05d1c0ffee00112233445566778899aabbccddeeff00112233445566778899aa01";
pub const LINKED_KEY: &str = "05d1c0ffee00112233445566778899aabbccddeeff00112233445566778899aa02";
pub const STRANGER_KEY: &str = "0500112233445566778899aabbccddeeff1234abcd";

pub const START_MS: u64 = 1_700_000_000_000;

pub fn key(value: &str) -> PublicKey {
    PublicKey::new(value)
}

pub fn feed(name: &str) -> FeedId {
    FeedId::new(format!("https://chat.example.org/{}", name))
}

pub fn raw(timestamp: u64, sender: &str) -> RawMessage {
    RawMessage {
        timestamp,
        sender: key(sender),
        bytes: format!("envelope-{}", timestamp).into_bytes(),
    }
}

#[derive(Clone)]
pub struct Harness {
    pub engine: SyncEngine,
    pub prefs: InMemoryPreferences,
    pub swarm: InMemorySwarm,
    pub registry: InMemoryFeedRegistry,
    pub server: InMemoryFeedServer,
    pub pipeline: CollectingPipeline,
    pub contacts: InMemoryContactStore,
    pub devices: InMemoryDeviceLinks,
    pub jobs: InMemoryJobQueue,
    pub clock: ManualClock,
}

pub async fn harness(config: SyncConfig, feeds: Vec<FeedId>) -> Harness {
    let clock = ManualClock::new(START_MS);
    harness_with_clock(config, feeds, clock.clone(), Arc::new(clock)).await
}

pub async fn harness_with_clock(
    config: SyncConfig,
    feeds: Vec<FeedId>,
    manual: ManualClock,
    clock: Arc<dyn Clock>,
) -> Harness {
    let prefs = InMemoryPreferences::new(key(LOCAL_KEY));
    let swarm = InMemorySwarm::new();
    let registry = InMemoryFeedRegistry::new(feeds);
    let server = InMemoryFeedServer::new();
    let pipeline = CollectingPipeline::new();
    let contacts = InMemoryContactStore::new();
    let devices = InMemoryDeviceLinks::new();
    devices.link(&[key(LOCAL_KEY), key(LINKED_KEY)]).await;
    let jobs = InMemoryJobQueue::new();
    let engine = SyncEngine::init(
        config,
        SyncCollaborators {
            prefs: Arc::new(prefs.clone()),
            swarm: Arc::new(swarm.clone()),
            feed_registry: Arc::new(registry.clone()),
            feed_client: Arc::new(server.clone()),
            pipeline: Arc::new(pipeline.clone()),
            contacts: Arc::new(contacts.clone()),
            devices: Arc::new(devices.clone()),
            jobs: Arc::new(jobs.clone()),
            clock,
        },
    )
    .await
    .expect("engine");
    Harness {
        engine,
        prefs,
        swarm,
        registry,
        server,
        pipeline,
        contacts,
        devices,
        jobs,
        clock: manual,
    }
}
