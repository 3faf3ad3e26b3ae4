pub mod alarm;
pub mod config;
pub mod contacts;
pub mod dedup;
pub mod driver;
pub mod error;
pub mod event;
pub mod feeds;
pub mod ids;
pub mod inbox;
pub mod intake;
pub mod jobs;
pub mod notify;
pub mod poller;
pub mod prefs;
pub mod profile;
pub mod report;
pub mod time;

use alarm::AlarmScheduler;
use config::SyncConfig;
use contacts::{ContactStore, DeviceLinks};
use dedup::DedupCache;
use driver::{AlarmDriver, DriverHandle};
use error::SyncError;
use event::{EventBus, EventReceiver};
use feeds::{FeedClient, FeedRegistry};
use inbox::{DeliveryPipeline, SwarmInbox};
use intake::MessageIntake;
use jobs::JobQueue;
use log::info;
use poller::PollOrchestrator;
use prefs::Preferences;
use profile::ProfilePolicy;
use std::sync::Arc;
use time::Clock;

/// External services the engine is wired against.
#[derive(Clone)]
pub struct SyncCollaborators {
    pub prefs: Arc<dyn Preferences>,
    pub swarm: Arc<dyn SwarmInbox>,
    pub feed_registry: Arc<dyn FeedRegistry>,
    pub feed_client: Arc<dyn FeedClient>,
    pub pipeline: Arc<dyn DeliveryPipeline>,
    pub contacts: Arc<dyn ContactStore>,
    pub devices: Arc<dyn DeviceLinks>,
    pub jobs: Arc<dyn JobQueue>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Clone)]
pub struct SyncEngine {
    config: SyncConfig,
    scheduler: AlarmScheduler,
    intake: MessageIntake,
    events: EventBus,
    clock: Arc<dyn Clock>,
}

impl SyncEngine {
    pub async fn init(config: SyncConfig, deps: SyncCollaborators) -> Result<Self, SyncError> {
        config.validate()?;
        let restoration_cutover = deps.prefs.restoration_time().await?;
        let events = EventBus::new(256);
        let orchestrator = PollOrchestrator::new(
            &config,
            deps.prefs.clone(),
            deps.swarm,
            deps.feed_registry,
            deps.feed_client,
            deps.pipeline,
            events.clone(),
        );
        let scheduler = AlarmScheduler::new(
            orchestrator,
            deps.prefs.clone(),
            deps.clock.clone(),
            events.clone(),
            config.poll_interval_ms,
        );
        let dedup = DedupCache::new(&config.dedup, restoration_cutover, deps.clock.clone());
        let profiles = ProfilePolicy::new(deps.prefs, deps.contacts, deps.devices, deps.jobs);
        info!(
            "sync engine ready: poll every {} ms, dedup {:?}",
            config.poll_interval_ms, config.dedup.key_mode
        );
        Ok(Self {
            config,
            scheduler,
            intake: MessageIntake::new(dedup, profiles),
            events,
            clock: deps.clock,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &AlarmScheduler {
        &self.scheduler
    }

    pub fn intake(&self) -> &MessageIntake {
        &self.intake
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    pub fn start_driver(&self) -> DriverHandle {
        AlarmDriver::new(Arc::new(self.scheduler.clone()), self.clock.clone()).start()
    }
}

#[cfg(test)]
mod tests;
