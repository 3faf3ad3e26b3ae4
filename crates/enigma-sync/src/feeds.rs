//! Group-feed pollers.
//!
//! Each feed runs a small state machine: `Idle -> Polling -> (Stopped |
//! Completed) -> Idle`. The `Polling` state owns a cancellation token that
//! covers both the fetch and delivery of its messages, so a stopped run does
//! no further work. Runs carry a ticket; a run that was stopped can
//! never overwrite the slot of the run that replaced it.

use crate::error::SyncError;
use crate::ids::FeedId;
use crate::inbox::{deliver_all, DeliveryPipeline, RawMessage};
use crate::report::UnitOutcome;
use async_trait::async_trait;
use log::debug;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

#[async_trait]
pub trait FeedRegistry: Send + Sync {
    async fn subscribed_feeds(&self) -> Result<Vec<FeedId>, SyncError>;
}

#[async_trait]
pub trait FeedClient: Send + Sync {
    async fn poll_for_new_messages(&self, feed: &FeedId) -> Result<Vec<RawMessage>, SyncError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedPollState {
    Idle,
    Polling,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeedPollerStats {
    pub started: u64,
    pub stop_requests: u64,
    pub cancelled_in_flight: u64,
    pub completed: u64,
}

struct ActivePoll {
    ticket: Uuid,
    cancel: watch::Sender<bool>,
}

#[derive(Default)]
struct FeedSlot {
    active: Option<ActivePoll>,
    last: Option<UnitOutcome>,
}

#[derive(Default)]
struct Slots {
    feeds: HashMap<FeedId, FeedSlot>,
    stats: FeedPollerStats,
}

#[derive(Clone)]
pub struct FeedPollers {
    client: Arc<dyn FeedClient>,
    pipeline: Arc<dyn DeliveryPipeline>,
    slots: Arc<Mutex<Slots>>,
}

impl FeedPollers {
    pub fn new(client: Arc<dyn FeedClient>, pipeline: Arc<dyn DeliveryPipeline>) -> Self {
        Self {
            client,
            pipeline,
            slots: Arc::new(Mutex::new(Slots::default())),
        }
    }

    /// Cancels the in-flight poll for `feed`, if there is one.
    pub async fn stop(&self, feed: &FeedId) {
        let mut slots = self.slots.lock().await;
        slots.stats.stop_requests += 1;
        let taken = slots
            .feeds
            .get_mut(feed)
            .and_then(|slot| slot.active.take());
        if let Some(active) = taken {
            let _ = active.cancel.send(true);
            slots.stats.cancelled_in_flight += 1;
            if let Some(slot) = slots.feeds.get_mut(feed) {
                slot.last = Some(UnitOutcome::Cancelled);
            }
            debug!("feed {} poll {} cancelled", feed, active.ticket);
        }
    }

    /// Starts a poll for `feed`. The feed must be idle; call [`stop`] first.
    ///
    /// [`stop`]: FeedPollers::stop
    pub async fn poll_for_new_messages(
        &self,
        feed: &FeedId,
    ) -> Result<JoinHandle<UnitOutcome>, SyncError> {
        let ticket = Uuid::new_v4();
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        {
            let mut slots = self.slots.lock().await;
            let slot = slots.feeds.entry(feed.clone()).or_default();
            if slot.active.is_some() {
                return Err(SyncError::Feed(format!("{} already polling", feed)));
            }
            slot.active = Some(ActivePoll {
                ticket,
                cancel: cancel_tx,
            });
            slots.stats.started += 1;
        }
        let client = self.client.clone();
        let pipeline = self.pipeline.clone();
        let slots = self.slots.clone();
        let feed = feed.clone();
        Ok(tokio::spawn(async move {
            let outcome = tokio::select! {
                outcome = poll_and_deliver(client.as_ref(), &pipeline, &feed) => outcome,
                _ = cancelled(&mut cancel_rx) => UnitOutcome::Cancelled,
            };
            finish(&slots, &feed, ticket, &outcome).await;
            outcome
        }))
    }

    /// Forgets idle feeds that are no longer in `feeds`.
    pub async fn retain(&self, feeds: &[FeedId]) {
        let mut slots = self.slots.lock().await;
        slots
            .feeds
            .retain(|feed, slot| slot.active.is_some() || feeds.contains(feed));
    }

    pub async fn tracked(&self) -> usize {
        self.slots.lock().await.feeds.len()
    }

    pub async fn state(&self, feed: &FeedId) -> FeedPollState {
        let slots = self.slots.lock().await;
        match slots.feeds.get(feed).and_then(|slot| slot.active.as_ref()) {
            Some(_) => FeedPollState::Polling,
            None => FeedPollState::Idle,
        }
    }

    pub async fn last_outcome(&self, feed: &FeedId) -> Option<UnitOutcome> {
        let slots = self.slots.lock().await;
        slots.feeds.get(feed).and_then(|slot| slot.last.clone())
    }

    pub async fn stats(&self) -> FeedPollerStats {
        self.slots.lock().await.stats
    }
}

async fn poll_and_deliver(
    client: &dyn FeedClient,
    pipeline: &Arc<dyn DeliveryPipeline>,
    feed: &FeedId,
) -> UnitOutcome {
    match client.poll_for_new_messages(feed).await {
        Ok(messages) => {
            let source = format!("feed {}", feed);
            UnitOutcome::Completed {
                messages: deliver_all(pipeline, &source, messages).await,
            }
        }
        Err(err) => UnitOutcome::Failed(err.to_string()),
    }
}

async fn cancelled(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn finish(slots: &Mutex<Slots>, feed: &FeedId, ticket: Uuid, outcome: &UnitOutcome) {
    let mut guard = slots.lock().await;
    let Some(slot) = guard.feeds.get_mut(feed) else {
        return;
    };
    let current = slot.active.as_ref().map(|active| active.ticket);
    if current != Some(ticket) {
        return;
    }
    slot.active = None;
    slot.last = Some(outcome.clone());
    guard.stats.completed += 1;
}

#[derive(Clone, Default)]
pub struct InMemoryFeedRegistry {
    feeds: Arc<Mutex<Vec<FeedId>>>,
    fail_reads: Arc<Mutex<usize>>,
}

impl InMemoryFeedRegistry {
    pub fn new(feeds: Vec<FeedId>) -> Self {
        Self {
            feeds: Arc::new(Mutex::new(feeds)),
            fail_reads: Arc::new(Mutex::new(0)),
        }
    }

    pub async fn subscribe(&self, feed: FeedId) {
        let mut guard = self.feeds.lock().await;
        if !guard.contains(&feed) {
            guard.push(feed);
        }
    }

    pub async fn unsubscribe(&self, feed: &FeedId) {
        self.feeds.lock().await.retain(|f| f != feed);
    }

    pub async fn fail_reads_times(&self, count: usize) {
        *self.fail_reads.lock().await = count;
    }
}

#[async_trait]
impl FeedRegistry for InMemoryFeedRegistry {
    async fn subscribed_feeds(&self) -> Result<Vec<FeedId>, SyncError> {
        let mut fail = self.fail_reads.lock().await;
        if *fail > 0 {
            *fail -= 1;
            return Err(SyncError::Feed("registry_unavailable".to_string()));
        }
        Ok(self.feeds.lock().await.clone())
    }
}

/// Feed server stand-in with per-feed backlog, failures and latency.
#[derive(Clone, Default)]
pub struct InMemoryFeedServer {
    backlog: Arc<Mutex<HashMap<FeedId, Vec<RawMessage>>>>,
    failing: Arc<Mutex<HashSet<FeedId>>>,
    latency: Arc<Mutex<HashMap<FeedId, Duration>>>,
    polls: Arc<Mutex<HashMap<FeedId, usize>>>,
}

impl InMemoryFeedServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn post(&self, feed: &FeedId, message: RawMessage) {
        let mut guard = self.backlog.lock().await;
        guard.entry(feed.clone()).or_default().push(message);
    }

    pub async fn set_failing(&self, feed: &FeedId, failing: bool) {
        let mut guard = self.failing.lock().await;
        if failing {
            guard.insert(feed.clone());
        } else {
            guard.remove(feed);
        }
    }

    pub async fn set_latency(&self, feed: &FeedId, latency: Duration) {
        self.latency.lock().await.insert(feed.clone(), latency);
    }

    pub async fn poll_count(&self, feed: &FeedId) -> usize {
        self.polls.lock().await.get(feed).copied().unwrap_or(0)
    }
}

#[async_trait]
impl FeedClient for InMemoryFeedServer {
    async fn poll_for_new_messages(&self, feed: &FeedId) -> Result<Vec<RawMessage>, SyncError> {
        *self.polls.lock().await.entry(feed.clone()).or_default() += 1;
        let latency = self.latency.lock().await.get(feed).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing.lock().await.contains(feed) {
            return Err(SyncError::Feed(format!("{} unreachable", feed)));
        }
        let mut guard = self.backlog.lock().await;
        Ok(guard.remove(feed).unwrap_or_default())
    }
}
