use crate::config::{FailurePolicy, SyncConfig};
use crate::error::SyncError;
use crate::event::{EventBus, SyncEvent};
use crate::feeds::{FeedClient, FeedPollers, FeedRegistry};
use crate::ids::{FeedId, PollTarget};
use crate::inbox::{deliver_all, DeliveryPipeline, RawMessage, SwarmInbox};
use crate::prefs::Preferences;
use crate::report::{CycleReport, UnitOutcome};
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Runs one poll cycle: the primary inbox (unless push is active) and every
/// subscribed group feed. Each unit is its own failure boundary.
#[derive(Clone)]
pub struct PollOrchestrator {
    prefs: Arc<dyn Preferences>,
    swarm: Arc<dyn SwarmInbox>,
    registry: Arc<dyn FeedRegistry>,
    pollers: FeedPollers,
    pipeline: Arc<dyn DeliveryPipeline>,
    events: EventBus,
    failure_policy: FailurePolicy,
    feed_poll_timeout: Option<Duration>,
    primary_fetch_timeout: Option<Duration>,
}

impl PollOrchestrator {
    pub fn new(
        config: &SyncConfig,
        prefs: Arc<dyn Preferences>,
        swarm: Arc<dyn SwarmInbox>,
        registry: Arc<dyn FeedRegistry>,
        feed_client: Arc<dyn FeedClient>,
        pipeline: Arc<dyn DeliveryPipeline>,
        events: EventBus,
    ) -> Self {
        let feed_poll_timeout = bound(config.feed_poll_timeout_ms);
        let primary_fetch_timeout = bound(config.primary_fetch_timeout_ms);
        Self {
            prefs,
            swarm,
            registry,
            pollers: FeedPollers::new(feed_client, pipeline.clone()),
            pipeline,
            events,
            failure_policy: config.failure_policy,
            feed_poll_timeout,
            primary_fetch_timeout,
        }
    }

    pub fn pollers(&self) -> &FeedPollers {
        &self.pollers
    }

    pub async fn run_cycle(&self) -> CycleReport {
        let deadline = self.primary_fetch_timeout.map(|limit| Instant::now() + limit);
        let primary = self.spawn_primary().await;
        let feeds = self.poll_feeds().await;
        let primary = match primary {
            None => UnitOutcome::Skipped,
            Some(handle) => join_primary(handle, deadline).await,
        };
        self.record(&PollTarget::Primary, &primary);
        CycleReport { primary, feeds }
    }

    async fn spawn_primary(&self) -> Option<JoinHandle<UnitOutcome>> {
        match self.prefs.is_using_push().await {
            Ok(true) => {
                debug!("push active, primary inbox not polled");
                return None;
            }
            Ok(false) => {}
            Err(err) => debug!("push flag unreadable, polling primary inbox: {}", err),
        }
        let prefs = self.prefs.clone();
        let swarm = self.swarm.clone();
        let pipeline = self.pipeline.clone();
        Some(tokio::spawn(async move {
            match fetch_primary(prefs.as_ref(), swarm.as_ref()).await {
                Ok(messages) => UnitOutcome::Completed {
                    messages: deliver_all(&pipeline, "primary", messages).await,
                },
                Err(err) => UnitOutcome::Failed(err.to_string()),
            }
        }))
    }

    async fn poll_feeds(&self) -> Vec<(FeedId, UnitOutcome)> {
        let feeds = match self.registry.subscribed_feeds().await {
            Ok(feeds) => feeds,
            Err(err) => {
                self.report_failure("feed registry", &err.to_string());
                return Vec::new();
            }
        };
        self.pollers.retain(&feeds).await;
        let mut outcomes = Vec::with_capacity(feeds.len());
        for feed in feeds {
            let outcome = self.poll_feed(&feed).await;
            self.record(&PollTarget::GroupFeed(feed.clone()), &outcome);
            outcomes.push((feed, outcome));
        }
        outcomes
    }

    async fn poll_feed(&self, feed: &FeedId) -> UnitOutcome {
        self.pollers.stop(feed).await;
        let mut handle = match self.pollers.poll_for_new_messages(feed).await {
            Ok(handle) => handle,
            Err(err) => return UnitOutcome::Failed(err.to_string()),
        };
        let joined = match self.feed_poll_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    self.pollers.stop(feed).await;
                    return UnitOutcome::Cancelled;
                }
            },
            None => (&mut handle).await,
        };
        match joined {
            Ok(outcome) => outcome,
            Err(err) => {
                self.pollers.stop(feed).await;
                UnitOutcome::Failed(format!("feed task: {}", err))
            }
        }
    }

    fn record(&self, target: &PollTarget, outcome: &UnitOutcome) {
        match (target, outcome) {
            (_, UnitOutcome::Skipped) => {}
            (_, UnitOutcome::Failed(reason)) => {
                self.report_failure(&target.to_string(), reason);
                match target {
                    PollTarget::Primary => self.publish_failure(SyncEvent::PrimaryFailed {
                        reason: reason.clone(),
                    }),
                    PollTarget::GroupFeed(feed) => self.publish_failure(SyncEvent::FeedFailed {
                        feed: feed.clone(),
                        reason: reason.clone(),
                    }),
                }
            }
            (PollTarget::Primary, UnitOutcome::Completed { messages }) => {
                debug!("primary inbox returned {} messages", messages);
                self.events.publish(SyncEvent::PrimaryFetched {
                    messages: *messages,
                });
            }
            (PollTarget::GroupFeed(feed), UnitOutcome::Completed { messages }) => {
                debug!("feed {} returned {} messages", feed, messages);
                self.events.publish(SyncEvent::FeedPolled {
                    feed: feed.clone(),
                    messages: *messages,
                });
            }
            (PollTarget::Primary, UnitOutcome::Cancelled) => {
                debug!("primary inbox fetch abandoned after timeout");
                self.events.publish(SyncEvent::PrimaryCancelled);
            }
            (PollTarget::GroupFeed(feed), UnitOutcome::Cancelled) => {
                debug!("feed {} poll cancelled", feed);
                self.events
                    .publish(SyncEvent::FeedCancelled { feed: feed.clone() });
            }
        }
    }

    fn report_failure(&self, unit: &str, reason: &str) {
        match self.failure_policy {
            FailurePolicy::Absorb => debug!("{} failed: {}", unit, reason),
            FailurePolicy::Surface => warn!("{} failed: {}", unit, reason),
        }
    }

    fn publish_failure(&self, event: SyncEvent) {
        if self.failure_policy == FailurePolicy::Surface {
            self.events.publish(event);
        }
    }
}

fn bound(ms: u64) -> Option<Duration> {
    match ms {
        0 => None,
        ms => Some(Duration::from_millis(ms)),
    }
}

/// Waits for the primary fetch until `deadline`, aborting it once that passes.
async fn join_primary(
    mut handle: JoinHandle<UnitOutcome>,
    deadline: Option<Instant>,
) -> UnitOutcome {
    let joined = match deadline {
        Some(deadline) => match tokio::time::timeout_at(deadline, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                handle.abort();
                return UnitOutcome::Cancelled;
            }
        },
        None => handle.await,
    };
    match joined {
        Ok(outcome) => outcome,
        Err(err) => UnitOutcome::Failed(format!("primary task: {}", err)),
    }
}

async fn fetch_primary(
    prefs: &dyn Preferences,
    swarm: &dyn SwarmInbox,
) -> Result<Vec<RawMessage>, SyncError> {
    let local = prefs.local_public_key().await?;
    swarm.configure_if_needed(&local).await?;
    swarm.fetch_messages(&local).await
}
