use crate::event::{EventBus, SyncEvent};
use crate::poller::PollOrchestrator;
use crate::prefs::Preferences;
use crate::report::CycleReport;
use crate::time::Clock;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Scheduled time passed for the first-run fire; no poll cycle runs for it.
pub const BOOTSTRAP_TIME: u64 = 0;

/// Contract of a persistent alarm: the host asks for the next time, fires
/// the listener at (or after) it, and re-arms with whatever it returns.
#[async_trait]
pub trait AlarmListener: Send + Sync {
    async fn next_scheduled_execution_time(&self) -> u64;
    async fn on_alarm(&self, scheduled_time: u64) -> u64;
}

#[derive(Clone)]
pub struct AlarmScheduler {
    orchestrator: PollOrchestrator,
    prefs: Arc<dyn Preferences>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    poll_interval_ms: u64,
    cycle: Arc<Mutex<()>>,
    last_report: Arc<Mutex<Option<CycleReport>>>,
}

impl AlarmScheduler {
    pub fn new(
        orchestrator: PollOrchestrator,
        prefs: Arc<dyn Preferences>,
        clock: Arc<dyn Clock>,
        events: EventBus,
        poll_interval_ms: u64,
    ) -> Self {
        Self {
            orchestrator,
            prefs,
            clock,
            events,
            poll_interval_ms,
            cycle: Arc::new(Mutex::new(())),
            last_report: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn schedule(&self) -> u64 {
        self.on_alarm(BOOTSTRAP_TIME).await
    }

    pub async fn next_execution_time(&self) -> u64 {
        match self.prefs.background_poll_time().await {
            Ok(at_ms) => at_ms,
            Err(err) => {
                warn!("background poll time unreadable: {}", err);
                BOOTSTRAP_TIME
            }
        }
    }

    /// Runs a cycle for a real fire, then persists `now + interval`.
    ///
    /// The next time is anchored to the clock, not to `scheduled_time`, so a
    /// late wake-up shifts every later poll.
    pub async fn on_alarm(&self, scheduled_time: u64) -> u64 {
        let _cycle = self.cycle.lock().await;
        if scheduled_time == BOOTSTRAP_TIME {
            info!("bootstrap alarm, first poll in {} ms", self.poll_interval_ms);
            self.events.publish(SyncEvent::BootstrapScheduled);
        } else {
            let report = self.orchestrator.run_cycle().await;
            debug!(
                "poll cycle for {} done: {} feeds, {} failures",
                scheduled_time,
                report.feeds.len(),
                report.failures()
            );
            *self.last_report.lock().await = Some(report);
        }
        let next = self.clock.now_ms().saturating_add(self.poll_interval_ms);
        if let Err(err) = self.prefs.set_background_poll_time(next).await {
            warn!("background poll time not persisted: {}", err);
        }
        self.events.publish(SyncEvent::NextPollScheduled { at_ms: next });
        next
    }

    pub async fn last_report(&self) -> Option<CycleReport> {
        self.last_report.lock().await.clone()
    }

    pub fn orchestrator(&self) -> &PollOrchestrator {
        &self.orchestrator
    }
}

#[async_trait]
impl AlarmListener for AlarmScheduler {
    async fn next_scheduled_execution_time(&self) -> u64 {
        self.next_execution_time().await
    }

    async fn on_alarm(&self, scheduled_time: u64) -> u64 {
        AlarmScheduler::on_alarm(self, scheduled_time).await
    }
}
