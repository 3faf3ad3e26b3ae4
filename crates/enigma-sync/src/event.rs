use crate::ids::FeedId;
use tokio::sync::broadcast;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncEvent {
    BootstrapScheduled,
    PrimaryFetched { messages: usize },
    PrimaryFailed { reason: String },
    PrimaryCancelled,
    FeedPolled { feed: FeedId, messages: usize },
    FeedFailed { feed: FeedId, reason: String },
    FeedCancelled { feed: FeedId },
    NextPollScheduled { at_ms: u64 },
}

pub type EventReceiver = broadcast::Receiver<SyncEvent>;

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    pub fn new(size: usize) -> Self {
        let (tx, _) = broadcast::channel(size);
        Self { tx }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: SyncEvent) {
        let _ = self.tx.send(event);
    }
}
