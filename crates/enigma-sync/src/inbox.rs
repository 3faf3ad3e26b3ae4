use crate::error::SyncError;
use crate::ids::PublicKey;
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawMessage {
    pub timestamp: u64,
    pub sender: PublicKey,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait SwarmInbox: Send + Sync {
    /// Resolves the swarm for `local`; cheap once it has succeeded.
    async fn configure_if_needed(&self, local: &PublicKey) -> Result<(), SyncError>;
    async fn fetch_messages(&self, local: &PublicKey) -> Result<Vec<RawMessage>, SyncError>;
}

/// Decode/deliver entry point; takes ownership of one undecoded envelope.
#[async_trait]
pub trait DeliveryPipeline: Send + Sync {
    async fn process(&self, message: RawMessage) -> Result<(), SyncError>;
}

#[derive(Clone, Default)]
pub struct InMemorySwarm {
    entries: Arc<Mutex<HashMap<PublicKey, Vec<RawMessage>>>>,
    fail_configure: Arc<Mutex<usize>>,
    fail_fetch: Arc<Mutex<usize>>,
    fetches: Arc<Mutex<usize>>,
}

impl InMemorySwarm {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn deposit(&self, recipient: &PublicKey, message: RawMessage) {
        let mut guard = self.entries.lock().await;
        guard.entry(recipient.clone()).or_default().push(message);
    }

    pub async fn fail_configure_times(&self, count: usize) {
        *self.fail_configure.lock().await = count;
    }

    pub async fn fail_fetch_times(&self, count: usize) {
        *self.fail_fetch.lock().await = count;
    }

    pub async fn fetch_count(&self) -> usize {
        *self.fetches.lock().await
    }

    async fn consume_failure(budget: &Mutex<usize>) -> bool {
        let mut guard = budget.lock().await;
        if *guard > 0 {
            *guard -= 1;
            return true;
        }
        false
    }
}

#[async_trait]
impl SwarmInbox for InMemorySwarm {
    async fn configure_if_needed(&self, _local: &PublicKey) -> Result<(), SyncError> {
        if Self::consume_failure(&self.fail_configure).await {
            return Err(SyncError::Transport("swarm_unresolved".to_string()));
        }
        Ok(())
    }

    async fn fetch_messages(&self, local: &PublicKey) -> Result<Vec<RawMessage>, SyncError> {
        *self.fetches.lock().await += 1;
        if Self::consume_failure(&self.fail_fetch).await {
            return Err(SyncError::Transport("fetch".to_string()));
        }
        let mut guard = self.entries.lock().await;
        Ok(guard.remove(local).unwrap_or_default())
    }
}

#[derive(Clone, Default)]
pub struct CollectingPipeline {
    delivered: Arc<Mutex<Vec<RawMessage>>>,
}

impl CollectingPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn take(&self) -> Vec<RawMessage> {
        let mut guard = self.delivered.lock().await;
        std::mem::take(&mut *guard)
    }

    pub async fn len(&self) -> usize {
        self.delivered.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.delivered.lock().await.is_empty()
    }
}

#[async_trait]
impl DeliveryPipeline for CollectingPipeline {
    async fn process(&self, message: RawMessage) -> Result<(), SyncError> {
        self.delivered.lock().await.push(message);
        Ok(())
    }
}

/// Hands every message to `pipeline`; one bad envelope does not hold back the rest.
pub(crate) async fn deliver_all(
    pipeline: &Arc<dyn DeliveryPipeline>,
    source: &str,
    messages: Vec<RawMessage>,
) -> usize {
    let count = messages.len();
    for message in messages {
        let timestamp = message.timestamp;
        if let Err(err) = pipeline.process(message).await {
            debug!("{}: envelope {} not delivered: {}", source, timestamp, err);
        }
    }
    count
}
