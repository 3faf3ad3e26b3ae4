use crate::error::SyncError;
use crate::ids::PublicKey;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Job {
    RetrieveProfileAvatar { recipient: PublicKey, url: String },
    RefreshFeedProfilePictures,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuedJob {
    pub id: Uuid,
    pub job: Job,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: Job) -> Result<Uuid, SyncError>;
}

#[derive(Clone, Default)]
pub struct InMemoryJobQueue {
    jobs: Arc<Mutex<Vec<QueuedJob>>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn take_all(&self) -> Vec<QueuedJob> {
        let mut guard = self.jobs.lock().await;
        std::mem::take(&mut *guard)
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: Job) -> Result<Uuid, SyncError> {
        let id = Uuid::new_v4();
        self.jobs.lock().await.push(QueuedJob { id, job });
        Ok(id)
    }
}
