use crate::error::SyncError;
use crate::ids::PublicKey;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

#[async_trait]
pub trait Preferences: Send + Sync {
    async fn background_poll_time(&self) -> Result<u64, SyncError>;
    async fn set_background_poll_time(&self, at_ms: u64) -> Result<(), SyncError>;
    async fn restoration_time(&self) -> Result<u64, SyncError>;
    async fn is_using_push(&self) -> Result<bool, SyncError>;
    async fn local_public_key(&self) -> Result<PublicKey, SyncError>;
    async fn master_public_key(&self) -> Result<Option<PublicKey>, SyncError>;
    async fn profile_name(&self) -> Result<Option<String>, SyncError>;
    async fn set_profile_name(&self, name: &str) -> Result<(), SyncError>;

    /// The device that owns profile metadata; this device when no master is set.
    async fn effective_master_key(&self) -> Result<PublicKey, SyncError> {
        match self.master_public_key().await? {
            Some(master) => Ok(master),
            None => self.local_public_key().await,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPreferences {
    #[serde(default)]
    pub background_poll_time: u64,
    #[serde(default)]
    pub restoration_time: u64,
    #[serde(default)]
    pub using_push: bool,
    #[serde(default)]
    pub local_public_key: Option<PublicKey>,
    #[serde(default)]
    pub master_public_key: Option<PublicKey>,
    #[serde(default)]
    pub profile_name: Option<String>,
}

impl StoredPreferences {
    fn local_key(&self) -> Result<PublicKey, SyncError> {
        self.local_public_key.clone().ok_or(SyncError::NotFound)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryPreferences {
    inner: Arc<Mutex<StoredPreferences>>,
}

impl InMemoryPreferences {
    pub fn new(local_public_key: PublicKey) -> Self {
        Self::from_stored(StoredPreferences {
            local_public_key: Some(local_public_key),
            ..StoredPreferences::default()
        })
    }

    pub fn from_stored(stored: StoredPreferences) -> Self {
        Self {
            inner: Arc::new(Mutex::new(stored)),
        }
    }

    pub async fn set_using_push(&self, using_push: bool) {
        self.inner.lock().await.using_push = using_push;
    }

    pub async fn set_master_public_key(&self, master: Option<PublicKey>) {
        self.inner.lock().await.master_public_key = master;
    }

    pub async fn set_restoration_time(&self, at_ms: u64) {
        self.inner.lock().await.restoration_time = at_ms;
    }
}

#[async_trait]
impl Preferences for InMemoryPreferences {
    async fn background_poll_time(&self) -> Result<u64, SyncError> {
        Ok(self.inner.lock().await.background_poll_time)
    }

    async fn set_background_poll_time(&self, at_ms: u64) -> Result<(), SyncError> {
        self.inner.lock().await.background_poll_time = at_ms;
        Ok(())
    }

    async fn restoration_time(&self) -> Result<u64, SyncError> {
        Ok(self.inner.lock().await.restoration_time)
    }

    async fn is_using_push(&self) -> Result<bool, SyncError> {
        Ok(self.inner.lock().await.using_push)
    }

    async fn local_public_key(&self) -> Result<PublicKey, SyncError> {
        self.inner.lock().await.local_key()
    }

    async fn master_public_key(&self) -> Result<Option<PublicKey>, SyncError> {
        Ok(self.inner.lock().await.master_public_key.clone())
    }

    async fn profile_name(&self) -> Result<Option<String>, SyncError> {
        Ok(self.inner.lock().await.profile_name.clone())
    }

    async fn set_profile_name(&self, name: &str) -> Result<(), SyncError> {
        self.inner.lock().await.profile_name = Some(name.to_string());
        Ok(())
    }
}

/// Preferences kept as a JSON document that survives process restarts.
pub struct FilePreferences {
    path: PathBuf,
    data: Mutex<StoredPreferences>,
}

impl FilePreferences {
    pub fn open_or_create(
        dir: impl AsRef<Path>,
        namespace: &str,
        defaults: StoredPreferences,
    ) -> Result<Self, SyncError> {
        let mut path = dir.as_ref().to_path_buf();
        fs::create_dir_all(&path).map_err(|_| SyncError::Storage)?;
        path.push(format!("{}-prefs.json", namespace));
        let data = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|_| SyncError::Storage)?;
            serde_json::from_str(&content).map_err(|_| SyncError::Storage)?
        } else {
            defaults
        };
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `change` and writes the document back before releasing the lock.
    pub async fn update<F>(&self, change: F) -> Result<(), SyncError>
    where
        F: FnOnce(&mut StoredPreferences) + Send,
    {
        let mut guard = self.data.lock().await;
        change(&mut guard);
        self.persist(&guard)
    }

    fn persist(&self, data: &StoredPreferences) -> Result<(), SyncError> {
        let serialized = serde_json::to_string_pretty(data).map_err(|_| SyncError::Storage)?;
        fs::write(&self.path, serialized).map_err(|_| SyncError::Storage)
    }
}

#[async_trait]
impl Preferences for FilePreferences {
    async fn background_poll_time(&self) -> Result<u64, SyncError> {
        Ok(self.data.lock().await.background_poll_time)
    }

    async fn set_background_poll_time(&self, at_ms: u64) -> Result<(), SyncError> {
        self.update(|prefs| prefs.background_poll_time = at_ms).await
    }

    async fn restoration_time(&self) -> Result<u64, SyncError> {
        Ok(self.data.lock().await.restoration_time)
    }

    async fn is_using_push(&self) -> Result<bool, SyncError> {
        Ok(self.data.lock().await.using_push)
    }

    async fn local_public_key(&self) -> Result<PublicKey, SyncError> {
        self.data.lock().await.local_key()
    }

    async fn master_public_key(&self) -> Result<Option<PublicKey>, SyncError> {
        Ok(self.data.lock().await.master_public_key.clone())
    }

    async fn profile_name(&self) -> Result<Option<String>, SyncError> {
        Ok(self.data.lock().await.profile_name.clone())
    }

    async fn set_profile_name(&self, name: &str) -> Result<(), SyncError> {
        let name = name.to_string();
        self.update(move |prefs| prefs.profile_name = Some(name)).await
    }
}
