use crate::error::SyncError;
use crate::ids::PublicKey;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnidentifiedAccessMode {
    #[default]
    Unknown,
    Enabled,
    Disabled,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub display_name: Option<String>,
    pub profile_key: Option<Vec<u8>>,
    #[serde(default)]
    pub unidentified_access_mode: UnidentifiedAccessMode,
}

#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn profile(&self, contact: &PublicKey) -> Result<Option<ProfileRecord>, SyncError>;
    async fn set_display_name(&self, contact: &PublicKey, name: &str) -> Result<(), SyncError>;
    async fn set_profile_key(&self, contact: &PublicKey, key: &[u8]) -> Result<(), SyncError>;
    async fn set_unidentified_access_mode(
        &self,
        contact: &PublicKey,
        mode: UnidentifiedAccessMode,
    ) -> Result<(), SyncError>;

    async fn profile_key(&self, contact: &PublicKey) -> Result<Option<Vec<u8>>, SyncError> {
        Ok(self.profile(contact).await?.and_then(|p| p.profile_key))
    }
}

#[async_trait]
pub trait DeviceLinks: Send + Sync {
    /// Every device of the account that owns `local`, master included.
    async fn linked_devices(&self, local: &PublicKey) -> Result<HashSet<PublicKey>, SyncError>;
}

#[derive(Clone, Default)]
pub struct InMemoryContactStore {
    records: Arc<Mutex<HashMap<PublicKey, ProfileRecord>>>,
    writes: Arc<Mutex<usize>>,
}

impl InMemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, contact: PublicKey, record: ProfileRecord) {
        self.records.lock().await.insert(contact, record);
    }

    pub async fn write_count(&self) -> usize {
        *self.writes.lock().await
    }

    async fn modify<F: FnOnce(&mut ProfileRecord)>(&self, contact: &PublicKey, change: F) {
        let mut records = self.records.lock().await;
        change(records.entry(contact.clone()).or_default());
        *self.writes.lock().await += 1;
    }
}

#[async_trait]
impl ContactStore for InMemoryContactStore {
    async fn profile(&self, contact: &PublicKey) -> Result<Option<ProfileRecord>, SyncError> {
        Ok(self.records.lock().await.get(contact).cloned())
    }

    async fn set_display_name(&self, contact: &PublicKey, name: &str) -> Result<(), SyncError> {
        self.modify(contact, |record| record.display_name = Some(name.to_string())).await;
        Ok(())
    }

    async fn set_profile_key(&self, contact: &PublicKey, key: &[u8]) -> Result<(), SyncError> {
        self.modify(contact, |record| record.profile_key = Some(key.to_vec())).await;
        Ok(())
    }

    async fn set_unidentified_access_mode(
        &self,
        contact: &PublicKey,
        mode: UnidentifiedAccessMode,
    ) -> Result<(), SyncError> {
        self.modify(contact, |record| record.unidentified_access_mode = mode).await;
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryDeviceLinks {
    accounts: Arc<Mutex<HashMap<PublicKey, HashSet<PublicKey>>>>,
}

impl InMemoryDeviceLinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `devices` as one account; every member resolves to the full set.
    pub async fn link(&self, devices: &[PublicKey]) {
        let set: HashSet<PublicKey> = devices.iter().cloned().collect();
        let mut accounts = self.accounts.lock().await;
        for device in devices {
            accounts.insert(device.clone(), set.clone());
        }
    }
}

#[async_trait]
impl DeviceLinks for InMemoryDeviceLinks {
    async fn linked_devices(&self, local: &PublicKey) -> Result<HashSet<PublicKey>, SyncError> {
        let accounts = self.accounts.lock().await;
        Ok(accounts
            .get(local)
            .cloned()
            .unwrap_or_else(|| HashSet::from([local.clone()])))
    }
}
