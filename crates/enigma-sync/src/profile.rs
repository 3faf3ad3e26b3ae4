use crate::contacts::{ContactStore, DeviceLinks, UnidentifiedAccessMode};
use crate::error::SyncError;
use crate::ids::PublicKey;
use crate::jobs::{Job, JobQueue};
use crate::prefs::Preferences;
use log::{debug, warn};
use std::sync::Arc;
use subtle::ConstantTimeEq;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisplayNameUpdate {
    Skipped,
    LocalProfile,
    Trusted(String),
    Suffixed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProfileKeyUpdate {
    Skipped,
    Unchanged,
    Updated { feed_refresh: bool },
}

/// Decides how a sender's self-declared name and profile key are recorded.
#[derive(Clone)]
pub struct ProfilePolicy {
    prefs: Arc<dyn Preferences>,
    contacts: Arc<dyn ContactStore>,
    devices: Arc<dyn DeviceLinks>,
    jobs: Arc<dyn JobQueue>,
}

impl ProfilePolicy {
    pub fn new(
        prefs: Arc<dyn Preferences>,
        contacts: Arc<dyn ContactStore>,
        devices: Arc<dyn DeviceLinks>,
        jobs: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            prefs,
            contacts,
            devices,
            jobs,
        }
    }

    pub async fn apply_display_name_update(
        &self,
        sender: &PublicKey,
        raw_display_name: Option<&str>,
    ) -> Result<DisplayNameUpdate, SyncError> {
        let Some(raw) = raw_display_name else {
            return Ok(DisplayNameUpdate::Skipped);
        };
        if raw.trim().is_empty() {
            return Ok(DisplayNameUpdate::Skipped);
        }
        let master = self.prefs.effective_master_key().await?;
        if *sender == master {
            self.prefs.set_profile_name(raw).await?;
            return Ok(DisplayNameUpdate::LocalProfile);
        }
        let local = self.prefs.local_public_key().await?;
        let linked = self.devices.linked_devices(&local).await?;
        if linked.contains(sender) {
            self.contacts.set_display_name(sender, raw).await?;
            return Ok(DisplayNameUpdate::Trusted(raw.to_string()));
        }
        // unrelated senders can pick colliding names
        let display_name = format!("{} (...{})", raw, sender.short_suffix());
        self.contacts.set_display_name(sender, &display_name).await?;
        Ok(DisplayNameUpdate::Suffixed(display_name))
    }

    pub async fn apply_profile_key_update(
        &self,
        sender: &PublicKey,
        candidate_key: Option<&[u8]>,
        sender_avatar_url: Option<&str>,
    ) -> Result<ProfileKeyUpdate, SyncError> {
        let Some(candidate) = candidate_key else {
            return Ok(ProfileKeyUpdate::Skipped);
        };
        let stored = self.contacts.profile_key(sender).await?;
        let unchanged = stored
            .as_deref()
            .map(|current| bool::from(current.ct_eq(candidate)))
            .unwrap_or(false);
        if unchanged {
            return Ok(ProfileKeyUpdate::Unchanged);
        }
        let master = self.prefs.effective_master_key().await?;
        self.contacts.set_profile_key(sender, candidate).await?;
        self.contacts
            .set_unidentified_access_mode(sender, UnidentifiedAccessMode::Unknown)
            .await?;
        debug!(
            "profile key for {} rotated to {}..",
            sender,
            hex::encode(&candidate[..candidate.len().min(4)])
        );
        self.enqueue(Job::RetrieveProfileAvatar {
            recipient: sender.clone(),
            url: sender_avatar_url.unwrap_or_default().to_string(),
        })
        .await;
        let feed_refresh = *sender == master;
        if feed_refresh {
            self.enqueue(Job::RefreshFeedProfilePictures).await;
        }
        Ok(ProfileKeyUpdate::Updated { feed_refresh })
    }

    async fn enqueue(&self, job: Job) {
        if let Err(err) = self.jobs.enqueue(job).await {
            warn!("profile job not queued: {}", err);
        }
    }
}
