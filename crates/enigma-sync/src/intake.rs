use crate::dedup::DedupCache;
use crate::ids::PublicKey;
use crate::notify::{AddressKind, ContentFlags, Eligibility};
use crate::profile::{DisplayNameUpdate, ProfileKeyUpdate, ProfilePolicy};
use log::{debug, warn};

/// Decoded fields of one envelope that admission decisions depend on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingEnvelope {
    pub timestamp: u64,
    pub sender: PublicKey,
    pub address_kind: AddressKind,
    pub display_name: Option<String>,
    pub profile_key: Option<Vec<u8>>,
    pub avatar_url: Option<String>,
    pub body: Option<String>,
    pub attachment_count: usize,
    pub link_preview_count: usize,
}

impl IncomingEnvelope {
    pub fn new(timestamp: u64, sender: PublicKey, address_kind: AddressKind) -> Self {
        Self {
            timestamp,
            sender,
            address_kind,
            display_name: None,
            profile_key: None,
            avatar_url: None,
            body: None,
            attachment_count: 0,
            link_preview_count: 0,
        }
    }

    pub fn content_flags(&self) -> ContentFlags {
        ContentFlags::from_parts(
            self.body.as_deref(),
            self.attachment_count,
            self.link_preview_count,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    Duplicate,
    Accepted(Eligibility),
}

#[derive(Clone)]
pub struct MessageIntake {
    dedup: DedupCache,
    profiles: ProfilePolicy,
}

impl MessageIntake {
    pub fn new(dedup: DedupCache, profiles: ProfilePolicy) -> Self {
        Self { dedup, profiles }
    }

    pub async fn admit(&self, envelope: &IncomingEnvelope) -> Admission {
        let sender = &envelope.sender;
        if self
            .dedup
            .should_ignore_message(envelope.timestamp, sender)
            .await
        {
            debug!("envelope {} from {} already seen", envelope.timestamp, sender);
            return Admission::Duplicate;
        }
        match self
            .profiles
            .apply_display_name_update(sender, envelope.display_name.as_deref())
            .await
        {
            Ok(DisplayNameUpdate::Skipped) => {}
            Ok(update) => debug!("display name from {}: {:?}", sender, update),
            Err(err) => warn!("display name from {} not applied: {}", sender, err),
        }
        match self
            .profiles
            .apply_profile_key_update(
                sender,
                envelope.profile_key.as_deref(),
                envelope.avatar_url.as_deref(),
            )
            .await
        {
            Ok(ProfileKeyUpdate::Updated { feed_refresh }) => {
                debug!("profile key from {} stored, feed refresh {}", sender, feed_refresh)
            }
            Ok(_) => {}
            Err(err) => warn!("profile key from {} not applied: {}", sender, err),
        }
        Admission::Accepted(Eligibility::evaluate(
            envelope.address_kind,
            envelope.content_flags(),
        ))
    }

    /// Forgets an envelope so a retry after a downstream failure is not
    /// treated as a duplicate.
    pub async fn release(&self, timestamp: u64, sender: &PublicKey) {
        self.dedup
            .drop_from_timestamp_cache_if_needed(timestamp, sender)
            .await;
    }

    pub fn should_error_message_show(&self, timestamp: u64) -> bool {
        self.dedup.should_error_message_show(timestamp)
    }

    pub fn dedup(&self) -> &DedupCache {
        &self.dedup
    }

    pub fn profiles(&self) -> &ProfilePolicy {
        &self.profiles
    }
}
