//! Receipt, typing and reply gating per address kind.
//!
//! Callers pass the classification of the recipient's master-device address;
//! a linked device's address can classify differently.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressKind {
    Direct,
    Group,
    BroadcastFeed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContentFlags {
    pub has_body: bool,
    pub has_attachment: bool,
    pub has_link_preview: bool,
}

impl ContentFlags {
    pub fn from_parts(body: Option<&str>, attachments: usize, link_previews: usize) -> Self {
        Self {
            has_body: body.map(|b| !b.is_empty()).unwrap_or(false),
            has_attachment: attachments > 0,
            has_link_preview: link_previews > 0,
        }
    }

    pub fn any(&self) -> bool {
        self.has_body || self.has_attachment || self.has_link_preview
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Eligibility {
    pub can_reply: bool,
    pub delivery_receipt: bool,
    pub read_receipt: bool,
    pub typing_indicator: bool,
}

impl Eligibility {
    pub fn evaluate(kind: AddressKind, flags: ContentFlags) -> Self {
        Self {
            can_reply: can_reply_to_notification(kind),
            delivery_receipt: should_send_delivery_receipt(
                kind,
                flags.has_body,
                flags.has_attachment,
                flags.has_link_preview,
            ),
            read_receipt: should_send_read_receipt(kind),
            typing_indicator: should_send_typing_indicator(kind),
        }
    }
}

pub fn can_reply_to_notification(kind: AddressKind) -> bool {
    kind != AddressKind::BroadcastFeed
}

pub fn should_send_delivery_receipt(
    kind: AddressKind,
    has_body: bool,
    has_attachment: bool,
    has_link_preview: bool,
) -> bool {
    if kind == AddressKind::Group {
        return false;
    }
    has_body || has_attachment || has_link_preview
}

pub fn should_send_read_receipt(kind: AddressKind) -> bool {
    kind != AddressKind::Group
}

pub fn should_send_typing_indicator(kind: AddressKind) -> bool {
    kind != AddressKind::Group
}
