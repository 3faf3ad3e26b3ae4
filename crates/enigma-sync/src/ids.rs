use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

const SUFFIX_CHARS: usize = 8;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PublicKey {
    value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedId {
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PollTarget {
    Primary,
    GroupFeed(FeedId),
}

impl PublicKey {
    /// Keys compare case-insensitively, so the stored form is lowercase.
    pub fn new(value: impl AsRef<str>) -> Self {
        Self {
            value: value.as_ref().trim().to_ascii_lowercase(),
        }
    }

    pub fn from_hex(hex_str: &str) -> Option<Self> {
        let trimmed = hex_str.trim();
        if trimmed.is_empty() {
            return None;
        }
        hex::decode(trimmed).ok()?;
        Some(Self::new(trimmed))
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn short_suffix(&self) -> &str {
        match self.value.char_indices().rev().nth(SUFFIX_CHARS - 1) {
            Some((idx, _)) => &self.value[idx..],
            None => &self.value,
        }
    }
}

impl From<String> for PublicKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<PublicKey> for String {
    fn from(key: PublicKey) -> Self {
        key.value
    }
}

impl Display for PublicKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl FeedId {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl Display for FeedId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl Display for PollTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PollTarget::Primary => write!(f, "primary"),
            PollTarget::GroupFeed(feed) => write!(f, "feed:{}", feed),
        }
    }
}
