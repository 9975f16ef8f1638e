use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which kind of source content a worker polls. Closed set: adding a class
/// means adding a variant (and a ledger table), not passing a new string.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ContentClass {
    Media,
    Story,
}

impl ContentClass {
    /// Ledger table for this class.
    pub fn table(&self) -> &'static str {
        match self {
            ContentClass::Media => "media",
            ContentClass::Story => "stories",
        }
    }

    /// API field polled on the source account node.
    pub fn api_field(&self) -> &'static str {
        match self {
            ContentClass::Media => "media",
            ContentClass::Story => "stories",
        }
    }

    /// Directory the staged bytes land under in the blob store.
    pub fn storage_dir(&self) -> &'static str {
        match self {
            ContentClass::Media => "posts",
            ContentClass::Story => "stories",
        }
    }

    /// Listing limit applied when the config leaves it unset.
    pub fn default_limit(&self) -> usize {
        match self {
            ContentClass::Media => 3,
            ContentClass::Story => 5,
        }
    }
}

/// How the destination receives an item: as a feed post or as a story.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WorkerRole {
    Post,
    Story,
}

impl WorkerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerRole::Post => "post",
            WorkerRole::Story => "story",
        }
    }
}

/// Publishing target. Each destination owns one synced column in the ledger,
/// so a record tracks delivery to every destination independently.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Destination {
    Vk,
    Telegram,
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Vk => "vk",
            Destination::Telegram => "tg",
        }
    }

    /// Ledger column holding this destination's synced flag.
    pub fn synced_column(&self) -> &'static str {
        match self {
            Destination::Vk => "synced_vk",
            Destination::Telegram => "synced_tg",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown media kind '{0}'")]
pub struct UnknownMediaKind(pub String);

/// Closed media-kind tag. The source reports a free-form `media_type`
/// string; anything other than the two recognized values is an error, not
/// a silent video fallthrough.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn parse(raw: &str) -> Result<Self, UnknownMediaKind> {
        match raw {
            "IMAGE" => Ok(MediaKind::Image),
            "VIDEO" => Ok(MediaKind::Video),
            other => Err(UnknownMediaKind(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

/// Transient per-run detail for one item. Never persisted; re-fetched on
/// every pipeline run for the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDetail {
    pub id: String,
    pub media_url: String,
    pub caption: String,
    pub kind: MediaKind,
    pub permalink: String,
}

/// Terminal result of a successful pipeline run for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Item went through the full transfer and was committed to the ledger.
    Published,
    /// Gate check found the item already synced for this destination.
    Skipped,
}
