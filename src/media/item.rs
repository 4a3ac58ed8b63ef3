//! Content item representation.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// Kind of content an item holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Video,
    ImageSet,
    Audio,
    Live,
}

impl ItemKind {
    /// Roles that must all be written for the item to count as downloaded.
    pub fn required_roles(&self) -> &'static [MediaRole] {
        match self {
            ItemKind::Video => &[MediaRole::Video],
            ItemKind::ImageSet => &[MediaRole::Image],
            ItemKind::Audio => &[MediaRole::Music],
            ItemKind::Live => &[MediaRole::Cover],
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ItemKind::Video => "video",
            ItemKind::ImageSet => "images",
            ItemKind::Audio => "audio",
            ItemKind::Live => "live",
        };
        f.write_str(name)
    }
}

/// What a single media file is to its item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MediaRole {
    Video,
    Image,
    Cover,
    Avatar,
    Music,
    /// The metadata sidecar. Written from the item's metadata, never fetched.
    Json,
}

impl MediaRole {
    /// Filename suffix placed after the item folder name.
    pub fn suffix(&self) -> &'static str {
        match self {
            MediaRole::Video => "",
            MediaRole::Image => "_image",
            MediaRole::Cover => "_cover",
            MediaRole::Avatar => "_avatar",
            MediaRole::Music => "_music",
            MediaRole::Json => "_data",
        }
    }

    /// Extension used when the URL does not reveal one.
    pub fn default_extension(&self) -> &'static str {
        match self {
            MediaRole::Video => "mp4",
            MediaRole::Music => "mp3",
            MediaRole::Json => "json",
            MediaRole::Image | MediaRole::Cover | MediaRole::Avatar => "jpeg",
        }
    }

    /// Whether the extension may be taken from the URL path.
    pub fn is_picture(&self) -> bool {
        matches!(self, MediaRole::Image | MediaRole::Cover | MediaRole::Avatar)
    }
}

impl fmt::Display for MediaRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaRole::Video => "video",
            MediaRole::Image => "image",
            MediaRole::Cover => "cover",
            MediaRole::Avatar => "avatar",
            MediaRole::Music => "music",
            MediaRole::Json => "json",
        };
        f.write_str(name)
    }
}

/// One downloadable file of an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAsset {
    pub role: MediaRole,

    /// 1-based position for image-set pictures.
    pub index: Option<u32>,

    /// Candidate URLs, best first. Later entries are fallbacks.
    pub urls: Vec<String>,
}

impl MediaAsset {
    pub fn new(role: MediaRole, urls: Vec<String>) -> Self {
        Self {
            role,
            index: None,
            urls,
        }
    }

    pub fn image(index: u32, urls: Vec<String>) -> Self {
        Self {
            role: MediaRole::Image,
            index: Some(index),
            urls,
        }
    }

    pub fn primary_url(&self) -> Option<&str> {
        self.urls.first().map(String::as_str)
    }

    /// Human label such as `image 3` or `cover`.
    pub fn label(&self) -> String {
        match self.index {
            Some(i) => format!("{} {}", self.role, i),
            None => self.role.to_string(),
        }
    }
}

/// A normalized, fetchable item.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentItem {
    /// Platform item ID. Unique within a target's result set.
    pub item_id: String,

    pub kind: ItemKind,

    /// Caption or room title.
    pub title: String,

    /// Author nickname.
    pub author: String,

    /// Creation time as a unix timestamp in seconds.
    pub created_at: i64,

    /// Media files in download order.
    pub assets: Vec<MediaAsset>,

    /// Everything written to the JSON sidecar.
    pub metadata: BTreeMap<String, Value>,
}

impl ContentItem {
    /// Creation time, if the timestamp is representable.
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.created_at, 0).single()
    }

    /// Assets playing `role`.
    pub fn assets_with_role(&self, role: MediaRole) -> impl Iterator<Item = &MediaAsset> {
        self.assets.iter().filter(move |a| a.role == role)
    }

    /// Whether `asset` is needed for the item to count as downloaded.
    pub fn is_required(&self, asset: &MediaAsset) -> bool {
        self.kind.required_roles().contains(&asset.role)
    }
}

/// An item as produced by the resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedItem {
    pub item: ContentItem,

    /// The ledger already had this item for its scope.
    pub seen_before: bool,
}
