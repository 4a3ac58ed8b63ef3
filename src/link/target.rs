//! Classified download targets.

use std::fmt;

/// What a link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// One video or image set.
    SingleItem,
    /// A user's profile page.
    UserProfile,
    /// A collection (mix).
    Collection,
    /// All items using one piece of music.
    MusicPage,
    /// A live room.
    LiveRoom,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::SingleItem => write!(f, "item"),
            TargetKind::UserProfile => write!(f, "user"),
            TargetKind::Collection => write!(f, "collection"),
            TargetKind::MusicPage => write!(f, "music"),
            TargetKind::LiveRoom => write!(f, "live"),
        }
    }
}

/// A link resolved to a target kind and the platform's identifier for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionTarget {
    pub kind: TargetKind,
    /// Item ID, `sec_uid`, mix ID, music ID or live room ID.
    pub upstream_id: String,
    /// The link as the user supplied it.
    pub raw_link: String,
}

impl ResolutionTarget {
    pub fn new(kind: TargetKind, upstream_id: impl Into<String>, raw_link: impl Into<String>) -> Self {
        Self {
            kind,
            upstream_id: upstream_id.into(),
            raw_link: raw_link.into(),
        }
    }
}

impl fmt::Display for ResolutionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.upstream_id)
    }
}

/// Result of classifying a raw link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkClass {
    /// The link maps directly to a target.
    Target(ResolutionTarget),
    /// A share short link; the canonical URL needs a redirect lookup first.
    ShortLink { url: String, raw_link: String },
}
