//! Listing mode definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which listing of a profile (or other paginated page) to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingMode {
    /// Items published by the user.
    Post,
    /// Items the user liked.
    Like,
    /// Every collection (mix) of the user, or a single collection link.
    Mix,
    /// Items using a piece of music.
    Music,
}

impl ListingMode {
    /// Modes that can be selected for a user profile.
    pub const PROFILE_MODES: [ListingMode; 3] =
        [ListingMode::Post, ListingMode::Like, ListingMode::Mix];

    /// Name used in ledger scopes and folder names.
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingMode::Post => "post",
            ListingMode::Like => "like",
            ListingMode::Mix => "mix",
            ListingMode::Music => "music",
        }
    }
}

impl fmt::Display for ListingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "post" => Ok(ListingMode::Post),
            "like" => Ok(ListingMode::Like),
            "mix" | "allmix" => Ok(ListingMode::Mix),
            "music" => Ok(ListingMode::Music),
            _ => Err(format!("Unknown mode: {}", s)),
        }
    }
}

/// What incremental mode does on reaching an already-downloaded item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncrementStrategy {
    /// Stop paginating: listings are newest-first, so everything after is known.
    #[default]
    Stop,
    /// Skip the item and keep paginating (for listings with pinned items).
    Filter,
}

impl fmt::Display for IncrementStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncrementStrategy::Stop => write!(f, "stop"),
            IncrementStrategy::Filter => write!(f, "filter"),
        }
    }
}

/// Per-mode count limits. `0` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeLimits {
    pub post: u32,
    pub like: u32,
    #[serde(alias = "allmix")]
    pub mix: u32,
    pub music: u32,
}

impl ModeLimits {
    pub fn for_mode(&self, mode: ListingMode) -> u32 {
        match mode {
            ListingMode::Post => self.post,
            ListingMode::Like => self.like,
            ListingMode::Mix => self.mix,
            ListingMode::Music => self.music,
        }
    }
}

/// Per-mode incremental switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeFlags {
    pub post: bool,
    pub like: bool,
    #[serde(alias = "allmix")]
    pub mix: bool,
    pub music: bool,
}

impl ModeFlags {
    pub fn for_mode(&self, mode: ListingMode) -> bool {
        match mode {
            ListingMode::Post => self.post,
            ListingMode::Like => self.like,
            ListingMode::Mix => self.mix,
            ListingMode::Music => self.music,
        }
    }
}
