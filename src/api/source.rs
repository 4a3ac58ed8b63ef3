//! The lookup and listing surface the resolver drives.

use std::fmt;

use async_trait::async_trait;

use crate::config::ListingMode;
use crate::error::Result;
use crate::media::ContentItem;

/// A paginated upstream listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Listing {
    UserPosts { sec_uid: String },
    UserLikes { sec_uid: String },
    Collection { mix_id: String },
    Music { music_id: String },
}

impl Listing {
    /// Which count limit and incremental switch apply.
    pub fn mode(&self) -> ListingMode {
        match self {
            Listing::UserPosts { .. } => ListingMode::Post,
            Listing::UserLikes { .. } => ListingMode::Like,
            Listing::Collection { .. } => ListingMode::Mix,
            Listing::Music { .. } => ListingMode::Music,
        }
    }

    /// Ledger scope, e.g. `post:<sec_uid>`.
    pub fn scope(&self) -> String {
        match self {
            Listing::UserPosts { sec_uid } => format!("post:{}", sec_uid),
            Listing::UserLikes { sec_uid } => format!("like:{}", sec_uid),
            Listing::Collection { mix_id } => format!("mix:{}", mix_id),
            Listing::Music { music_id } => format!("music:{}", music_id),
        }
    }
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.scope())
    }
}

/// One page of a listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// `None` once the listing is exhausted.
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
            has_more: false,
        }
    }
}

/// A collection on a user's profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixSummary {
    pub mix_id: String,
    pub name: String,
}

/// Upstream lookups and listings.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Follow a share short link to its canonical page URL.
    async fn resolve_redirect(&self, short_url: &str) -> Result<String>;

    async fn fetch_item_detail(&self, item_id: &str) -> Result<ContentItem>;

    /// One page of `listing`. `cursor = None` starts from the top.
    async fn list_page(&self, listing: &Listing, cursor: Option<&str>) -> Result<Page<ContentItem>>;

    /// One page of a user's collections.
    async fn list_user_mixes(&self, sec_uid: &str, cursor: Option<&str>)
        -> Result<Page<MixSummary>>;

    async fn fetch_live_snapshot(&self, room_id: &str) -> Result<ContentItem>;
}
