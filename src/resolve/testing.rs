//! In-memory [`ContentSource`] for resolver tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::api::{ContentSource, Listing, MixSummary, Page};
use crate::error::{Error, Result};
use crate::media::{ContentItem, ItemKind, MediaAsset, MediaRole};

pub fn video_item(id: &str) -> ContentItem {
    ContentItem {
        item_id: id.to_string(),
        kind: ItemKind::Video,
        title: format!("item {}", id),
        author: "alice".to_string(),
        created_at: 1_700_000_000,
        assets: vec![MediaAsset::new(
            MediaRole::Video,
            vec![format!("https://cdn.test/{}.mp4", id)],
        )],
        metadata: BTreeMap::new(),
    }
}

#[derive(Default)]
pub struct FakeSource {
    listings: HashMap<Listing, Vec<Vec<ContentItem>>>,
    looping: Option<Listing>,
    failing: Option<Listing>,
    pub details: HashMap<String, ContentItem>,
    pub redirects: HashMap<String, String>,
    pub mixes: HashMap<String, Vec<MixSummary>>,
    /// Listing calls that answer `AuthExpired` before behaving normally.
    pub auth_failures: AtomicUsize,
    page_calls: AtomicUsize,
}

impl FakeSource {
    /// A listing of items `1..=total`, `per_page` per page.
    pub fn with_listing(listing: Listing, total: usize, per_page: usize) -> Self {
        let items: Vec<_> = (1..=total).map(|i| video_item(&i.to_string())).collect();
        let pages = items.chunks(per_page).map(|c| c.to_vec()).collect();
        let mut source = Self::default();
        source.listings.insert(listing, pages);
        source
    }

    /// A listing that always answers with the same cursor.
    pub fn looping(listing: Listing) -> Self {
        Self {
            looping: Some(listing),
            ..Default::default()
        }
    }

    /// A listing whose pages are malformed.
    pub fn failing(listing: Listing) -> Self {
        Self {
            failing: Some(listing),
            ..Default::default()
        }
    }

    pub fn add_pages(&mut self, listing: Listing, pages: Vec<Vec<ContentItem>>) {
        self.listings.insert(listing, pages);
    }

    pub fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentSource for FakeSource {
    async fn resolve_redirect(&self, short_url: &str) -> Result<String> {
        self.redirects
            .get(short_url)
            .cloned()
            .ok_or_else(|| Error::RedirectNotFound(short_url.to_string()))
    }

    async fn fetch_item_detail(&self, item_id: &str) -> Result<ContentItem> {
        self.details
            .get(item_id)
            .cloned()
            .ok_or_else(|| Error::ItemUnavailable(item_id.to_string()))
    }

    async fn list_page(&self, listing: &Listing, cursor: Option<&str>) -> Result<Page<ContentItem>> {
        let call = self.page_calls.fetch_add(1, Ordering::SeqCst);

        if self
            .auth_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::AuthExpired("fake".into()));
        }

        if self.failing.as_ref() == Some(listing) {
            return Err(Error::UpstreamSchema("missing 'aweme_list'".into()));
        }

        if self.looping.as_ref() == Some(listing) {
            return Ok(Page {
                items: vec![video_item(&format!("loop{}", call))],
                next_cursor: Some("same".into()),
                has_more: true,
            });
        }

        let pages = self
            .listings
            .get(listing)
            .ok_or_else(|| Error::UpstreamRejected { code: 404 })?;
        let index: usize = cursor.map_or(Ok(0), str::parse::<usize>).unwrap_or(0);
        let items = pages.get(index).cloned().unwrap_or_default();
        let has_more = index + 1 < pages.len();

        Ok(Page {
            items,
            next_cursor: has_more.then(|| (index + 1).to_string()),
            has_more,
        })
    }

    async fn list_user_mixes(
        &self,
        sec_uid: &str,
        _cursor: Option<&str>,
    ) -> Result<Page<MixSummary>> {
        Ok(Page::last(self.mixes.get(sec_uid).cloned().unwrap_or_default()))
    }

    async fn fetch_live_snapshot(&self, room_id: &str) -> Result<ContentItem> {
        let mut item = video_item(&format!("{}_1700000000", room_id));
        item.kind = ItemKind::Live;
        item.assets = vec![MediaAsset::new(
            MediaRole::Cover,
            vec![format!("https://cdn.test/{}.jpeg", room_id)],
        )];
        Ok(item)
    }
}
