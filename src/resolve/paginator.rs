//! Lazy walk over one paginated listing.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::api::{ContentSource, Listing};
use crate::config::IncrementStrategy;
use crate::dedup::Ledger;
use crate::error::Result;
use crate::media::{ContentItem, ResolvedItem};
use crate::resolve::options::{ResolveOptions, TimeWindow};

/// Pulls items out of a listing one at a time, fetching pages on demand.
///
/// Pages are consumed in cursor order. The walk ends when the count limit is
/// reached, the upstream reports no more pages, the cursor stops advancing,
/// or (in incremental stop mode) the first already-downloaded item shows up.
pub struct Paginator {
    source: Arc<dyn ContentSource>,
    ledger: Option<Arc<Ledger>>,
    listing: Listing,
    scope: String,
    limit: u32,
    incremental: bool,
    strategy: IncrementStrategy,
    window: TimeWindow,

    cursor: Option<String>,
    seen_cursors: HashSet<String>,
    buffer: VecDeque<ContentItem>,
    exhausted: bool,
    done: bool,
    failed: bool,
    yielded: u32,
    pages_fetched: u32,
}

impl Paginator {
    pub fn new(
        source: Arc<dyn ContentSource>,
        ledger: Option<Arc<Ledger>>,
        listing: Listing,
        options: &ResolveOptions,
    ) -> Self {
        let mode = listing.mode();
        Self {
            source,
            ledger,
            scope: listing.scope(),
            limit: options.limit_for(mode),
            incremental: options.incremental_for(mode),
            strategy: options.strategy,
            window: options.window,
            listing,
            cursor: None,
            seen_cursors: HashSet::new(),
            buffer: VecDeque::new(),
            exhausted: false,
            done: false,
            failed: false,
            yielded: 0,
            pages_fetched: 0,
        }
    }

    pub fn listing(&self) -> &Listing {
        &self.listing
    }

    /// Ledger scope of the items this paginator yields.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Let the walk continue after a page or ledger error. A failed page is
    /// requested again with the same cursor; an item whose ledger lookup
    /// failed is looked up again.
    pub fn resume(&mut self) {
        if self.failed {
            self.failed = false;
            self.done = false;
        }
    }

    /// Next item, or `None` once the walk is over.
    ///
    /// A page error ends the walk and is returned as is.
    pub async fn next(&mut self) -> Result<Option<ResolvedItem>> {
        loop {
            if self.done || (self.limit > 0 && self.yielded >= self.limit) {
                self.done = true;
                return Ok(None);
            }

            if let Some(item) = self.buffer.pop_front() {
                if !self.window.contains(item.created_at) {
                    tracing::debug!(item_id = %item.item_id, "Outside time window");
                    continue;
                }

                let seen = match &self.ledger {
                    Some(ledger) => ledger.has(&self.scope, &item.item_id).await,
                    None => Ok(false),
                };
                let seen = match seen {
                    Ok(seen) => seen,
                    Err(e) => {
                        // Keep the item so `resume` replays it.
                        self.buffer.push_front(item);
                        self.done = true;
                        self.failed = true;
                        return Err(e);
                    }
                };

                if seen && self.incremental {
                    match self.strategy {
                        IncrementStrategy::Stop => {
                            tracing::info!(
                                scope = %self.scope,
                                item_id = %item.item_id,
                                "Reached already-downloaded item, stopping"
                            );
                            self.done = true;
                            self.buffer.clear();
                            return Ok(None);
                        }
                        IncrementStrategy::Filter => continue,
                    }
                }

                self.yielded += 1;
                return Ok(Some(ResolvedItem {
                    item,
                    seen_before: seen,
                }));
            }

            if self.exhausted {
                self.done = true;
                return Ok(None);
            }

            self.fetch_page().await?;
        }
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let page = match self.source.list_page(&self.listing, self.cursor.as_deref()).await {
            Ok(page) => page,
            Err(e) => {
                self.done = true;
                self.failed = true;
                return Err(e);
            }
        };
        self.pages_fetched += 1;

        tracing::debug!(
            scope = %self.scope,
            page = self.pages_fetched,
            items = page.items.len(),
            has_more = page.has_more,
            "Fetched listing page"
        );

        self.buffer.extend(page.items);

        match page.next_cursor {
            Some(next) if page.has_more => {
                if !self.seen_cursors.insert(next.clone()) {
                    tracing::warn!(scope = %self.scope, cursor = %next, "Cursor repeated, stopping");
                    self.exhausted = true;
                } else {
                    self.cursor = Some(next);
                }
            }
            _ => self.exhausted = true,
        }

        Ok(())
    }
}
