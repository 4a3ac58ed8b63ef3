//! Resolution of links into item sequences.
//!
//! Provides:
//! - Short link resolution and target planning
//! - Lazy per-listing pagination with count limits and incremental cut-off
//! - Time window filtering

pub mod options;
pub mod paginator;
pub mod plan;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

pub use options::{ResolveOptions, TimeWindow};
pub use paginator::Paginator;
pub use plan::{plan_jobs, Job};

use crate::api::{ContentSource, Listing, MixSummary};
use crate::dedup::Ledger;
use crate::error::Result;
use crate::link::{classify_link, classify_redirected, LinkClass, ResolutionTarget};
use crate::media::ResolvedItem;

/// Drives a [`ContentSource`] for one run.
#[derive(Clone)]
pub struct Resolver {
    source: Arc<dyn ContentSource>,
    ledger: Option<Arc<Ledger>>,
    options: ResolveOptions,
}

impl Resolver {
    pub fn new(
        source: Arc<dyn ContentSource>,
        ledger: Option<Arc<Ledger>>,
        options: ResolveOptions,
    ) -> Self {
        Self {
            source,
            ledger,
            options,
        }
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Classify a raw link, following a share short link if needed.
    pub async fn resolve_link(&self, raw: &str) -> Result<ResolutionTarget> {
        match classify_link(raw)? {
            LinkClass::Target(target) => Ok(target),
            LinkClass::ShortLink { url, raw_link } => {
                let canonical = self.source.resolve_redirect(&url).await?;
                classify_redirected(&canonical, &raw_link)
            }
        }
    }

    pub fn plan(&self, target: &ResolutionTarget) -> Vec<Job> {
        plan_jobs(target, &self.options.modes)
    }

    /// Replace a profile's collection list with one job per collection.
    /// Other jobs pass through unchanged.
    pub async fn expand(&self, job: Job) -> Result<Vec<Job>> {
        let Job::UserMixes { sec_uid } = job else {
            return Ok(vec![job]);
        };

        let cap = self.options.limits.mix;
        let mixes = list_mixes(self.source.as_ref(), &sec_uid, cap).await?;
        tracing::info!(sec_uid = %sec_uid, collections = mixes.len(), "Listed collections");

        Ok(mixes
            .into_iter()
            .map(|m| Job::Listing(Listing::Collection { mix_id: m.mix_id }))
            .collect())
    }

    /// Open the item sequence of an expanded job.
    pub fn open(&self, job: &Job) -> ItemSequence {
        let inner = match job {
            Job::Listing(listing) => Inner::Pages(Paginator::new(
                self.source.clone(),
                self.ledger.clone(),
                listing.clone(),
                &self.options,
            )),
            other => Inner::Lookup {
                job: other.clone(),
                done: false,
                failed: false,
            },
        };
        ItemSequence {
            scope: job.scope(),
            source: self.source.clone(),
            ledger: self.ledger.clone(),
            inner,
        }
    }
}

/// Every collection of a user, at most `cap` of them (0 = all).
pub async fn list_mixes(
    source: &dyn ContentSource,
    sec_uid: &str,
    cap: u32,
) -> Result<Vec<MixSummary>> {
    let mut mixes = Vec::new();
    let mut cursor: Option<String> = None;
    let mut seen_cursors = std::collections::HashSet::new();

    loop {
        let page = source.list_user_mixes(sec_uid, cursor.as_deref()).await?;
        mixes.extend(page.items);

        if cap > 0 && mixes.len() >= cap as usize {
            mixes.truncate(cap as usize);
            break;
        }

        match page.next_cursor {
            Some(next) if page.has_more && seen_cursors.insert(next.clone()) => {
                cursor = Some(next)
            }
            _ => break,
        }
    }

    Ok(mixes)
}

/// Items of one job, pulled lazily.
pub struct ItemSequence {
    scope: String,
    source: Arc<dyn ContentSource>,
    ledger: Option<Arc<Ledger>>,
    inner: Inner,
}

enum Inner {
    Lookup { job: Job, done: bool, failed: bool },
    Pages(Paginator),
}

impl ItemSequence {
    /// Ledger scope of every item in this sequence.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub async fn next(&mut self) -> Result<Option<ResolvedItem>> {
        match &mut self.inner {
            Inner::Pages(paginator) => paginator.next().await,
            Inner::Lookup { job, done, failed } => {
                if *done {
                    return Ok(None);
                }
                *done = true;

                let lookup = match job {
                    Job::Single { item_id } => self.source.fetch_item_detail(item_id).await,
                    Job::Live { room_id } => self.source.fetch_live_snapshot(room_id).await,
                    Job::Listing(_) | Job::UserMixes { .. } => return Ok(None),
                };
                let item = match lookup {
                    Ok(item) => item,
                    Err(e) => {
                        *failed = true;
                        return Err(e);
                    }
                };

                let seen_before = match &self.ledger {
                    Some(ledger) => ledger.has(&self.scope, &item.item_id).await?,
                    None => false,
                };
                Ok(Some(ResolvedItem { item, seen_before }))
            }
        }
    }

    /// Retry the step that failed last, e.g. after refreshing credentials.
    pub fn resume(&mut self) {
        match &mut self.inner {
            Inner::Pages(paginator) => paginator.resume(),
            Inner::Lookup { done, failed, .. } => {
                if *failed {
                    *failed = false;
                    *done = false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ListingMode;
    use crate::error::Error;
    use crate::link::TargetKind;
    use super::testing::{video_item, FakeSource};

    #[tokio::test]
    async fn test_resolve_short_link() {
        let mut source = FakeSource::default();
        source.redirects.insert(
            "https://v.douyin.com/iRNBho6u/".into(),
            "https://www.iesdouyin.com/share/video/7283528505362566450/".into(),
        );
        let resolver = Resolver::new(Arc::new(source), None, ResolveOptions::default());

        let target = resolver
            .resolve_link("看看 https://v.douyin.com/iRNBho6u/ 复制此链接")
            .await
            .unwrap();
        assert_eq!(target.kind, TargetKind::SingleItem);
        assert_eq!(target.upstream_id, "7283528505362566450");
    }

    #[tokio::test]
    async fn test_unresolvable_short_link() {
        let resolver = Resolver::new(
            Arc::new(FakeSource::default()),
            None,
            ResolveOptions::default(),
        );
        let err = resolver
            .resolve_link("https://v.douyin.com/gone/")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RedirectNotFound(_)));
    }

    #[tokio::test]
    async fn test_single_item_sequence() {
        let mut source = FakeSource::default();
        source.details.insert("42".into(), video_item("42"));
        let ledger = Arc::new(Ledger::open_in_memory().await.unwrap());
        ledger.record("single", "42").await.unwrap();

        let resolver = Resolver::new(Arc::new(source), Some(ledger), ResolveOptions::default());
        let mut seq = resolver.open(&Job::Single {
            item_id: "42".into(),
        });
        let first = seq.next().await.unwrap().unwrap();
        assert_eq!(first.item.item_id, "42");
        assert!(first.seen_before);
        assert!(seq.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expand_user_mixes_with_cap() {
        let mut source = FakeSource::default();
        source.mixes.insert(
            "MS4w".into(),
            (1..=4)
                .map(|i| MixSummary {
                    mix_id: i.to_string(),
                    name: format!("mix {}", i),
                })
                .collect(),
        );
        let mut options = ResolveOptions {
            modes: vec![ListingMode::Mix],
            ..Default::default()
        };
        options.limits.mix = 2;
        let resolver = Resolver::new(Arc::new(source), None, options);

        let jobs = resolver
            .expand(Job::UserMixes {
                sec_uid: "MS4w".into(),
            })
            .await
            .unwrap();
        assert_eq!(
            jobs,
            vec![
                Job::Listing(Listing::Collection {
                    mix_id: "1".into()
                }),
                Job::Listing(Listing::Collection {
                    mix_id: "2".into()
                }),
            ]
        );
    }

    #[tokio::test]
    async fn test_profile_scenario_three_of_five() {
        let posts = Listing::UserPosts {
            sec_uid: "MS4w".into(),
        };
        let source = Arc::new(FakeSource::with_listing(posts.clone(), 5, 3));
        let mut options = ResolveOptions {
            modes: vec![ListingMode::Post],
            ..Default::default()
        };
        options.limits.post = 3;
        let resolver = Resolver::new(source, None, options);

        let target = ResolutionTarget::new(TargetKind::UserProfile, "MS4w", "raw");
        let jobs = resolver.plan(&target);
        assert_eq!(jobs, vec![Job::Listing(posts)]);

        let mut seq = resolver.open(&jobs[0]);
        let mut ids = Vec::new();
        while let Some(resolved) = seq.next().await.unwrap() {
            ids.push(resolved.item.item_id);
        }
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(seq.scope(), "post:MS4w");
    }
}
