//! Bounded worker pool for item downloads.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use indicatif::ProgressBar;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::api::DouyinApi;
use crate::dedup::Ledger;
use crate::download::item::{download_item, DownloadOptions};
use crate::download::outcome::DownloadOutcome;
use crate::media::ResolvedItem;

/// Runs item downloads with at most `workers` in flight.
///
/// One dispatcher is shared by every target of a run, so the worker count
/// bounds total concurrency no matter how many targets there are.
pub struct Dispatcher {
    api: Arc<DouyinApi>,
    ledger: Option<Arc<Ledger>>,
    options: Arc<DownloadOptions>,
    permits: Arc<Semaphore>,
    tasks: JoinSet<DownloadOutcome>,
    /// Items started but not finished, keyed by `scope/item id`.
    in_flight: Arc<Mutex<HashMap<String, (String, String)>>>,
    finished: Vec<DownloadOutcome>,
    cancel: CancellationToken,
    progress: Option<ProgressBar>,
}

impl Dispatcher {
    pub fn new(
        api: Arc<DouyinApi>,
        ledger: Option<Arc<Ledger>>,
        options: DownloadOptions,
        workers: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            api,
            ledger,
            options: Arc::new(options),
            permits: Arc::new(Semaphore::new(workers.max(1))),
            tasks: JoinSet::new(),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            finished: Vec::new(),
            cancel,
            progress: None,
        }
    }

    /// Tick `progress` once per finished item.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn progress(&self) -> Option<&ProgressBar> {
        self.progress.as_ref()
    }

    /// Queue one item. Waits for a free worker.
    ///
    /// Returns `false` without starting anything once the run is cancelled.
    pub async fn submit(&mut self, scope: &str, resolved: ResolvedItem) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        let ResolvedItem { item, seen_before } = resolved;
        if seen_before && self.options.skip_existing {
            tracing::debug!(item_id = %item.item_id, scope, "Already downloaded, skipping");
            self.tick();
            self.finished
                .push(DownloadOutcome::skipped(&item.item_id, scope));
            return true;
        }

        let permit = tokio::select! {
            permit = self.permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return false,
            },
            _ = self.cancel.cancelled() => return false,
        };

        let key = format!("{}/{}", scope, item.item_id);
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.insert(key.clone(), (scope.to_string(), item.item_id.clone()));
        }

        let api = self.api.clone();
        let ledger = self.ledger.clone();
        let options = self.options.clone();
        let in_flight = self.in_flight.clone();
        let progress = self.progress.clone();
        let scope = scope.to_string();

        self.tasks.spawn(async move {
            let outcome = download_item(&api, ledger.as_deref(), &options, &scope, &item).await;
            drop(permit);
            if let Ok(mut in_flight) = in_flight.lock() {
                in_flight.remove(&key);
            }
            if let Some(progress) = progress {
                progress.inc(1);
            }
            outcome
        });

        true
    }

    /// Wait for every queued item and return all outcomes.
    ///
    /// After cancellation, in-flight items get the grace period to finish.
    /// Whatever is still running after that is aborted and reported failed.
    pub async fn drain(&mut self) -> Vec<DownloadOutcome> {
        let mut outcomes = std::mem::take(&mut self.finished);

        loop {
            tokio::select! {
                next = self.tasks.join_next() => match next {
                    Some(joined) => outcomes.extend(joined_outcome(joined)),
                    None => return outcomes,
                },
                _ = self.cancel.cancelled() => break,
            }
        }

        let grace = self.options.grace_period;
        tracing::info!(
            in_flight = self.tasks.len(),
            grace_secs = grace.as_secs(),
            "Cancelled, waiting for in-flight downloads"
        );

        let deadline = tokio::time::sleep(grace);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                next = self.tasks.join_next() => match next {
                    Some(joined) => outcomes.extend(joined_outcome(joined)),
                    None => return outcomes,
                },
                _ = &mut deadline => break,
            }
        }

        tracing::warn!(aborted = self.tasks.len(), "Grace period over, aborting downloads");
        self.tasks.abort_all();
        while let Some(joined) = self.tasks.join_next().await {
            outcomes.extend(joined_outcome(joined));
        }

        let aborted: Vec<_> = match self.in_flight.lock() {
            Ok(mut in_flight) => in_flight.drain().map(|(_, v)| v).collect(),
            Err(_) => Vec::new(),
        };
        for (scope, item_id) in aborted {
            self.tick();
            outcomes.push(DownloadOutcome::failed(&item_id, &scope, "cancelled"));
        }

        outcomes
    }

    fn tick(&self) {
        if let Some(progress) = &self.progress {
            progress.inc(1);
        }
    }
}

fn joined_outcome(
    joined: std::result::Result<DownloadOutcome, tokio::task::JoinError>,
) -> Option<DownloadOutcome> {
    match joined {
        Ok(outcome) => Some(outcome),
        Err(e) if e.is_cancelled() => None,
        Err(e) => {
            tracing::error!(error = %e, "Download task panicked");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::time::Duration;

    use wiremock::matchers::path;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::api::{CredentialContext, Credentials};
    use crate::config::{Config, RetryConfig};
    use crate::download::DownloadStatus;
    use crate::media::{ContentItem, ItemKind, MediaAsset, MediaRole};

    fn api() -> Arc<DouyinApi> {
        let mut config = Config::default();
        config.network.requests_per_second = 0.0;
        let ctx = Arc::new(CredentialContext::new(Credentials::default(), "test-agent"));
        Arc::new(DouyinApi::new(&config, ctx).unwrap())
    }

    fn options(root: &Path, grace: Duration) -> DownloadOptions {
        DownloadOptions {
            root: root.to_path_buf(),
            music: false,
            cover: false,
            avatar: false,
            json: false,
            skip_existing: true,
            retry: RetryConfig {
                attempts: 2,
                initial_delay_ms: 1,
                max_delay_ms: 2,
                multiplier: 2.0,
                jitter: false,
            },
            grace_period: grace,
        }
    }

    fn resolved(server: &MockServer, id: &str, seen_before: bool) -> ResolvedItem {
        ResolvedItem {
            item: ContentItem {
                item_id: id.into(),
                kind: ItemKind::Video,
                title: format!("item {}", id),
                author: "alice".into(),
                created_at: 1_700_000_000,
                assets: vec![MediaAsset::new(
                    MediaRole::Video,
                    vec![format!("{}/{}.mp4", server.uri(), id)],
                )],
                metadata: BTreeMap::new(),
            },
            seen_before,
        }
    }

    #[tokio::test]
    async fn test_one_failure_does_not_affect_siblings() {
        let server = MockServer::start().await;
        Mock::given(path("/3.mp4"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(wiremock::matchers::method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("video")
                    .set_delay(Duration::from_millis(20)),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut dispatcher = Dispatcher::new(
            api(),
            None,
            options(dir.path(), Duration::from_secs(1)),
            3,
            CancellationToken::new(),
        );
        for i in 1..=6 {
            assert!(dispatcher.submit("post:a", resolved(&server, &i.to_string(), false)).await);
        }
        let outcomes = dispatcher.drain().await;

        assert_eq!(outcomes.len(), 6);
        let failed: Vec<_> = outcomes
            .iter()
            .filter(|o| o.status == DownloadStatus::Failed)
            .map(|o| o.item_id.as_str())
            .collect();
        assert_eq!(failed, vec!["3"]);
        assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 5);
    }

    #[tokio::test]
    async fn test_seen_items_are_skipped_without_fetching() {
        let server = MockServer::start().await;
        Mock::given(path("/1.mp4"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut dispatcher = Dispatcher::new(
            api(),
            None,
            options(dir.path(), Duration::from_secs(1)),
            2,
            CancellationToken::new(),
        );
        dispatcher.submit("post:a", resolved(&server, "1", true)).await;
        let outcomes = dispatcher.drain().await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status, DownloadStatus::Skipped);
    }

    #[tokio::test]
    async fn test_seen_items_download_when_not_skipping() {
        let server = MockServer::start().await;
        Mock::given(path("/1.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_string("v"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut opts = options(dir.path(), Duration::from_secs(1));
        opts.skip_existing = false;
        let mut dispatcher = Dispatcher::new(api(), None, opts, 2, CancellationToken::new());
        dispatcher.submit("post:a", resolved(&server, "1", true)).await;
        assert!(dispatcher.drain().await[0].is_success());
    }

    #[tokio::test]
    async fn test_cancelled_run_starts_nothing() {
        let server = MockServer::start().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let dir = tempfile::tempdir().unwrap();
        let mut dispatcher = Dispatcher::new(
            api(),
            None,
            options(dir.path(), Duration::from_secs(1)),
            2,
            cancel,
        );
        assert!(!dispatcher.submit("post:a", resolved(&server, "1", false)).await);
        assert!(dispatcher.drain().await.is_empty());
    }

    #[tokio::test]
    async fn test_grace_period_then_abort() {
        let server = MockServer::start().await;
        Mock::given(path("/slow.mp4"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("v")
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let mut dispatcher = Dispatcher::new(
            api(),
            None,
            options(dir.path(), Duration::from_millis(50)),
            2,
            cancel.clone(),
        );
        dispatcher.submit("single", resolved(&server, "slow", false)).await;
        cancel.cancel();

        let outcomes = tokio::time::timeout(Duration::from_secs(5), dispatcher.drain())
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].item_id, "slow");
        assert_eq!(outcomes[0].failure_reason.as_deref(), Some("cancelled"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
