//! Downloading every file of one item.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::DouyinApi;
use crate::config::{Config, RetryConfig};
use crate::dedup::Ledger;
use crate::download::outcome::DownloadOutcome;
use crate::error::{Error, Result};
use crate::fs::{write_bytes_atomic, write_stream_atomic, ItemLayout};
use crate::media::{ContentItem, MediaAsset, MediaRole};
use crate::retry::with_retry;

/// What the dispatcher writes and how hard it tries.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Output root.
    pub root: PathBuf,
    pub music: bool,
    pub cover: bool,
    pub avatar: bool,
    pub json: bool,
    /// Skip items the ledger already has.
    pub skip_existing: bool,
    pub retry: RetryConfig,
    /// Time in-flight items get after cancellation.
    pub grace_period: Duration,
}

impl DownloadOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            root: config.path.clone(),
            music: config.music,
            cover: config.cover,
            avatar: config.avatar,
            json: config.json,
            skip_existing: config.skip_existing,
            retry: config.retry.clone(),
            grace_period: config.grace_period(),
        }
    }

    /// Whether an optional role is switched on.
    pub fn wants(&self, role: MediaRole) -> bool {
        match role {
            MediaRole::Video | MediaRole::Image => true,
            MediaRole::Cover => self.cover,
            MediaRole::Avatar => self.avatar,
            MediaRole::Music => self.music,
            MediaRole::Json => self.json,
        }
    }
}

/// Fetch and write all selected assets of `item`, then record it.
///
/// Never returns an error: every failure ends up in the outcome.
pub async fn download_item(
    api: &DouyinApi,
    ledger: Option<&Ledger>,
    options: &DownloadOptions,
    scope: &str,
    item: &ContentItem,
) -> DownloadOutcome {
    match write_item(api, options, scope, item).await {
        Ok((written_paths, notes)) => {
            if let Some(ledger) = ledger {
                if let Err(e) = ledger.record(scope, &item.item_id).await {
                    tracing::error!(item_id = %item.item_id, error = %e, "Failed to record download");
                    return DownloadOutcome::failed(&item.item_id, scope, e.to_string());
                }
            }
            tracing::info!(
                item_id = %item.item_id,
                files = written_paths.len(),
                "Downloaded {}",
                item.kind
            );
            DownloadOutcome {
                notes,
                ..DownloadOutcome::success(&item.item_id, scope, written_paths)
            }
        }
        Err(e) => {
            tracing::warn!(item_id = %item.item_id, error = %e, "Item failed");
            DownloadOutcome {
                filesystem_failure: e.is_filesystem(),
                ..DownloadOutcome::failed(&item.item_id, scope, e.to_string())
            }
        }
    }
}

/// Written paths and notes about optional assets that failed.
async fn write_item(
    api: &DouyinApi,
    options: &DownloadOptions,
    scope: &str,
    item: &ContentItem,
) -> Result<(Vec<PathBuf>, Vec<String>)> {
    for role in item.kind.required_roles() {
        if item.assets_with_role(*role).next().is_none() {
            return Err(Error::Download(format!("{} item has no {} asset", item.kind, role)));
        }
    }

    let layout = ItemLayout::new(&options.root, scope, item)?;
    let mut written = Vec::new();
    let mut notes = Vec::new();

    for asset in &item.assets {
        let required = item.is_required(asset);
        if !required && !options.wants(asset.role) {
            continue;
        }

        let dest = layout.asset_path(asset);
        match fetch_asset(api, &options.retry, asset, &dest).await {
            Ok(()) => written.push(dest),
            Err(e) if required => {
                return Err(annotate(e, asset));
            }
            Err(e) => {
                tracing::warn!(item_id = %item.item_id, asset = %asset.label(), error = %e, "Optional asset failed");
                notes.push(format!("{}: {}", asset.label(), e));
            }
        }
    }

    if options.json {
        let dest = layout.sidecar_path();
        let written_sidecar = match serde_json::to_vec_pretty(&item.metadata) {
            Ok(body) => write_bytes_atomic(&dest, &body).await,
            Err(e) => Err(e.into()),
        };
        match written_sidecar {
            Ok(()) => written.push(dest),
            Err(e) => notes.push(format!("json: {}", e)),
        }
    }

    Ok((written, notes))
}

/// Prefix a required asset's error with its label, keeping filesystem errors intact.
fn annotate(e: Error, asset: &MediaAsset) -> Error {
    if e.is_filesystem() {
        e
    } else {
        Error::Download(format!("{}: {}", asset.label(), e))
    }
}

/// Fetch one asset to `dest`, retrying transient failures.
///
/// An existing file at `dest` counts as already written.
pub async fn fetch_asset(
    api: &DouyinApi,
    retry: &RetryConfig,
    asset: &MediaAsset,
    dest: &Path,
) -> Result<()> {
    if tokio::fs::try_exists(dest).await.unwrap_or(false) {
        tracing::debug!(path = %dest.display(), "Already on disk");
        return Ok(());
    }
    with_retry(retry, || try_candidates(api, asset, dest)).await
}

/// One attempt: every candidate URL in order.
///
/// If any candidate failed transiently the attempt is reported as
/// transient, so the retry loop gets another go at the whole list.
async fn try_candidates(api: &DouyinApi, asset: &MediaAsset, dest: &Path) -> Result<()> {
    let mut transient: Option<Error> = None;
    let mut last: Option<Error> = None;

    for url in &asset.urls {
        match fetch_to(api, url, dest).await {
            Ok(bytes) => {
                tracing::debug!(url = %url, bytes, path = %dest.display(), "Wrote asset");
                return Ok(());
            }
            Err(e) if e.is_filesystem() => return Err(e),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Candidate failed");
                if e.is_retryable() && transient.is_none() {
                    transient = Some(e);
                } else {
                    last = Some(e);
                }
            }
        }
    }

    Err(transient
        .or(last)
        .unwrap_or_else(|| Error::Download(format!("no URL for {}", asset.label()))))
}

async fn fetch_to(api: &DouyinApi, url: &str, dest: &Path) -> Result<u64> {
    let response = api.fetch_asset(url).await?;
    write_stream_atomic(dest, Box::pin(response.bytes_stream())).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::api::{CredentialContext, Credentials};
    use crate::media::ItemKind;

    fn test_api() -> DouyinApi {
        let mut config = Config::default();
        config.network.requests_per_second = 0.0;
        let ctx = Arc::new(CredentialContext::new(Credentials::default(), "test-agent"));
        DouyinApi::new(&config, ctx).unwrap()
    }

    fn retry(attempts: u32) -> RetryConfig {
        RetryConfig {
            attempts,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            multiplier: 2.0,
            jitter: false,
        }
    }

    fn options(root: &Path, attempts: u32) -> DownloadOptions {
        DownloadOptions {
            root: root.to_path_buf(),
            music: true,
            cover: true,
            avatar: false,
            json: true,
            skip_existing: true,
            retry: retry(attempts),
            grace_period: Duration::from_secs(1),
        }
    }

    fn item(server: &MockServer) -> ContentItem {
        let mut metadata = BTreeMap::new();
        metadata.insert("aweme_id".to_string(), json!("42"));
        ContentItem {
            item_id: "42".into(),
            kind: ItemKind::Video,
            title: "clip".into(),
            author: "alice".into(),
            created_at: 1_700_000_000,
            assets: vec![
                MediaAsset::new(MediaRole::Video, vec![format!("{}/v.mp4", server.uri())]),
                MediaAsset::new(MediaRole::Cover, vec![format!("{}/c.jpeg", server.uri())]),
                MediaAsset::new(MediaRole::Avatar, vec![format!("{}/a.jpeg", server.uri())]),
            ],
            metadata,
        }
    }

    async fn mount_ok(server: &MockServer, p: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_writes_selected_assets_and_records() {
        let server = MockServer::start().await;
        mount_ok(&server, "/v.mp4", "video").await;
        mount_ok(&server, "/c.jpeg", "cover").await;

        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open_in_memory().await.unwrap();
        let outcome = download_item(
            &test_api(),
            Some(&ledger),
            &options(dir.path(), 3),
            "post:MS4w",
            &item(&server),
        )
        .await;

        assert!(outcome.is_success(), "{:?}", outcome);
        // video, cover, sidecar; avatar is off
        assert_eq!(outcome.written_paths.len(), 3);
        assert_eq!(std::fs::read_to_string(&outcome.written_paths[0]).unwrap(), "video");
        assert!(outcome.written_paths[2].to_string_lossy().ends_with("_data.json"));
        assert!(ledger.has("post:MS4w", "42").await.unwrap());
    }

    #[tokio::test]
    async fn test_optional_failure_is_noted() {
        let server = MockServer::start().await;
        mount_ok(&server, "/v.mp4", "video").await;
        Mock::given(path("/c.jpeg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let outcome =
            download_item(&test_api(), None, &options(dir.path(), 3), "single", &item(&server))
                .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.notes.len(), 1);
        assert!(outcome.notes[0].starts_with("cover"));
    }

    #[tokio::test]
    async fn test_required_failure_fails_item_without_recording() {
        let server = MockServer::start().await;
        Mock::given(path("/v.mp4"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open_in_memory().await.unwrap();
        let outcome = download_item(
            &test_api(),
            Some(&ledger),
            &options(dir.path(), 3),
            "single",
            &item(&server),
        )
        .await;

        assert_eq!(outcome.status, crate::download::DownloadStatus::Failed);
        assert!(outcome.failure_reason.unwrap().contains("video"));
        assert!(!ledger.has("single", "42").await.unwrap());
    }

    #[tokio::test]
    async fn test_retry_cap_allows_attempts_minus_one_failures() {
        let server = MockServer::start().await;
        Mock::given(path("/v.mp4"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        mount_ok(&server, "/v.mp4", "video").await;

        let dir = tempfile::tempdir().unwrap();
        let asset = MediaAsset::new(MediaRole::Video, vec![format!("{}/v.mp4", server.uri())]);
        let dest = dir.path().join("v.mp4");

        fetch_asset(&test_api(), &retry(3), &asset, &dest).await.unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "video");
    }

    #[tokio::test]
    async fn test_retry_cap_exhausted() {
        let server = MockServer::start().await;
        Mock::given(path("/v.mp4"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(3)
            .expect(3)
            .mount(&server)
            .await;
        mount_ok(&server, "/v.mp4", "video").await;

        let dir = tempfile::tempdir().unwrap();
        let asset = MediaAsset::new(MediaRole::Video, vec![format!("{}/v.mp4", server.uri())]);
        let dest = dir.path().join("v.mp4");

        let err = fetch_asset(&test_api(), &retry(3), &asset, &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UpstreamServer { code: 503 }));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_fallback_url_after_forbidden() {
        let server = MockServer::start().await;
        Mock::given(path("/first.mp4"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        mount_ok(&server, "/second.mp4", "second").await;

        let dir = tempfile::tempdir().unwrap();
        let asset = MediaAsset::new(
            MediaRole::Video,
            vec![
                format!("{}/first.mp4", server.uri()),
                format!("{}/second.mp4", server.uri()),
            ],
        );
        let dest = dir.path().join("v.mp4");

        fetch_asset(&test_api(), &retry(1), &asset, &dest).await.unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "second");
    }

    #[tokio::test]
    async fn test_existing_file_is_not_refetched() {
        let server = MockServer::start().await;
        Mock::given(path("/v.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_string("new"))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("v.mp4");
        std::fs::write(&dest, "old").unwrap();
        let asset = MediaAsset::new(MediaRole::Video, vec![format!("{}/v.mp4", server.uri())]);

        fetch_asset(&test_api(), &retry(3), &asset, &dest).await.unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "old");
    }

    #[tokio::test]
    async fn test_item_without_required_asset_fails() {
        let server = MockServer::start().await;
        let mut broken = item(&server);
        broken.kind = ItemKind::ImageSet;

        let dir = tempfile::tempdir().unwrap();
        let outcome =
            download_item(&test_api(), None, &options(dir.path(), 3), "single", &broken).await;
        assert!(outcome.failure_reason.unwrap().contains("no image asset"));
    }
}
