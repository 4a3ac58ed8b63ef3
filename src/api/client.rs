//! Douyin web API HTTP client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, redirect, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::api::auth::CredentialContext;
use crate::api::source::{ContentSource, Listing, MixSummary, Page};
use crate::api::throttle::Throttle;
use crate::api::types::{
    AwemeDetailResponse, AwemeListResponse, LiveEnterResponse, MixListResponse,
};
use crate::config::{Config, RetryConfig};
use crate::error::{Error, Result};
use crate::media::{normalize_aweme, normalize_live, ContentItem};
use crate::retry::with_retry;

/// Items requested per listing page.
pub const PAGE_SIZE: u32 = 18;

const DETAIL_PATH: &str = "/aweme/v1/web/aweme/detail/";
const POST_PATH: &str = "/aweme/v1/web/aweme/post/";
const FAVORITE_PATH: &str = "/aweme/v1/web/aweme/favorite/";
const MIX_ITEMS_PATH: &str = "/aweme/v1/web/mix/aweme/";
const MIX_LIST_PATH: &str = "/aweme/v1/web/mix/list/";
const MUSIC_PATH: &str = "/aweme/v1/web/music/aweme/";
const LIVE_ENTER_PATH: &str = "/webcast/room/web/enter/";

/// Parameters the web client sends with every API call.
const COMMON_PARAMS: [(&str, &str); 7] = [
    ("device_platform", "webapp"),
    ("aid", "6383"),
    ("channel", "channel_pc_web"),
    ("pc_client_type", "1"),
    ("version_code", "170400"),
    ("cookie_enabled", "true"),
    ("platform", "PC"),
];

/// Douyin API client with credential decoration, throttling and retries.
pub struct DouyinApi {
    client: Client,
    redirect_client: Client,
    credentials: Arc<CredentialContext>,
    throttle: Throttle,
    retry: RetryConfig,
    api_base: String,
    live_base: String,
}

impl DouyinApi {
    /// Create a client from the run configuration.
    pub fn new(config: &Config, credentials: Arc<CredentialContext>) -> Result<Self> {
        let timeout = Duration::from_secs(config.network.timeout_secs);

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        let redirect_client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            redirect_client,
            credentials,
            throttle: Throttle::new(config.network.requests_per_second),
            retry: config.retry.clone(),
            api_base: config.network.api_base.trim_end_matches('/').to_string(),
            live_base: config.network.live_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn credentials(&self) -> &Arc<CredentialContext> {
        &self.credentials
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// GET a JSON endpoint with retries.
    async fn get_json(&self, base: &str, path: &str, params: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}{}", base, path);
        with_retry(&self.retry, || self.get_json_once(&url, params)).await
    }

    async fn get_json_once(&self, url: &str, params: &[(&str, String)]) -> Result<Value> {
        self.throttle.acquire().await;

        let request = self
            .client
            .get(url)
            .query(&COMMON_PARAMS)
            .query(params);
        let request = self.credentials.decorate(request).await;

        tracing::debug!("GET {}", url);
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        tracing::debug!(status = %status, bytes = body.len(), "API response");

        if CredentialContext::is_expired(status, &body) {
            return Err(Error::AuthExpired(format!("{} answered HTTP {}", url, status)));
        }
        check_status(status)?;

        serde_json::from_str(&body).map_err(|e| {
            Error::UpstreamSchema(format!(
                "{}: not JSON ({}): {}",
                url,
                e,
                &body[..floor_char_boundary(&body, 200)]
            ))
        })
    }

    /// Fetch a media URL. The caller streams the body.
    ///
    /// Any non-success status is an error: 403/404 become
    /// [`Error::UpstreamRejected`] so callers can move to the next candidate.
    pub async fn fetch_asset(&self, url: &str) -> Result<Response> {
        let request = self.credentials.decorate_asset(self.client.get(url));
        let response = request.send().await?;
        check_status(response.status())?;
        Ok(response)
    }

    async fn resolve_redirect_once(&self, short_url: &str) -> Result<String> {
        let request = self.credentials.decorate_asset(self.redirect_client.get(short_url));
        let response = request.send().await?;
        let status = response.status();

        if status.is_redirection() {
            let location = response
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| Error::RedirectNotFound(short_url.to_string()))?;
            let base = Url::parse(short_url)?;
            return Ok(base.join(location)?.to_string());
        }

        check_status(status)?;
        Err(Error::RedirectNotFound(short_url.to_string()))
    }
}

#[async_trait]
impl ContentSource for DouyinApi {
    async fn resolve_redirect(&self, short_url: &str) -> Result<String> {
        let canonical =
            with_retry(&self.retry, || self.resolve_redirect_once(short_url)).await?;
        tracing::debug!(short_url, canonical = %canonical, "Resolved short link");
        Ok(canonical)
    }

    async fn fetch_item_detail(&self, item_id: &str) -> Result<ContentItem> {
        let value = self
            .get_json(&self.api_base, DETAIL_PATH, &[("aweme_id", item_id.to_string())])
            .await?;

        require_key(&value, "aweme_detail", DETAIL_PATH)?;
        let response: AwemeDetailResponse = parse(value, DETAIL_PATH)?;
        let aweme = response
            .aweme_detail
            .ok_or_else(|| Error::ItemUnavailable(item_id.to_string()))?;

        normalize_aweme(aweme)
    }

    async fn list_page(&self, listing: &Listing, cursor: Option<&str>) -> Result<Page<ContentItem>> {
        let cursor = cursor.unwrap_or("0").to_string();
        let count = PAGE_SIZE.to_string();

        let (path, params) = match listing {
            Listing::UserPosts { sec_uid } => (
                POST_PATH,
                vec![
                    ("sec_user_id", sec_uid.clone()),
                    ("max_cursor", cursor),
                    ("count", count),
                ],
            ),
            Listing::UserLikes { sec_uid } => (
                FAVORITE_PATH,
                vec![
                    ("sec_user_id", sec_uid.clone()),
                    ("max_cursor", cursor),
                    ("count", count),
                ],
            ),
            Listing::Collection { mix_id } => (
                MIX_ITEMS_PATH,
                vec![("mix_id", mix_id.clone()), ("cursor", cursor), ("count", count)],
            ),
            Listing::Music { music_id } => (
                MUSIC_PATH,
                vec![
                    ("music_id", music_id.clone()),
                    ("cursor", cursor),
                    ("count", count),
                ],
            ),
        };

        let value = self.get_json(&self.api_base, path, &params).await?;
        require_key(&value, "aweme_list", path)?;
        let response: AwemeListResponse = parse(value, path)?;

        let next_cursor = if response.has_more {
            response.next_cursor()
        } else {
            None
        };

        let mut items = Vec::new();
        for aweme in response.aweme_list.unwrap_or_default() {
            let id = aweme.aweme_id.clone();
            match normalize_aweme(aweme) {
                Ok(item) => items.push(item),
                Err(e) => tracing::warn!(item_id = %id, listing = %listing, "Skipping item: {}", e),
            }
        }

        Ok(Page {
            items,
            has_more: response.has_more && next_cursor.is_some(),
            next_cursor,
        })
    }

    async fn list_user_mixes(
        &self,
        sec_uid: &str,
        cursor: Option<&str>,
    ) -> Result<Page<MixSummary>> {
        let params = [
            ("sec_user_id", sec_uid.to_string()),
            ("cursor", cursor.unwrap_or("0").to_string()),
            ("count", PAGE_SIZE.to_string()),
        ];
        let value = self.get_json(&self.api_base, MIX_LIST_PATH, &params).await?;
        require_key(&value, "mix_infos", MIX_LIST_PATH)?;
        let response: MixListResponse = parse(value, MIX_LIST_PATH)?;

        let items = response
            .mix_infos
            .unwrap_or_default()
            .into_iter()
            .map(|m| MixSummary {
                mix_id: m.mix_id,
                name: m.mix_name,
            })
            .collect();

        let next_cursor = response.cursor.filter(|_| response.has_more);
        Ok(Page {
            items,
            has_more: next_cursor.is_some(),
            next_cursor,
        })
    }

    async fn fetch_live_snapshot(&self, room_id: &str) -> Result<ContentItem> {
        let params = [
            ("aid", "6383".to_string()),
            ("device_platform", "web".to_string()),
            ("live_id", "1".to_string()),
            ("enter_from", "web_live".to_string()),
            ("web_rid", room_id.to_string()),
        ];
        let value = self.get_json(&self.live_base, LIVE_ENTER_PATH, &params).await?;
        let response: LiveEnterResponse = parse(value, LIVE_ENTER_PATH)?;
        let data = response.data.ok_or_else(|| {
            Error::UpstreamSchema(format!("{}: missing data object", LIVE_ENTER_PATH))
        })?;

        normalize_live(room_id, data, Utc::now())
    }
}

/// Map a response status to the error taxonomy.
fn check_status(status: StatusCode) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(Error::RateLimited);
    }
    if status.is_server_error() {
        return Err(Error::UpstreamServer {
            code: status.as_u16(),
        });
    }
    Err(Error::UpstreamRejected {
        code: status.as_u16(),
    })
}

fn require_key(value: &Value, key: &str, path: &str) -> Result<()> {
    if value.get(key).is_none() {
        return Err(Error::UpstreamSchema(format!("{}: missing '{}'", path, key)));
    }
    Ok(())
}

fn parse<T: DeserializeOwned>(value: Value, path: &str) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::UpstreamSchema(format!("{}: {}", path, e)))
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}
