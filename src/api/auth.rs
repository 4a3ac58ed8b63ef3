//! Credentials and request decoration.
//!
//! The [`CredentialContext`] is shared by every concurrent API call of a run.
//! Reads take a cheap snapshot; a refresh swaps the whole credential set at
//! once so no request ever sees half of an old login and half of a new one.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{header, RequestBuilder, StatusCode};
use tokio::sync::{Mutex, RwLock};

use crate::error::{Error, Result};

/// Referer expected by the web API.
const REFERER: &str = "https://www.douyin.com/";

/// `status_code` the web API answers with when the session is not logged in.
const NOT_LOGGED_IN_CODE: i64 = 8;

/// A full set of credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub cookies: BTreeMap<String, String>,
    pub extra_headers: BTreeMap<String, String>,
}

impl Credentials {
    /// Build credentials from a pasted `name=value; name2=value2` string.
    pub fn from_cookie_string(cookie: &str) -> Self {
        Self {
            cookies: parse_cookie_string(cookie),
            extra_headers: BTreeMap::new(),
        }
    }

    pub fn from_cookie_map(cookies: BTreeMap<String, String>) -> Self {
        Self {
            cookies,
            extra_headers: BTreeMap::new(),
        }
    }

    /// Value for the `Cookie` header, if there are any cookies.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.extra_headers.is_empty()
    }
}

/// Parse a cookie string into a map. Pairs without `=` or with an empty name
/// are dropped; later duplicates win.
pub fn parse_cookie_string(cookie: &str) -> BTreeMap<String, String> {
    cookie
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Where credentials come from.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Load the current credential set.
    async fn load(&self) -> Result<Credentials>;

    /// Whether loading again can produce different credentials.
    fn refreshable(&self) -> bool {
        true
    }
}

/// Credentials pasted into the config or passed on the command line.
pub struct StaticCookies(pub Credentials);

#[async_trait]
impl CredentialSource for StaticCookies {
    async fn load(&self) -> Result<Credentials> {
        Ok(self.0.clone())
    }

    fn refreshable(&self) -> bool {
        false
    }
}

/// A cookie file maintained by an external login tool, re-read on refresh.
pub struct CookieFile {
    path: PathBuf,
}

impl CookieFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CredentialSource for CookieFile {
    async fn load(&self) -> Result<Credentials> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::filesystem(&self.path, e))?;
        let credentials = Credentials::from_cookie_string(content.trim());
        if credentials.cookies.is_empty() {
            return Err(Error::MissingConfig(format!(
                "no cookies found in {}",
                self.path.display()
            )));
        }
        Ok(credentials)
    }
}

/// Shared, wholesale-replaceable credentials plus request decoration.
pub struct CredentialContext {
    current: RwLock<Arc<Credentials>>,
    source: Option<Arc<dyn CredentialSource>>,
    refresh_lock: Mutex<u64>,
    user_agent: String,
}

impl CredentialContext {
    /// Create a context from an already-loaded credential set.
    pub fn new(credentials: Credentials, user_agent: impl Into<String>) -> Self {
        Self {
            current: RwLock::new(Arc::new(credentials)),
            source: None,
            refresh_lock: Mutex::new(0),
            user_agent: user_agent.into(),
        }
    }

    /// Load credentials from `source` and keep it for later refreshes.
    pub async fn from_source(
        source: Arc<dyn CredentialSource>,
        user_agent: impl Into<String>,
    ) -> Result<Self> {
        let credentials = source.load().await?;
        Ok(Self {
            current: RwLock::new(Arc::new(credentials)),
            source: Some(source),
            refresh_lock: Mutex::new(0),
            user_agent: user_agent.into(),
        })
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Snapshot of the current credentials.
    pub async fn snapshot(&self) -> Arc<Credentials> {
        self.current.read().await.clone()
    }

    /// Number of successful refreshes so far.
    pub async fn generation(&self) -> u64 {
        *self.refresh_lock.lock().await
    }

    /// Whether a refresh could yield new credentials.
    pub fn can_refresh(&self) -> bool {
        self.source.as_ref().is_some_and(|s| s.refreshable())
    }

    /// Reload credentials from the source and replace the current set.
    ///
    /// `seen_generation` is the generation the caller observed when it hit the
    /// expiry; if another task already refreshed since then, this returns
    /// `true` without loading again. Returns `false` when there is nothing to
    /// refresh from.
    pub async fn refresh(&self, seen_generation: u64) -> Result<bool> {
        let Some(source) = self.source.as_ref().filter(|s| s.refreshable()) else {
            return Ok(false);
        };

        let mut generation = self.refresh_lock.lock().await;
        if *generation != seen_generation {
            return Ok(true);
        }

        let fresh = source.load().await?;
        *self.current.write().await = Arc::new(fresh);
        *generation += 1;
        tracing::info!(generation = *generation, "Credentials refreshed");
        Ok(true)
    }

    /// Decorate an API request with cookies, headers and anti-bot parameters.
    pub async fn decorate(&self, request: RequestBuilder) -> RequestBuilder {
        let credentials = self.snapshot().await;

        let mut request = request
            .header(header::USER_AGENT, &self.user_agent)
            .header(header::REFERER, REFERER)
            .header(header::ACCEPT, "application/json, text/plain, */*");

        if let Some(cookie) = credentials.cookie_header() {
            request = request.header(header::COOKIE, cookie);
        }

        for (name, value) in &credentials.extra_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let mut params: Vec<(&str, &str)> = Vec::new();
        if let Some(token) = credentials.cookies.get("msToken") {
            params.push(("msToken", token));
        }
        if let Some(fp) = credentials.cookies.get("s_v_web_id") {
            params.push(("verifyFp", fp));
            params.push(("fp", fp));
        }
        if !params.is_empty() {
            request = request.query(&params);
        }

        request
    }

    /// Decorate a media download. CDNs reject the API referer, so only the
    /// user agent is sent.
    pub fn decorate_asset(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(header::USER_AGENT, &self.user_agent)
    }

    /// Whether a response means the login is no longer valid.
    pub fn is_expired(status: StatusCode, body: &str) -> bool {
        if status == StatusCode::UNAUTHORIZED {
            return true;
        }

        if status == StatusCode::OK {
            if body.trim().is_empty() {
                return true;
            }
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
                return value.get("status_code").and_then(|c| c.as_i64())
                    == Some(NOT_LOGGED_IN_CODE);
            }
        }

        false
    }
}
