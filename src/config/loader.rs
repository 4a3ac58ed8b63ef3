//! Configuration structures and loading logic.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::modes::{IncrementStrategy, ListingMode, ModeFlags, ModeLimits};
use crate::error::{Error, Result};

/// Default web API host.
pub const DEFAULT_API_BASE: &str = "https://www.douyin.com";

/// Default live API host.
pub const DEFAULT_LIVE_BASE: &str = "https://live.douyin.com";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Links to download.
    #[serde(alias = "links")]
    pub link: Vec<String>,

    /// Output root directory.
    #[serde(alias = "output_dir")]
    pub path: PathBuf,

    /// Download the background music of video items.
    pub music: bool,

    /// Download cover images.
    pub cover: bool,

    /// Download the author's avatar.
    pub avatar: bool,

    /// Write a JSON metadata sidecar per item.
    pub json: bool,

    /// Profile listings to download for user links.
    pub mode: Vec<ListingMode>,

    /// Per-mode count limits (0 = unbounded).
    pub number: ModeLimits,

    /// Per-mode incremental switches.
    #[serde(alias = "increase")]
    pub increment: ModeFlags,

    /// What incremental mode does on an already-downloaded item.
    pub increment_strategy: IncrementStrategy,

    /// Enable the download ledger.
    pub database: bool,

    /// Ledger location. Defaults to the platform data directory.
    pub database_path: Option<PathBuf>,

    /// Worker count.
    pub thread: usize,

    /// Cookies, either as a raw `a=1; b=2` string or a table.
    #[serde(alias = "cookie")]
    pub cookies: Option<CookieSetting>,

    /// Cookie file kept up to date by an external login tool.
    pub cookie_file: Option<PathBuf>,

    /// Read cookies from `cookie_file` and re-read it when the login expires.
    pub auto_cookie: bool,

    /// Browser user agent string.
    pub user_agent: String,

    /// Only download items created on or after this date (YYYY-MM-DD).
    pub start_time: Option<String>,

    /// Only download items created on or before this date (YYYY-MM-DD).
    pub end_time: Option<String>,

    /// Skip items already in the ledger even when incremental mode is off.
    pub skip_existing: bool,

    /// Exit non-zero when any item failed.
    pub fail_on_item_error: bool,

    /// Seconds in-flight downloads get to finish after cancellation.
    pub grace_period_secs: u64,

    pub retry: RetryConfig,

    pub network: NetworkConfig,
}

/// Cookie configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CookieSetting {
    Raw(String),
    Map(BTreeMap<String, String>),
}

impl CookieSetting {
    /// `cookies = "auto"` is shorthand for `auto_cookie = true`.
    pub fn is_auto(&self) -> bool {
        matches!(self, CookieSetting::Raw(s) if s.trim().eq_ignore_ascii_case("auto"))
    }
}

/// Retry policy for API calls and asset downloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub attempts: u32,

    /// Delay before the second attempt.
    pub initial_delay_ms: u64,

    /// Upper bound for any single delay.
    pub max_delay_ms: u64,

    /// Multiplier applied to the delay after each failed attempt.
    pub multiplier: f64,

    /// Add up to 100% random jitter to each delay.
    pub jitter: bool,
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 10_000,
            multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Upstream connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// API requests per second (0 disables throttling).
    pub requests_per_second: f64,

    /// Per-request timeout.
    pub timeout_secs: u64,

    /// Web API base URL.
    pub api_base: String,

    /// Live API base URL.
    pub live_base: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 2.0,
            timeout_secs: 30,
            api_base: DEFAULT_API_BASE.to_string(),
            live_base: DEFAULT_LIVE_BASE.to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            link: Vec::new(),
            path: PathBuf::from("./Downloaded"),
            music: true,
            cover: true,
            avatar: false,
            json: true,
            mode: vec![ListingMode::Post],
            number: ModeLimits::default(),
            increment: ModeFlags::default(),
            increment_strategy: IncrementStrategy::default(),
            database: true,
            database_path: None,
            thread: 5,
            cookies: None,
            cookie_file: None,
            auto_cookie: false,
            user_agent: default_user_agent(),
            start_time: None,
            end_time: None,
            skip_existing: true,
            fail_on_item_error: false,
            grace_period_secs: 10,
            retry: RetryConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Config(format!(
                    "Configuration file not found: {}. Create one from config.example.toml",
                    path.display()
                ))
            } else {
                Error::Io(e)
            }
        })?;

        let mut config: Config = toml::from_str(&content)?;
        config.normalize();
        Ok(config)
    }

    /// Fold shorthand settings into their canonical form.
    pub fn normalize(&mut self) {
        if self.cookies.as_ref().is_some_and(CookieSetting::is_auto) {
            self.cookies = None;
            self.auto_cookie = true;
        }
    }

    /// Ledger file location.
    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = &self.database_path {
            return path.clone();
        }
        directories::ProjectDirs::from("", "", "douyin-downloader")
            .map(|dirs| dirs.data_dir().join("ledger.sqlite3"))
            .unwrap_or_else(|| self.path.join(".ledger.sqlite3"))
    }

    /// Cookie file location used by `auto_cookie`.
    pub fn cookie_file_path(&self) -> PathBuf {
        self.cookie_file
            .clone()
            .unwrap_or_else(|| PathBuf::from("cookies.txt"))
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}
