//! Command-line argument definitions using clap.

use clap::Parser;
use std::path::PathBuf;

use crate::config::{Config, CookieSetting, IncrementStrategy, ListingMode};

/// Douyin batch downloader CLI.
#[derive(Parser, Debug)]
#[command(
    name = "douyin-downloader",
    version,
    about = "Batch-download videos, image sets, music and live snapshots from Douyin",
    long_about = "Download everything behind one or more Douyin links: single items, \
                  user profiles (posts, likes, collections), collections, music pages \
                  and live rooms.\n\n\
                  Links can be canonical page URLs, v.douyin.com short links, or whole \
                  share texts pasted from the app."
)]
pub struct Args {
    /// Links to download. Replaces the links from the config file.
    pub links: Vec<String>,

    /// Path to configuration file.
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output directory.
    #[arg(short = 'p', long = "path")]
    pub path: Option<PathBuf>,

    /// Profile listings to download, comma separated (post, like, mix).
    #[arg(short, long, value_delimiter = ',')]
    pub mode: Option<Vec<ListingMode>>,

    /// Number of parallel downloads.
    #[arg(short = 't', long = "thread")]
    pub thread: Option<usize>,

    /// Cookie string (`name=value; name2=value2`).
    #[arg(long, env = "DOUYIN_COOKIES", hide_env_values = true)]
    pub cookies: Option<String>,

    /// Cookie file written by an external login tool; re-read when the login expires.
    #[arg(long = "cookie-file", env = "DOUYIN_COOKIE_FILE")]
    pub cookie_file: Option<PathBuf>,

    /// Browser user agent string.
    #[arg(short = 'a', long = "user-agent", env = "DOUYIN_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Only download items created on or after this date (YYYY-MM-DD).
    #[arg(long)]
    pub start_time: Option<String>,

    /// Only download items created on or before this date (YYYY-MM-DD).
    #[arg(long)]
    pub end_time: Option<String>,

    /// Stop each selected listing at the first already-downloaded item.
    #[arg(short, long)]
    pub increment: bool,

    /// What incremental mode does on an already-downloaded item.
    #[arg(long, value_parser = parse_strategy)]
    pub increment_strategy: Option<IncrementStrategy>,

    /// Don't download background music.
    #[arg(long)]
    pub no_music: bool,

    /// Don't download cover images.
    #[arg(long)]
    pub no_cover: bool,

    /// Download author avatars.
    #[arg(long)]
    pub avatar: bool,

    /// Don't write JSON metadata sidecars.
    #[arg(long)]
    pub no_json: bool,

    /// Disable the download ledger.
    #[arg(long)]
    pub no_database: bool,

    /// Download items again even if the ledger has them.
    #[arg(long)]
    pub force: bool,

    /// Exit non-zero when any item failed.
    #[arg(long)]
    pub fail_on_item_error: bool,

    /// Hide the progress counter.
    #[arg(long, short)]
    pub quiet: bool,

    /// Enable debug logging.
    #[arg(long)]
    pub debug: bool,
}

fn parse_strategy(value: &str) -> std::result::Result<IncrementStrategy, String> {
    match value.to_lowercase().as_str() {
        "stop" => Ok(IncrementStrategy::Stop),
        "filter" => Ok(IncrementStrategy::Filter),
        other => Err(format!("unknown strategy '{}', expected stop or filter", other)),
    }
}

impl Args {
    /// Merge CLI arguments into an existing config, overriding where specified.
    pub fn merge_into_config(self, config: &mut Config) {
        if !self.links.is_empty() {
            config.link = self.links;
        }

        if let Some(path) = self.path {
            config.path = path;
        }

        if let Some(mode) = self.mode {
            config.mode = mode;
        }

        if let Some(thread) = self.thread {
            config.thread = thread;
        }

        if let Some(cookies) = self.cookies {
            config.cookies = Some(CookieSetting::Raw(cookies));
        }

        if let Some(cookie_file) = self.cookie_file {
            config.cookie_file = Some(cookie_file);
            config.auto_cookie = true;
        }

        if let Some(user_agent) = self.user_agent {
            config.user_agent = user_agent;
        }

        if let Some(start) = self.start_time {
            config.start_time = Some(start);
        }

        if let Some(end) = self.end_time {
            config.end_time = Some(end);
        }

        // Boolean flags only override when set
        if self.increment {
            for mode in &config.mode {
                match mode {
                    ListingMode::Post => config.increment.post = true,
                    ListingMode::Like => config.increment.like = true,
                    ListingMode::Mix => config.increment.mix = true,
                    ListingMode::Music => config.increment.music = true,
                }
            }
            // Music pages are not a profile mode but still paginate.
            config.increment.music = true;
        }

        if let Some(strategy) = self.increment_strategy {
            config.increment_strategy = strategy;
        }

        if self.no_music {
            config.music = false;
        }

        if self.no_cover {
            config.cover = false;
        }

        if self.avatar {
            config.avatar = true;
        }

        if self.no_json {
            config.json = false;
        }

        if self.no_database {
            config.database = false;
        }

        if self.force {
            config.skip_existing = false;
        }

        if self.fail_on_item_error {
            config.fail_on_item_error = true;
        }

        config.normalize();
    }
}
