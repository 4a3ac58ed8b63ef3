//! douyin-downloader - batch downloader for Douyin content
//!
//! Turns a list of links (single items, user profiles, collections, music
//! pages, live rooms, or pasted share texts) into files on disk.
//!
//! # Features
//!
//! - Link classification, including v.douyin.com short links
//! - Profile posts, likes and collections with per-mode count limits
//! - Incremental runs backed by a SQLite download ledger
//! - Bounded parallel downloads with retries and URL fallbacks
//! - Temp-file-then-rename writes, so interrupted downloads leave no partial files
//! - One automatic credential reload when the login expires
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use douyin_downloader::{Config, Coordinator, CredentialContext, Credentials, DouyinApi};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(Path::new("config.toml"))?;
//!     let credentials = CredentialContext::new(
//!         Credentials::from_cookie_string("msToken=...; ttwid=..."),
//!         config.user_agent.clone(),
//!     );
//!     let api = Arc::new(DouyinApi::new(&config, Arc::new(credentials))?);
//!
//!     let coordinator = Coordinator::from_config(&config, api, None, CancellationToken::new())?;
//!     let report = coordinator.run(&config.link).await?;
//!     println!("{} downloaded", report.summary.succeeded);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod batch;
pub mod cli;
pub mod config;
pub mod dedup;
pub mod download;
pub mod error;
pub mod fs;
pub mod link;
pub mod media;
pub mod output;
pub mod resolve;
pub mod retry;

// Re-exports for convenience
pub use api::{ContentSource, CredentialContext, Credentials, DouyinApi};
pub use batch::{Coordinator, RunReport};
pub use config::{Config, ListingMode};
pub use dedup::Ledger;
pub use download::{BatchSummary, DownloadOutcome, DownloadStatus};
pub use error::{Error, Result};
pub use link::{classify_link, ResolutionTarget, TargetKind};
pub use media::{ContentItem, ItemKind, MediaRole};
