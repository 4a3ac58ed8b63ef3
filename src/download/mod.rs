//! Download module for item fetching.
//!
//! This module provides:
//! - The bounded worker pool shared by all targets of a run
//! - Per-item asset fetching with retries and URL fallbacks
//! - Download outcomes and the batch summary

pub mod dispatcher;
pub mod item;
pub mod outcome;

pub use dispatcher::Dispatcher;
pub use item::{download_item, fetch_asset, DownloadOptions};
pub use outcome::{BatchSummary, DownloadOutcome, DownloadStatus, TargetFailure};
