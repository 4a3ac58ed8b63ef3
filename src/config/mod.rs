//! Configuration module for the douyin-downloader.
//!
//! This module handles:
//! - Loading configuration from TOML files
//! - Listing modes and per-mode limits
//! - Configuration validation

pub mod loader;
pub mod modes;
pub mod validation;

pub use loader::{CookieSetting, Config, NetworkConfig, RetryConfig};
pub use modes::{IncrementStrategy, ListingMode, ModeFlags, ModeLimits};
pub use validation::{parse_date, validate_config};
