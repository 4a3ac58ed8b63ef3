//! Douyin API module.
//!
//! This module provides:
//! - HTTP client for the Douyin web and live APIs
//! - Credential handling and request decoration
//! - Request throttling
//! - API response types

pub mod auth;
pub mod client;
pub mod source;
pub mod throttle;
pub mod types;

pub use auth::{CookieFile, CredentialContext, CredentialSource, Credentials, StaticCookies};
pub use client::{DouyinApi, PAGE_SIZE};
pub use source::{ContentSource, Listing, MixSummary, Page};
pub use throttle::Throttle;
