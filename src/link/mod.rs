//! Link classification module.
//!
//! Provides:
//! - Target kinds and classified targets
//! - Pure link classification (including share text and short links)

pub mod classify;
pub mod target;

pub use classify::{classify_link, classify_redirected, extract_url};
pub use target::{LinkClass, ResolutionTarget, TargetKind};
