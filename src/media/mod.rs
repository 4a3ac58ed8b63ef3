//! Media module for item representation and normalization.

pub mod item;
pub mod parser;

pub use item::{ContentItem, ItemKind, MediaAsset, MediaRole, ResolvedItem};
pub use parser::{normalize_aweme, normalize_live, rank_by_quality, upgrade_video_url};
