//! Deduplication module.
//!
//! Provides:
//! - The persistent download ledger, keyed by listing scope and item ID

pub mod ledger;

pub use ledger::Ledger;

/// Ledger scope for items fetched from a single-item link.
pub const SINGLE_SCOPE: &str = "single";

/// Ledger scope for a live room.
pub fn live_scope(room_id: &str) -> String {
    format!("live:{}", room_id)
}
