//! Filesystem module.
//!
//! Provides:
//! - Deterministic item and asset paths
//! - Filename sanitizing
//! - Atomic temp-then-rename writes

pub mod atomic;
pub mod naming;
pub mod paths;

pub use atomic::{temp_path_for, write_bytes_atomic, write_stream_atomic};
pub use naming::{
    item_folder_name, sanitize_component, scope_folder_name, truncate_bytes, truncate_chars,
};
pub use paths::ItemLayout;
