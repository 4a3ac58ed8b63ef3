//! Output module for console output and progress.
//!
//! Provides:
//! - Colored console output
//! - Progress counter
//! - Run summary reporting

pub mod console;
pub mod progress;
pub mod stats;

pub use console::{
    print_banner, print_config_summary, print_error, print_info, print_success, print_warning,
    RunOverview,
};
pub use progress::create_item_counter;
pub use stats::{format_elapsed, print_summary};
