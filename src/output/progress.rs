//! Progress bar utilities.

use indicatif::{ProgressBar, ProgressStyle};

/// Counter of finished items. The total is unknown while listings are
/// still being paginated, so this is a spinner with a position.
pub fn create_item_counter(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.green} {msg} {pos} items [{elapsed}]")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    bar.set_style(style);
    bar.set_message(message.to_string());
    bar.enable_steady_tick(std::time::Duration::from_millis(120));
    bar
}
