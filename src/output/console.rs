//! Console output utilities.

use std::path::Path;

use console::style;

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", style("INFO").cyan().bold(), message);
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", style("OK").green().bold(), message);
}

/// Print a warning message.
pub fn print_warning(message: &str) {
    println!("{} {}", style("WARN").yellow().bold(), message);
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", style("ERROR").red().bold(), message);
}

/// Print the application banner.
pub fn print_banner() {
    let banner = r#"
╔═══════════════════════════════════════════════════════╗
║     douyin-downloader                                 ║
║     videos, image sets, music and live snapshots      ║
╚═══════════════════════════════════════════════════════╝
"#;
    println!("{}", style(banner).cyan());
}

/// What a run is about to do.
pub struct RunOverview<'a> {
    pub links: usize,
    pub modes: &'a str,
    pub output: &'a Path,
    pub workers: usize,
    pub ledger: Option<&'a Path>,
}

/// Print configuration summary.
pub fn print_config_summary(overview: &RunOverview<'_>) {
    println!();
    println!("{}", style("Configuration:").bold());
    println!("  Links:     {}", overview.links);
    println!("  Modes:     {}", overview.modes);
    println!("  Directory: {}", overview.output.display());
    println!("  Workers:   {}", overview.workers);
    match overview.ledger {
        Some(path) => println!("  Ledger:    {}", path.display()),
        None => println!("  Ledger:    {}", style("disabled").dim()),
    }
    println!();
}
