//! Run summary reporting.

use std::time::Duration;

use console::style;

use crate::download::BatchSummary;

/// Print the end-of-run report, including every failure with its reason.
pub fn print_summary(summary: &BatchSummary, elapsed: Duration) {
    println!();
    println!("{}", style("═".repeat(50)).dim());
    println!("{}", style("Summary:").bold());
    println!("  Total:     {}", summary.total);
    println!("  Succeeded: {}", style(summary.succeeded).green());
    println!("  Skipped:   {}", style(summary.skipped).yellow());
    if summary.failed > 0 {
        println!("  Failed:    {}", style(summary.failed).red());
    } else {
        println!("  Failed:    0");
    }
    println!("  Success:   {:.1}%", summary.success_rate());
    println!("  Elapsed:   {}", format_elapsed(elapsed));

    if !summary.target_failures.is_empty() {
        println!();
        println!("{}", style("Failed links:").bold());
        for failure in &summary.target_failures {
            println!("  {} {}", style(&failure.link).red(), failure.reason);
        }
    }

    if summary.failed > 0 {
        println!();
        println!("{}", style("Failed items:").bold());
        for outcome in summary.failures() {
            println!(
                "  {} [{}] {}",
                style(&outcome.item_id).red(),
                outcome.scope,
                outcome.failure_reason.as_deref().unwrap_or("unknown error")
            );
        }
    }

    println!("{}", style("═".repeat(50)).dim());
}

/// `1h 02m 03s`, `4m 05s` or `6.1s`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    match secs {
        0..=59 => format!("{:.1}s", elapsed.as_secs_f64()),
        60..=3599 => format!("{}m {:02}s", secs / 60, secs % 60),
        _ => format!("{}h {:02}m {:02}s", secs / 3600, secs % 3600 / 60, secs % 60),
    }
}
