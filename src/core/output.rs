//! Colored output and progress reporting for recipe runs
//!
//! Uses owo-colors for terminal colors and indicatif for spinners while a
//! backend process is running.

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Enable or disable echoing of spawned command lines
pub fn set_verbose(verbose: bool) {
    VERBOSE.store(verbose, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// Print an action header (blue, bold)
/// Example: "==> Running cpp_template/0.0.1"
pub fn action(message: &str) {
    println!("{} {}", "==>".blue().bold(), message.bold());
}

/// Print a phase header (cyan arrow)
/// Example: "  -> configure"
pub fn phase(name: &str) {
    println!("  {} {}", "->".cyan(), name);
}

/// Print a detail line (dimmed prefix)
/// Example: "     exported 12 files"
pub fn detail(message: &str) {
    println!("     {}", message.dimmed());
}

/// Echo a command line when verbose mode is on
pub fn command(line: &str) {
    if is_verbose() {
        eprintln!("     {} {}", "$".dimmed(), line.dimmed());
    }
}

/// Print a success message (green)
pub fn success(message: &str) {
    println!("{} {}", "==>".green().bold(), message.green());
}

/// Print a warning message (yellow)
pub fn warning(message: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), message.yellow());
}

/// Print an error message (red)
pub fn error(message: &str) {
    eprintln!("{} {}", "error:".red().bold(), message.red());
}

/// Print a skip message (dimmed)
/// Example: "  -> test skipped (cross build, no runner configured)"
pub fn skip(message: &str) {
    println!("  {} {}", "->".dimmed(), message.dimmed());
}

/// Create a spinner shown while an external process runs
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("     {spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Finish a spinner and clear it
pub fn progress_done(pb: ProgressBar) {
    pb.finish_and_clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_creation() {
        let pb = spinner("cmake --build");
        progress_done(pb);
    }

    #[test]
    fn test_verbose_toggle() {
        set_verbose(true);
        assert!(is_verbose());
        set_verbose(false);
        assert!(!is_verbose());
    }
}
