//! Timestamped progress lines on stdout.
//!
//! `log!("build"; "{} entries", n)` always prints; `debug!` prints only when
//! the site config sets `debug = true`.

use chrono::Local;
use colored::{Color, ColoredString, Colorize};
use std::{
    io::{Write, stdout},
    sync::atomic::{AtomicBool, Ordering},
};

/// Whether `debug!` lines are printed
static DEBUG: AtomicBool = AtomicBool::new(false);

/// Timestamp layout used for every line (RFC 822 style)
const TIMESTAMP_FORMAT: &str = "%d %b %y %H:%M %Z";

// ============================================================================
// Macros
// ============================================================================

/// Print `<timestamp> [module] message`.
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Like `log!`, but silent unless debug output is enabled.
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::debug_enabled() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// Output
// ============================================================================

/// Enable or disable `debug!` output.
pub fn set_debug(enabled: bool) {
    DEBUG.store(enabled, Ordering::Relaxed);
}

#[inline]
pub fn debug_enabled() -> bool {
    DEBUG.load(Ordering::Relaxed)
}

/// Print one log line to stdout.
pub fn log(module: &str, message: &str) {
    let line = format_line(&timestamp(), module, message);
    let mut stdout = stdout().lock();
    writeln!(stdout, "{line}").ok();
    stdout.flush().ok();
}

fn timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

fn format_line(timestamp: &str, module: &str, message: &str) -> String {
    format!("{timestamp} {} {message}", prefix(module))
}

fn prefix(module: &str) -> ColoredString {
    let color = match module.to_ascii_lowercase().as_str() {
        "serve" | "preview" => Color::BrightBlue,
        "error" => Color::BrightRed,
        "done" => Color::BrightGreen,
        _ => Color::BrightYellow,
    };
    format!("[{module}]").color(color).bold()
}
