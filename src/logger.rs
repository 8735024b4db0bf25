//! Logging utilities with colored output.
//!
//! This module provides:
//! - `log!` macro for formatted terminal output with colored prefixes
//! - `summary` for the one-line outcome printed after each conversion pass
//!
//! # Example
//!
//! ```ignore
//! log!("html"; "compiling {} files", count);
//! log!("error"; "{}: {:#}", path.display(), err);
//! ```

use colored::{ColoredString, Colorize};
use crossterm::{
    execute,
    terminal::{Clear, ClearType, size},
    tty::IsTty,
};
use std::{
    io::{Write, stdout},
    sync::OnceLock,
};

/// Cached terminal width (fetched once on first use), `None` when piped
static TERMINAL_WIDTH: OnceLock<Option<u16>> = OnceLock::new();

/// Length of brackets around module name: "[]"
const BRACKET_LEN: usize = 2;
/// Space after prefix: "[module] " <- this space
const SPACE_AFTER_PREFIX: usize = 1;

/// Calculate total prefix length for a module name.
#[inline]
const fn calc_prefix_len(module_len: usize) -> usize {
    module_len + BRACKET_LEN + SPACE_AFTER_PREFIX
}

/// Get terminal width, cached after first call.
///
/// `None` when stdout is not a terminal; falls back to 120 columns if
/// detection fails on a terminal.
fn get_terminal_width() -> Option<u16> {
    *TERMINAL_WIDTH
        .get_or_init(|| stdout().is_tty().then(|| size().map(|(w, _)| w).unwrap_or(120)))
}

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix.
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a message with a colored module prefix.
///
/// On a terminal, single-line progress messages are truncated to its width.
/// Errors, warnings, multiline messages and piped output are printed in full.
#[inline]
pub fn log(module: &str, message: &str) {
    let module_lower = module.to_ascii_lowercase();
    let prefix = colorize_prefix(module, &module_lower);
    let width = get_terminal_width();

    let mut stdout = stdout().lock();
    if width.is_some() {
        execute!(stdout, Clear(ClearType::UntilNewLine)).ok();
    }

    writeln!(stdout, "{prefix} {}", fit_message(&module_lower, message, width)).ok();
    stdout.flush().ok();
}

/// The part of `message` that is printed after the `[module]` prefix.
fn fit_message<'a>(module_lower: &str, message: &'a str, width: Option<u16>) -> &'a str {
    match width {
        Some(width) if !message.contains('\n') && !is_diagnostic(module_lower) => {
            let max_msg_len = (width as usize).saturating_sub(calc_prefix_len(module_lower.len()));
            truncate_str(message, max_msg_len)
        }
        _ => message,
    }
}

/// Modules whose messages carry causes and must never be cut.
#[inline]
fn is_diagnostic(module_lower: &str) -> bool {
    matches!(module_lower, "error" | "warn")
}

/// Print the closing line of a pass: green when nothing failed, red otherwise.
pub fn summary(module: &str, ok: bool, message: &str) {
    let message = if ok {
        message.green().to_string()
    } else {
        message.red().to_string()
    };
    log(module, &message);
}

/// Apply color to a module prefix based on module type.
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> ColoredString {
    let prefix = format!("[{module}]");
    match module_lower {
        "serve" => prefix.bright_blue().bold(),
        "clean" => prefix.bright_green().bold(),
        "warn" => prefix.bright_magenta().bold(),
        "error" => prefix.bright_red().bold(),
        _ => prefix.bright_yellow().bold(),
    }
}

/// Truncate a string to fit within `max_len` bytes.
///
/// Ensures the result is valid UTF-8 by finding the nearest character boundary.
#[inline]
fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calc_prefix_len() {
        // "html" -> "[html] " = 4 + 2 + 1
        assert_eq!(calc_prefix_len(4), 7);
        assert_eq!(calc_prefix_len(0), 3);
    }

    #[test]
    fn test_fit_message_truncates_progress() {
        // "[html] " leaves 13 columns
        assert_eq!(fit_message("html", "posts/a-very-long-name.md", Some(20)), "posts/a-very-");
        assert_eq!(fit_message("html", "short.md", Some(20)), "short.md");
    }

    #[test]
    fn test_fit_message_keeps_long_errors() {
        let message = "posts/2024/another-rather-long-post-name.md: Failed to render `base.html`: \
                       undefined value (in base.html:12)";
        assert_eq!(fit_message("error", message, Some(40)), message);
        assert_eq!(fit_message("warn", message, Some(40)), message);
    }

    #[test]
    fn test_fit_message_full_when_piped() {
        let message = "x".repeat(500);
        assert_eq!(fit_message("html", &message, None), message);
        assert_eq!(fit_message("html", "line one\nline two", Some(10)), "line one\nline two");
    }

    #[test]
    fn test_truncate_str_fits() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello", 5), "hello");
    }

    #[test]
    fn test_truncate_str_cuts() {
        assert_eq!(truncate_str("hello world", 5), "hello");
        assert_eq!(truncate_str("hello", 0), "");
    }

    #[test]
    fn test_truncate_str_unicode_boundary() {
        // "构建" is 6 bytes; byte 4 is inside the second char
        assert_eq!(truncate_str("构建", 4), "构");
        assert_eq!(truncate_str("a构b", 3), "a");
    }
}
