//! External command execution utilities.
//!
//! Provides the `exec!` macro for running the typst compiler (or any other
//! tool) with captured output and error reporting that carries the tool's
//! own diagnostics.

use crate::log;
use anyhow::{Context, Result};
use regex::Regex;
use std::{
    ffi::OsString,
    path::Path,
    process::{Command, Output},
    sync::OnceLock,
};

// ============================================================================
// Macros
// ============================================================================

/// Run an external command in `root` with a stderr filter.
///
/// # Examples
/// ```ignore
/// const MY_FILTER: FilterRule = FilterRule::new(&["warning:"]);
/// exec!(filter=&MY_FILTER; root; &config.build.typst.command; "compile", input, "-")?;
/// ```
#[macro_export]
macro_rules! exec {
    (filter=$filter:expr; $root:expr; $cmd:expr; $($arg:expr),* $(,)?) => {
        $crate::utils::exec::exec(
            $root,
            &$crate::utils::exec::internal::to_cmd_vec($cmd),
            &$crate::utils::exec::internal::filter_args(&[$($crate::utils::exec::internal::to_os($arg)),*]),
            $filter,
        )
    };
}

// ============================================================================
// Argument Conversion
// ============================================================================

#[doc(hidden)]
pub mod internal {
    use std::ffi::OsString;

    /// Convert to `OsString`.
    #[inline]
    pub fn to_os<S: Into<OsString>>(s: S) -> OsString {
        s.into()
    }

    /// Convert a configured command to `Vec<OsString>`.
    #[inline]
    pub fn to_cmd_vec(cmd: &[String]) -> Vec<OsString> {
        cmd.iter().map(OsString::from).collect()
    }

    /// Filter out empty args.
    #[inline]
    pub fn filter_args(args: &[OsString]) -> Vec<OsString> {
        args.iter().filter(|a| !a.is_empty()).cloned().collect()
    }
}

// ============================================================================
// Command Execution
// ============================================================================

/// Execute a command and capture its output.
///
/// # Errors
/// Returns error if command fails to execute or returns non-zero exit code.
/// The error message carries the command's stderr.
pub fn exec(
    root: &Path,
    cmd: &[OsString],
    args: &[OsString],
    filter: &'static FilterRule,
) -> Result<Output> {
    let (name, mut command) = prepare(root, cmd, args)?;

    let output = command
        .output()
        .with_context(|| format!("Failed to execute `{name}`"))?;

    log_output(&name, &output, filter)?;
    Ok(output)
}

/// Prepare a Command from components.
fn prepare(root: &Path, cmd: &[OsString], args: &[OsString]) -> Result<(String, Command)> {
    let (program, leading) = cmd.split_first().context("Empty command")?;
    let name = program.to_string_lossy().into_owned();

    let mut command = Command::new(program);
    command.args(leading).args(args).current_dir(root);

    Ok((name, command))
}

// ============================================================================
// Output Filtering
// ============================================================================

fn strip_ansi(s: &str) -> std::borrow::Cow<'_, str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*m").unwrap());
    re.replace_all(s, "")
}

/// Filter rule for skipping known noise in command output.
pub struct FilterRule {
    /// Prefixes to match at the start of output lines.
    pub skip_prefixes: &'static [&'static str],
}

impl FilterRule {
    /// Create a new filter rule with the given prefixes.
    pub const fn new(skip_prefixes: &'static [&'static str]) -> Self {
        Self { skip_prefixes }
    }

    /// Returns true if output is empty or starts with any of the skip prefixes.
    fn should_skip(&self, output: &str) -> bool {
        output.is_empty() || self.skip_prefixes.iter().any(|p| output.starts_with(p))
    }

    /// Log the lines that survive the filter under the command's name.
    fn log(&self, name: &str, output: &str) {
        let valid_lines: Vec<_> = output
            .lines()
            .filter(|line| !self.should_skip(strip_ansi(line).trim()))
            .collect();

        if !valid_lines.is_empty() {
            log!(name; "{}", valid_lines.join("\n"));
        }
    }
}

/// Stdout filter: skip HTML and PDF payloads.
const STDOUT_FILTER: FilterRule = FilterRule::new(&["<!DOCTYPE", "<html", "%PDF"]);

/// Log command output, filtering known noise.
fn log_output(name: &str, output: &Output, filter: &'static FilterRule) -> Result<()> {
    if !output.status.success() {
        anyhow::bail!(format_error(name, output, filter));
    }

    // On success, only log stderr (warnings) to reduce noise
    let stderr = String::from_utf8_lossy(&output.stderr);
    filter.log(name, stderr.trim());

    Ok(())
}

/// Format command error message with filtering.
fn format_error(name: &str, output: &Output, filter: &'static FilterRule) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);

    let error_msg = filter
        .skip_prefixes
        .iter()
        .fold(stderr.trim(), |s, p| s.trim_start_matches(p).trim_start());

    let mut msg = format!("Command `{name}` failed with {}\n", output.status);
    if !error_msg.is_empty() {
        msg.push_str(error_msg);
    }

    let stdout_trimmed = stdout.trim();
    if !stdout_trimmed.is_empty() && !STDOUT_FILTER.should_skip(stdout_trimmed) {
        msg.push_str("\nStdout:\n");
        msg.push_str(stdout_trimmed);
    }
    msg
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::internal::*;
    use super::*;
    use tempfile::TempDir;

    const NO_FILTER: FilterRule = FilterRule::new(&[]);

    fn command(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_to_cmd_vec() {
        let cmd = to_cmd_vec(&command(&["uvx", "livereload"]));
        assert_eq!(cmd, vec![OsString::from("uvx"), OsString::from("livereload")]);
    }

    #[test]
    fn test_filter_args() {
        let args = [OsString::from("a"), OsString::from(""), OsString::from("b")];
        assert_eq!(
            filter_args(&args),
            vec![OsString::from("a"), OsString::from("b")]
        );
    }

    #[test]
    fn test_prepare_empty() {
        assert!(prepare(Path::new("."), &[], &[]).is_err());
    }

    #[test]
    fn test_filter_rule() {
        let filter = FilterRule::new(&["warning:"]);
        assert!(filter.should_skip("warning: html export is under active development"));
        assert!(!filter.should_skip("error: unknown variable"));
        assert!(filter.should_skip(""));
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[31mRed\x1b[0m"), "Red");
        assert_eq!(strip_ansi("Plain text"), "Plain text");
    }

    #[test]
    fn test_exec_captures_stdout_in_root() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("page.txt"), "hello").unwrap();

        let output =
            crate::exec!(filter=&NO_FILTER; dir.path(); &command(&["cat"]); "page.txt").unwrap();
        assert_eq!(output.stdout, b"hello");
    }

    #[test]
    fn test_exec_failure_carries_stderr() {
        let dir = TempDir::new().unwrap();
        let err = crate::exec!(
            filter=&NO_FILTER;
            dir.path();
            &command(&["sh"]);
            "-c", "echo 'error: unexpected token' >&2; exit 3"
        )
        .unwrap_err();
        let msg = format!("{err}");

        assert!(msg.contains("Command `sh` failed"));
        assert!(msg.contains("error: unexpected token"));
    }

    #[test]
    fn test_exec_missing_program() {
        let dir = TempDir::new().unwrap();
        let result = crate::exec!(
            filter=&NO_FILTER;
            dir.path();
            &command(&["tufted-no-such-program"]);
            "--version"
        );
        assert!(result.is_err());
    }
}
