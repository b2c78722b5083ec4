//! External command execution utilities.
//!
//! Two flavors: quiet capture for plumbing commands whose stdout the
//! caller parses (git), and streamed execution for long-running tools
//! whose progress should reach the terminal (tippecanoe, wrangler).

use crate::util::cancel;
use anyhow::{Context, Result};
use std::{
    ffi::OsString,
    path::Path,
    process::{Command, Output, Stdio},
    time::Duration,
};

// ============================================================================
// Macros
// ============================================================================

/// Run an external command quietly, capturing its output.
///
/// Non-zero exit becomes an error carrying the trimmed stderr.
///
/// # Examples
/// ```ignore
/// let output = exec_quiet!(["git", "diff", "--name-only"]; pathspec)?;
/// ```
#[macro_export]
macro_rules! exec_quiet {
    ($cmd:expr; $($arg:expr),* $(,)?) => {{
        $crate::util::exec::exec_quiet(
            None,
            &$crate::util::exec::to_cmd_vec($cmd),
            &$crate::util::exec::filter_args(&[$($crate::util::exec::to_os($arg)),*]),
        )
    }};
    ($root:expr; $cmd:expr; $($arg:expr),* $(,)?) => {{
        $crate::util::exec::exec_quiet(
            Some($root),
            &$crate::util::exec::to_cmd_vec($cmd),
            &$crate::util::exec::filter_args(&[$($crate::util::exec::to_os($arg)),*]),
        )
    }};
}

/// Run a long external command with inherited stdio.
///
/// The child's output streams straight to the terminal; the child is
/// killed if cancellation is requested while it runs.
#[macro_export]
macro_rules! exec_streamed {
    ($cmd:expr; $($arg:expr),* $(,)?) => {{
        $crate::util::exec::exec_streamed(
            None,
            &$crate::util::exec::to_cmd_vec($cmd),
            &$crate::util::exec::filter_args(&[$($crate::util::exec::to_os($arg)),*]),
        )
    }};
}

// ============================================================================
// Argument Conversion
// ============================================================================

/// Convert to OsString.
#[inline]
pub fn to_os<S: Into<OsString>>(s: S) -> OsString {
    s.into()
}

/// Trait for converting to command vector.
pub trait ToCmd {
    fn to_cmd(self) -> Vec<OsString>;
}

impl<const N: usize> ToCmd for [&str; N] {
    #[inline]
    fn to_cmd(self) -> Vec<OsString> {
        self.into_iter().map(OsString::from).collect()
    }
}

impl ToCmd for &[String] {
    #[inline]
    fn to_cmd(self) -> Vec<OsString> {
        self.iter().map(OsString::from).collect()
    }
}

impl ToCmd for &Vec<String> {
    #[inline]
    fn to_cmd(self) -> Vec<OsString> {
        self.iter().map(OsString::from).collect()
    }
}

/// Convert command to Vec<OsString>.
#[inline]
pub fn to_cmd_vec<C: ToCmd>(cmd: C) -> Vec<OsString> {
    cmd.to_cmd()
}

/// Filter out empty args.
#[inline]
pub fn filter_args(args: &[OsString]) -> Vec<OsString> {
    args.iter().filter(|a| !a.is_empty()).cloned().collect()
}

// ============================================================================
// Command Execution
// ============================================================================

/// Execute a command and capture its output without logging.
///
/// # Errors
/// Returns error if command fails to execute or returns non-zero exit code.
pub fn exec_quiet(root: Option<&Path>, cmd: &[OsString], args: &[OsString]) -> Result<Output> {
    let (name, mut command) = prepare(root, cmd, args)?;

    let output = command
        .output()
        .with_context(|| format!("Failed to execute `{name}`"))?;

    if !output.status.success() {
        anyhow::bail!(format_error(&name, &output));
    }
    Ok(output)
}

/// Execute a command with inherited stdout/stderr, honoring cancellation.
///
/// The child is polled; if cancellation is requested while it runs, the
/// child is killed and an error is returned.
///
/// # Errors
/// Returns error on spawn failure, non-zero exit, or cancellation.
pub fn exec_streamed(root: Option<&Path>, cmd: &[OsString], args: &[OsString]) -> Result<()> {
    let (name, mut command) = prepare(root, cmd, args)?;

    command.stdout(Stdio::inherit()).stderr(Stdio::inherit());

    let mut child = command
        .spawn()
        .with_context(|| format!("Failed to spawn `{name}`"))?;

    loop {
        if cancel::cancelled() {
            child.kill().ok();
            child.wait().ok();
            anyhow::bail!("`{name}` interrupted");
        }
        match child.try_wait()? {
            Some(status) if status.success() => return Ok(()),
            Some(status) => anyhow::bail!("Command `{name}` failed with {status}"),
            None => std::thread::sleep(Duration::from_millis(100)),
        }
    }
}

/// Prepare a Command from components.
fn prepare(root: Option<&Path>, cmd: &[OsString], args: &[OsString]) -> Result<(String, Command)> {
    let name = cmd
        .first()
        .and_then(|s| s.to_str())
        .context("Empty command")?
        .to_owned();

    let mut command = Command::new(&cmd[0]);
    command.args(&cmd[1..]).args(args);

    if let Some(dir) = root {
        command.current_dir(dir);
    }

    Ok((name, command))
}

/// Format command error message with trimmed stderr attached.
fn format_error(name: &str, output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();

    let mut msg = format!("Command `{name}` failed with {}", output.status);
    if !stderr.is_empty() {
        msg.push('\n');
        msg.push_str(stderr);
    }
    msg
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_os() {
        assert_eq!(to_os("hello"), OsString::from("hello"));
        assert_eq!(to_os(String::from("world")), OsString::from("world"));
    }

    #[test]
    fn test_to_cmd_vec_array() {
        let cmd = to_cmd_vec(["git", "status"]);
        assert_eq!(cmd.len(), 2);
        assert_eq!(cmd[0], OsString::from("git"));
        assert_eq!(cmd[1], OsString::from("status"));
    }

    #[test]
    fn test_to_cmd_vec_vec() {
        let v = vec!["echo".to_string(), "hello".to_string()];
        let cmd = to_cmd_vec(&v);
        assert_eq!(cmd.len(), 2);
        assert_eq!(cmd[0], OsString::from("echo"));
        assert_eq!(cmd[1], OsString::from("hello"));
    }

    #[test]
    fn test_filter_args() {
        let args = [OsString::from("a"), OsString::from(""), OsString::from("b")];
        let filtered = filter_args(&args);
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0], OsString::from("a"));
        assert_eq!(filtered[1], OsString::from("b"));
    }

    #[test]
    fn test_prepare_empty() {
        let result = prepare(None, &[], &[]);
        assert!(result.is_err());
    }

    #[test]
    fn test_prepare_valid() {
        let cmd = to_cmd_vec(["echo"]);
        let args = filter_args(&[OsString::from("hello")]);
        let result = prepare(None, &cmd, &args);
        assert!(result.is_ok());
        let (name, _) = result.unwrap();
        assert_eq!(name, "echo");
    }

    #[test]
    fn test_exec_quiet_captures_stdout() {
        let output = exec_quiet!(["echo", "hello"];).unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }

    #[test]
    fn test_exec_quiet_error_carries_stderr() {
        let err = exec_quiet!(["sh", "-c", "echo oops >&2; exit 3"];).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Command `sh` failed"), "got: {msg}");
        assert!(msg.contains("oops"), "got: {msg}");
    }

    #[test]
    fn test_format_error_includes_stderr() {
        let status = Command::new("false")
            .status()
            .expect("`false` should be runnable");

        let output = Output {
            status,
            stdout: Vec::new(),
            stderr: b"fatal: not a git repository".to_vec(),
        };
        let msg = format_error("git", &output);

        assert!(msg.contains("Command `git` failed"));
        assert!(msg.contains("fatal: not a git repository"));
    }
}
