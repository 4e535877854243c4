//! External command execution utilities.
//!
//! Used for script-side filter processes (`moonlog.runprocessor`) and for
//! launching the configured editor.

use anyhow::{Context, Result, bail};
use std::{
    ffi::OsString,
    io::Write,
    process::{Command, Stdio},
    thread,
};

// ============================================================================
// Argument Conversion
// ============================================================================

/// Convert a string command line into `OsString`s, dropping empty parts.
#[inline]
pub fn to_cmd_vec<S: AsRef<str>>(cmd: &[S]) -> Vec<OsString> {
    cmd.iter()
        .map(AsRef::as_ref)
        .filter(|s| !s.is_empty())
        .map(OsString::from)
        .collect()
}

// ============================================================================
// Command Execution
// ============================================================================

/// Pipe `input` through a command and return its stdout.
///
/// # Errors
/// Returns error if the command cannot be spawned, exits non-zero, or prints
/// invalid UTF-8.
pub fn pipe(cmd: &[OsString], input: &str) -> Result<String> {
    let (name, mut command) = prepare(cmd, &[])?;

    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to spawn `{name}`"))?;

    // feed stdin from another thread so a chatty child can't deadlock on stdout
    let mut stdin = child.stdin.take().context("Failed to acquire stdin")?;
    let input = input.to_owned();
    let writer = thread::spawn(move || stdin.write_all(input.as_bytes()));

    let output = child
        .wait_with_output()
        .with_context(|| format!("Failed to execute `{name}`"))?;
    if let Ok(Err(e)) = writer.join() {
        // a filter may legitimately exit before reading everything
        if e.kind() != std::io::ErrorKind::BrokenPipe {
            return Err(e).with_context(|| format!("Failed to write to `{name}`"));
        }
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "Command `{name}` failed with {}: {}",
            output.status,
            stderr.trim()
        );
    }

    String::from_utf8(output.stdout).with_context(|| format!("Invalid UTF-8 from `{name}`"))
}

/// Run a command attached to the terminal and wait for it.
pub fn run_interactive(cmd: &[OsString], args: &[OsString]) -> Result<()> {
    let (name, mut command) = prepare(cmd, args)?;
    let status = command
        .status()
        .with_context(|| format!("Failed to execute `{name}`"))?;
    if !status.success() {
        bail!("Command `{name}` failed with {status}");
    }
    Ok(())
}

/// Prepare a Command from components.
fn prepare(cmd: &[OsString], args: &[OsString]) -> Result<(String, Command)> {
    let (program, rest) = cmd.split_first().context("Empty command")?;
    let name = program.to_string_lossy().into_owned();

    let mut command = Command::new(program);
    command.args(rest).args(args);
    Ok((name, command))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_cmd_vec() {
        let cmd = to_cmd_vec(&["vim", "", "+2"]);
        assert_eq!(cmd, vec![OsString::from("vim"), OsString::from("+2")]);

        let owned = vec!["echo".to_string(), "hello".to_string()];
        assert_eq!(to_cmd_vec(&owned).len(), 2);
    }

    #[test]
    fn test_prepare_empty_command() {
        assert!(prepare(&[], &[]).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_pipe_through_filter() {
        let output = pipe(&to_cmd_vec(&["tr", "a-z", "A-Z"]), "hello\n").unwrap();
        assert_eq!(output, "HELLO\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_pipe_failure_reports_command() {
        let err = pipe(&to_cmd_vec(&["sh", "-c", "echo broken >&2; exit 3"]), "").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("`sh`"));
        assert!(message.contains("broken"));
    }

    #[test]
    fn test_pipe_missing_program() {
        let err = pipe(&to_cmd_vec(&["moonlog-no-such-program"]), "").unwrap_err();
        assert!(err.to_string().contains("Failed to spawn"));
    }
}
