//! Subprocess invocation.
//!
//! Every program a formula runs goes through a [`CommandRunner`]. The
//! production runner, [`ProcessRunner`], spawns the program with an isolated
//! environment:
//! - The kiln process environment is cleared
//! - Only the variables of the [`Invocation`] are set
//! - stdin is closed; stdout and stderr are captured
//!
//! Arguments are passed as a vector. Nothing is interpreted by a shell.

use std::collections::BTreeMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// A fully resolved program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  pub program: PathBuf,
  pub args: Vec<String>,
  pub env: BTreeMap<String, String>,
  pub cwd: PathBuf,
  pub timeout: Option<Duration>,
}

/// Captured result of a program that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
  /// Exit code; `None` when terminated by a signal.
  pub code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl CommandOutput {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }
}

#[derive(Debug, Error)]
pub enum RunError {
  #[error("failed to launch: {0}")]
  Spawn(#[source] io::Error),

  #[error("timed out after {}", format_timeout(.0))]
  TimedOut(Duration),
}

pub(crate) fn format_timeout(limit: &Duration) -> String {
  humantime::format_duration(*limit).to_string()
}

/// Runs invocations. Implemented by [`ProcessRunner`] and by test doubles.
pub trait CommandRunner {
  fn run(&self, invocation: &Invocation) -> impl Future<Output = Result<CommandOutput, RunError>> + Send;
}

/// Runs invocations as real subprocesses.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
  async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunError> {
    let mut command = Command::new(&invocation.program);
    command
      .args(&invocation.args)
      .current_dir(&invocation.cwd)
      .env_clear()
      .envs(&invocation.env)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true);

    debug!(program = %invocation.program.display(), working_dir = ?invocation.cwd, "spawning process");

    let child = command.output();
    let output = match invocation.timeout {
      Some(limit) => tokio::time::timeout(limit, child)
        .await
        .map_err(|_| RunError::TimedOut(limit))?,
      None => child.await,
    }
    .map_err(RunError::Spawn)?;

    let result = CommandOutput {
      code: output.status.code(),
      stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    if !result.stdout.is_empty() {
      debug!(stdout = %result.stdout.trim_end(), "command stdout");
    }
    if !result.stderr.is_empty() {
      debug!(stderr = %result.stderr.trim_end(), "command stderr");
    }

    Ok(result)
  }
}

/// Resolve the program of a step.
///
/// A name containing a path separator is used as is, relative names against
/// `cwd`. A bare name is searched on `search_path` (the step's own `PATH`,
/// never the kiln process's); when not found it is returned unchanged so the
/// spawn error names it.
pub fn resolve_program(bin: &str, search_path: &str, cwd: &Path) -> PathBuf {
  let path = Path::new(bin);
  if path.components().count() > 1 || path.is_absolute() {
    return if path.is_absolute() { path.to_path_buf() } else { cwd.join(path) };
  }

  std::env::split_paths(search_path)
    .filter(|dir| !dir.as_os_str().is_empty())
    .flat_map(|dir| candidates(bin).map(move |name| dir.join(name)))
    .find(|candidate| crate::env::is_executable(candidate))
    .unwrap_or_else(|| path.to_path_buf())
}

#[cfg(windows)]
fn candidates(bin: &str) -> impl Iterator<Item = String> {
  [format!("{bin}.exe"), format!("{bin}.cmd"), bin.to_string()].into_iter()
}

#[cfg(not(windows))]
fn candidates(bin: &str) -> impl Iterator<Item = String> {
  std::iter::once(bin.to_string())
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;
  use crate::util::testutil::write_script;
  use tempfile::TempDir;

  fn invocation(program: &str, args: &[&str], cwd: &Path) -> Invocation {
    Invocation {
      program: PathBuf::from(program),
      args: args.iter().map(|s| s.to_string()).collect(),
      env: BTreeMap::new(),
      cwd: cwd.to_path_buf(),
      timeout: None,
    }
  }

  #[tokio::test]
  async fn captures_stdout_stderr_and_code() {
    let temp = TempDir::new().unwrap();
    let inv = invocation("/bin/sh", &["-c", "echo out; echo err >&2; exit 3"], temp.path());

    let output = ProcessRunner.run(&inv).await.unwrap();

    assert_eq!(output.code, Some(3));
    assert_eq!(output.stdout, "out\n");
    assert_eq!(output.stderr, "err\n");
    assert!(!output.success());
  }

  #[tokio::test]
  async fn environment_is_isolated() {
    let temp = TempDir::new().unwrap();
    let mut inv = invocation("/bin/sh", &["-c", "echo \"${GREETING}:${HOME:-unset}\""], temp.path());
    inv.env.insert("GREETING".to_string(), "hi".to_string());

    let output = ProcessRunner.run(&inv).await.unwrap();
    assert_eq!(output.stdout.trim_end(), "hi:unset");
  }

  #[tokio::test]
  async fn arguments_are_not_shell_interpreted() {
    let temp = TempDir::new().unwrap();
    let inv = invocation("/bin/echo", &["$HOME", "a;b", "*"], temp.path());

    let output = ProcessRunner.run(&inv).await.unwrap();
    assert_eq!(output.stdout.trim_end(), "$HOME a;b *");
  }

  #[tokio::test]
  async fn runs_in_working_directory() {
    let temp = TempDir::new().unwrap();
    let inv = invocation("/bin/sh", &["-c", "pwd"], temp.path());

    let output = ProcessRunner.run(&inv).await.unwrap();
    let expected = temp.path().canonicalize().unwrap();
    assert_eq!(Path::new(output.stdout.trim_end()).canonicalize().unwrap(), expected);
  }

  #[tokio::test]
  async fn missing_program_is_a_spawn_error() {
    let temp = TempDir::new().unwrap();
    let inv = invocation("/nonexistent/blang", &[], temp.path());

    assert!(matches!(ProcessRunner.run(&inv).await, Err(RunError::Spawn(_))));
  }

  #[tokio::test]
  async fn timeout_kills_the_process() {
    let temp = TempDir::new().unwrap();
    let mut inv = invocation("/bin/sh", &["-c", "sleep 5"], temp.path());
    inv.timeout = Some(Duration::from_millis(100));

    assert!(matches!(ProcessRunner.run(&inv).await, Err(RunError::TimedOut(_))));
  }

  #[test]
  fn bare_names_resolve_on_the_given_path_only() {
    let temp = TempDir::new().unwrap();
    let bin = temp.path().join("bin");
    let script = write_script(&bin, "blang", "echo blang");

    assert_eq!(resolve_program("blang", &bin.to_string_lossy(), temp.path()), script);
    assert_eq!(resolve_program("blang", "", temp.path()), PathBuf::from("blang"));
  }

  #[test]
  fn relative_paths_resolve_against_cwd() {
    let cwd = Path::new("/work/test");
    assert_eq!(resolve_program("./hello", "", cwd), PathBuf::from("/work/test/./hello"));
    assert_eq!(resolve_program("/bin/sh", "", cwd), PathBuf::from("/bin/sh"));
  }
}
