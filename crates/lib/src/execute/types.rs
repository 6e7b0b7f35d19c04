//! Types for step execution.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::install::{InstallError, InstalledFile};
use crate::placeholder::PlaceholderError;

/// Which step sequence of a formula is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
  Build,
  Install,
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Phase::Build => "build",
      Phase::Install => "install",
    })
  }
}

/// Position of a step, 1-based, one entry per nesting level.
///
/// The second step nested in the third top-level step is `3.2`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "String")]
pub struct StepIndex(pub Vec<usize>);

impl StepIndex {
  pub fn top(index: usize) -> Self {
    StepIndex(vec![index])
  }

  pub fn child(&self, index: usize) -> Self {
    let mut path = self.0.clone();
    path.push(index);
    StepIndex(path)
  }
}

impl fmt::Display for StepIndex {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut first = true;
    for i in &self.0 {
      if !first {
        f.write_str(".")?;
      }
      write!(f, "{i}")?;
      first = false;
    }
    Ok(())
  }
}

impl From<StepIndex> for String {
  fn from(index: StepIndex) -> Self {
    index.to_string()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
  Pending,
  Running,
  Succeeded,
  Failed,
}

/// What happened to one step of a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
  pub index: StepIndex,
  pub description: String,
  pub state: StepState,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub code: Option<i32>,
}

/// Outcome of a sequence that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceReport {
  pub records: Vec<StepRecord>,
  /// Files written into the prefix by copy steps, in copy order.
  pub installed: Vec<InstalledFile>,
}

#[derive(Debug, Error)]
pub enum StepError {
  #[error("step {index} `{command}` exited with {}{}", exit_code(.code), stderr_tail(.stderr))]
  Failed {
    index: StepIndex,
    command: String,
    code: Option<i32>,
    stderr: String,
  },

  #[error("step {index} `{command}` could not be launched: {source}")]
  Spawn {
    index: StepIndex,
    command: String,
    #[source]
    source: std::io::Error,
  },

  #[error("step {index} `{command}` timed out after {}", crate::execute::actions::cmd::format_timeout(.limit))]
  TimedOut {
    index: StepIndex,
    command: String,
    limit: std::time::Duration,
  },

  #[error("step {index}: {source}")]
  Placeholder {
    index: StepIndex,
    #[source]
    source: PlaceholderError,
  },

  #[error("step {index}: working directory {} does not exist", path.display())]
  WorkingDir { index: StepIndex, path: PathBuf },

  #[error("step {index}: {source}")]
  Copy {
    index: StepIndex,
    #[source]
    source: InstallError,
  },
}

impl StepError {
  pub fn index(&self) -> &StepIndex {
    match self {
      StepError::Failed { index, .. }
      | StepError::Spawn { index, .. }
      | StepError::TimedOut { index, .. }
      | StepError::Placeholder { index, .. }
      | StepError::WorkingDir { index, .. }
      | StepError::Copy { index, .. } => index,
    }
  }

  /// Captured stderr of the failing program, if it ran.
  pub fn stderr(&self) -> Option<&str> {
    match self {
      StepError::Failed { stderr, .. } => Some(stderr),
      _ => None,
    }
  }
}

fn exit_code(code: &Option<i32>) -> String {
  match code {
    Some(code) => format!("status {code}"),
    None => "a signal".to_string(),
  }
}

fn stderr_tail(stderr: &str) -> String {
  let trimmed = stderr.trim_end();
  if trimmed.is_empty() {
    String::new()
  } else {
    format!("\n{trimmed}")
  }
}
