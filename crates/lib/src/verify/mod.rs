//! Post-install verification.
//!
//! The [`Verifier`] runs a formula's test recipe in a scratch directory.
//! Programs named by a bare name are resolved in the prefix's `bin/` only,
//! never through a search path, so a stale copy installed elsewhere cannot
//! make a broken install pass.
//!
//! Assertions compare the stdout of the most recent `run`, with trailing
//! whitespace trimmed.

use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::action::actions::exec::display_command;
use crate::action::{Expect, RunOpts, TestAction, TestRecipe, WriteOpts};
use crate::env::{Environment, is_executable};
use crate::execute::actions::cmd::format_timeout;
use crate::execute::actions::{CommandRunner, Invocation, RunError};
use crate::execute::resolver::RunResolver;
use crate::install::InstallPrefix;
use crate::placeholder::{self, PlaceholderError};

#[derive(Debug, Error)]
pub enum VerifyError {
  #[error("test action {index}: `{kind}` assertion failed: expected {expected:?}, got {actual:?}")]
  Mismatch {
    index: usize,
    kind: &'static str,
    expected: String,
    actual: String,
  },

  #[error("test action {index}: `{command}` exited with {actual:?}, expected {expected}")]
  ExitStatus {
    index: usize,
    command: String,
    expected: i32,
    actual: Option<i32>,
    stderr: String,
  },

  #[error("test action {index}: `{name}` is not installed in {}", bin_dir.display())]
  NotInstalled {
    index: usize,
    name: String,
    bin_dir: PathBuf,
  },

  #[error("test action {index}: `{command}` could not be launched: {source}")]
  Spawn {
    index: usize,
    command: String,
    #[source]
    source: io::Error,
  },

  #[error("test action {index}: `{command}` timed out after {}", format_timeout(.limit))]
  TimedOut {
    index: usize,
    command: String,
    limit: Duration,
  },

  #[error("test action {index}: failed to write {}: {source}", path.display())]
  WriteFixture {
    index: usize,
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("test action {index}: {source}")]
  Placeholder {
    index: usize,
    #[source]
    source: PlaceholderError,
  },

  #[error("test action {index}: assert has no preceding run")]
  NoOutput { index: usize },

  #[error("test action {index}: invalid pattern: {message}")]
  InvalidPattern { index: usize, message: String },
}

impl VerifyError {
  /// 1-based index of the failing action.
  pub fn index(&self) -> usize {
    match self {
      VerifyError::Mismatch { index, .. }
      | VerifyError::ExitStatus { index, .. }
      | VerifyError::NotInstalled { index, .. }
      | VerifyError::Spawn { index, .. }
      | VerifyError::TimedOut { index, .. }
      | VerifyError::WriteFixture { index, .. }
      | VerifyError::Placeholder { index, .. }
      | VerifyError::NoOutput { index }
      | VerifyError::InvalidPattern { index, .. } => *index,
    }
  }
}

/// Summary of a passing recipe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
  pub actions: usize,
  pub runs: usize,
  pub assertions: usize,
}

pub struct Verifier<'a, R: CommandRunner> {
  runner: &'a R,
  prefix: &'a InstallPrefix,
  env: &'a Environment,
  resolver: &'a RunResolver,
  timeout: Option<Duration>,
}

impl<'a, R: CommandRunner> Verifier<'a, R> {
  pub fn new(runner: &'a R, prefix: &'a InstallPrefix, env: &'a Environment, resolver: &'a RunResolver) -> Self {
    Self {
      runner,
      prefix,
      env,
      resolver,
      timeout: None,
    }
  }

  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  /// Run every action of `recipe` in order with `test_dir` as working directory.
  pub async fn verify(&self, recipe: &TestRecipe, test_dir: &Path) -> Result<VerifyReport, VerifyError> {
    let mut report = VerifyReport::default();
    let mut last_stdout: Option<String> = None;

    info!(actions = recipe.actions().len(), dir = %test_dir.display(), "running test recipe");

    for (i, action) in recipe.actions().iter().enumerate() {
      let index = i + 1;
      match action {
        TestAction::Write(opts) => self.write(index, opts, test_dir)?,
        TestAction::Run(opts) => {
          last_stdout = Some(self.run(index, opts, test_dir).await?);
          report.runs += 1;
        }
        TestAction::Assert(expect) => {
          let stdout = last_stdout.as_deref().ok_or(VerifyError::NoOutput { index })?;
          check(index, expect, stdout)?;
          report.assertions += 1;
        }
      }
      report.actions += 1;
    }

    Ok(report)
  }

  fn subst(&self, index: usize, value: &str) -> Result<String, VerifyError> {
    placeholder::substitute(value, self.resolver).map_err(|source| VerifyError::Placeholder { index, source })
  }

  fn write(&self, index: usize, opts: &WriteOpts, test_dir: &Path) -> Result<(), VerifyError> {
    let path = test_dir.join(self.subst(index, &opts.path)?);
    let content = &opts.content;

    let result = match path.parent() {
      Some(parent) => std::fs::create_dir_all(parent),
      None => Ok(()),
    }
    .and_then(|_| std::fs::write(&path, content));

    debug!(index, path = %path.display(), "wrote fixture");
    result.map_err(|source| VerifyError::WriteFixture { index, path, source })
  }

  /// Resolve the program of a `run` action.
  ///
  /// A bare name must exist in the prefix's `bin/`. Anything with a path
  /// separator is taken as a path, relative ones against the test directory.
  fn program(&self, index: usize, bin: &str, test_dir: &Path) -> Result<PathBuf, VerifyError> {
    let path = Path::new(bin);
    let mut components = path.components();
    let bare = matches!((components.next(), components.next()), (Some(Component::Normal(_)), None));

    if !bare {
      return Ok(if path.is_absolute() {
        path.to_path_buf()
      } else {
        test_dir.join(path)
      });
    }

    let bin_dir = self.prefix.bin();
    let candidate = bin_dir.join(bin);
    #[cfg(windows)]
    let candidate = if candidate.exists() { candidate } else { bin_dir.join(format!("{bin}.exe")) };

    if is_executable(&candidate) {
      Ok(candidate)
    } else {
      Err(VerifyError::NotInstalled {
        index,
        name: bin.to_string(),
        bin_dir,
      })
    }
  }

  async fn run(&self, index: usize, opts: &RunOpts, test_dir: &Path) -> Result<String, VerifyError> {
    let bin = self.subst(index, &opts.bin)?;
    let args = opts
      .args()
      .iter()
      .map(|arg| self.subst(index, arg))
      .collect::<Result<Vec<_>, _>>()?;

    let mut overrides = BTreeMap::new();
    for (key, value) in opts.env.iter().flatten() {
      overrides.insert(key.clone(), self.subst(index, value)?);
    }
    let env = self.env.overlay(&overrides);

    let command = display_command(&bin, &args);
    let invocation = Invocation {
      program: self.program(index, &bin, test_dir)?,
      args,
      env: env.vars().clone(),
      cwd: test_dir.to_path_buf(),
      timeout: self.timeout,
    };
    info!(index, "{command}");

    let output = self.runner.run(&invocation).await.map_err(|e| match e {
      RunError::Spawn(source) => VerifyError::Spawn {
        index,
        command: command.clone(),
        source,
      },
      RunError::TimedOut(limit) => VerifyError::TimedOut {
        index,
        command: command.clone(),
        limit,
      },
    })?;

    if output.code != Some(opts.status) {
      return Err(VerifyError::ExitStatus {
        index,
        command,
        expected: opts.status,
        actual: output.code,
        stderr: output.stderr,
      });
    }
    Ok(output.stdout)
  }
}

fn check(index: usize, expect: &Expect, stdout: &str) -> Result<(), VerifyError> {
  let actual = stdout.trim_end();
  let matched = match expect {
    Expect::Equals(expected) => actual == expected,
    Expect::Contains(expected) => actual.contains(expected.as_str()),
    Expect::Matches(pattern) => regex::Regex::new(pattern)
      .map_err(|e| VerifyError::InvalidPattern {
        index,
        message: e.to_string(),
      })?
      .is_match(actual),
  };

  if matched {
    Ok(())
  } else {
    Err(VerifyError::Mismatch {
      index,
      kind: expect.kind(),
      expected: expect.text().to_string(),
      actual: actual.to_string(),
    })
  }
}
