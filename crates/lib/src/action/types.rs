use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::action::actions::copy::CopyOpts;
use crate::action::actions::exec::ExecOpts;

/// A build or install step.
///
/// Steps are a closed set of typed variants interpreted by the
/// [`StepExecutor`](crate::execute::StepExecutor). They are stored in a
/// [`Formula`](crate::formula::Formula) in declaration order.
///
/// # Variants
///
/// - [`Exec`](Step::Exec): run an external program
/// - [`Cd`](Step::Cd): run nested steps in a subdirectory
/// - [`Copy`](Step::Copy): copy matched files into the prefix (install sequence only)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
  Exec(ExecOpts),
  Cd(CdOpts),
  Copy(CopyOpts),
}

impl Step {
  pub fn exec(opts: impl Into<ExecOpts>) -> Self {
    Step::Exec(opts.into())
  }

  pub fn cd(dir: &str, steps: Vec<Step>) -> Self {
    Step::Cd(CdOpts {
      dir: dir.to_string(),
      steps,
    })
  }

  pub fn copy(opts: CopyOpts) -> Self {
    Step::Copy(opts)
  }

  /// Short human-readable description used in logs and step records.
  pub fn describe(&self) -> String {
    match self {
      Step::Exec(opts) => crate::action::actions::exec::display_command(&opts.bin, opts.args()),
      Step::Cd(opts) => format!("cd {}", opts.dir),
      Step::Copy(opts) => match &opts.rename {
        Some(name) => format!("copy {} -> {}/{}", opts.from, opts.to, name),
        None => format!("copy {} -> {}", opts.from, opts.to),
      },
    }
  }
}

/// Run `steps` with the working directory shifted to `dir`.
///
/// `dir` is relative to the working directory active when the step starts.
/// The previous directory is restored once the nested steps finish.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CdOpts {
  pub dir: String,
  #[serde(default)]
  pub steps: Vec<Step>,
}

/// An action of a formula's test recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestAction {
  /// Write a literal fixture file into the test directory.
  Write(WriteOpts),
  /// Run a program and capture its output.
  Run(RunOpts),
  /// Compare the stdout of the most recent `run` against an expectation.
  Assert(Expect),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriteOpts {
  /// Path relative to the test directory.
  pub path: String,
  pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunOpts {
  /// A bare name resolves to `<prefix>/bin/<name>`; a path resolves against the test directory.
  pub bin: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub args: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub env: Option<BTreeMap<String, String>>,
  /// Expected exit code.
  #[serde(default)]
  pub status: i32,
}

impl RunOpts {
  pub fn new(bin: &str) -> Self {
    Self {
      bin: bin.to_string(),
      args: None,
      env: None,
      status: 0,
    }
  }

  pub fn with_args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args = Some(args.into_iter().map(Into::into).collect());
    self
  }

  pub fn args(&self) -> &[String] {
    self.args.as_deref().unwrap_or_default()
  }
}

/// Expected output of a test run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expect {
  /// Output equals the literal exactly.
  Equals(String),
  /// Output contains the literal.
  Contains(String),
  /// Output matches the regular expression.
  Matches(String),
}

impl Expect {
  pub fn kind(&self) -> &'static str {
    match self {
      Expect::Equals(_) => "equals",
      Expect::Contains(_) => "contains",
      Expect::Matches(_) => "matches",
    }
  }

  pub fn text(&self) -> &str {
    match self {
      Expect::Equals(s) | Expect::Contains(s) | Expect::Matches(s) => s,
    }
  }
}

/// Ordered smoke-test actions run after installation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestRecipe {
  actions: Vec<TestAction>,
}

impl TestRecipe {
  pub fn new(actions: Vec<TestAction>) -> Self {
    Self { actions }
  }

  pub fn actions(&self) -> &[TestAction] {
    &self.actions
  }

  pub fn is_empty(&self) -> bool {
    self.actions.is_empty()
  }
}
