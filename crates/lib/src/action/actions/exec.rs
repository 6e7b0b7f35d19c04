use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Options for running an external program.
///
/// Arguments are passed to the program as a discrete vector; nothing is
/// interpreted by a shell. Formulas that want shell features run `sh -c`
/// explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecOpts {
  /// Program to run. A bare name is looked up on the step's `PATH`.
  pub bin: String,
  /// Program arguments.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub args: Option<Vec<String>>,
  /// Step-local environment overrides, layered over the run environment.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub env: Option<BTreeMap<String, String>>,
}

impl ExecOpts {
  pub fn new(bin: &str) -> Self {
    Self {
      bin: bin.to_string(),
      args: None,
      env: None,
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

  pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
    self.env = Some(env);
    self
  }

  /// Arguments, or an empty slice when none were given.
  pub fn args(&self) -> &[String] {
    self.args.as_deref().unwrap_or_default()
  }
}

impl From<&str> for ExecOpts {
  fn from(bin: &str) -> Self {
    ExecOpts::new(bin)
  }
}

/// Render a program with its arguments for logs and error messages.
///
/// Arguments containing whitespace or quotes are shown Debug-quoted.
pub fn display_command(bin: &str, args: &[String]) -> String {
  let mut rendered = bin.to_string();
  for arg in args {
    rendered.push(' ');
    if arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || c == '"' || c == '\'') {
      rendered.push_str(&format!("{arg:?}"));
    } else {
      rendered.push_str(arg);
    }
  }
  rendered
}
