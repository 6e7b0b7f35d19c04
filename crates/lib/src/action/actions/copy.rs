use serde::{Deserialize, Serialize};

use crate::install::InstallDir;

/// Options for copying build output into the install prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopyOpts {
  /// Source path or glob pattern, relative to the step's working directory.
  ///
  /// `*` and `?` are supported within a single path component.
  pub from: String,
  /// Destination directory inside the prefix.
  pub to: InstallDir,
  /// Install a single matched file or directory under a different name.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub rename: Option<String>,
}

impl CopyOpts {
  pub fn new(from: &str, to: InstallDir) -> Self {
    Self {
      from: from.to_string(),
      to,
      rename: None,
    }
  }

  pub fn renamed(mut self, name: &str) -> Self {
    self.rename = Some(name.to_string());
    self
  }

  /// True when `from` contains wildcard characters.
  pub fn is_pattern(&self) -> bool {
    self.from.contains(['*', '?'])
  }
}
