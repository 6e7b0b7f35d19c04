use std::fmt;

use serde::{Deserialize, Serialize};

/// Operating system tags understood by formulas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
  Linux,
  Darwin,
  Windows,
}

impl Os {
  /// Map an OS identifier reported by a host to its tag.
  ///
  /// Accepts both Rust's `std::env::consts::OS` spelling (`macos`) and the
  /// kernel name (`darwin`).
  pub fn from_id(id: &str) -> Option<Self> {
    match id.trim().to_ascii_lowercase().as_str() {
      "linux" => Some(Self::Linux),
      "macos" | "darwin" => Some(Self::Darwin),
      "windows" => Some(Self::Windows),
      _ => None,
    }
  }

  /// Detect the current operating system at runtime
  pub fn current() -> Option<Self> {
    Self::from_id(std::env::consts::OS)
  }

  /// Returns the lowercase string identifier for this OS
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::Darwin => "darwin",
      Self::Windows => "windows",
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn current_returns_supported_os() {
    assert!(Os::current().is_some(), "Current OS should be supported");
  }

  #[test]
  fn macos_uses_darwin_identifier() {
    assert_eq!(Os::from_id("macos"), Some(Os::Darwin));
    assert_eq!(Os::from_id("Darwin"), Some(Os::Darwin));
    assert_eq!(Os::Darwin.as_str(), "darwin");
  }

  #[test]
  fn unknown_os_is_rejected() {
    assert_eq!(Os::from_id("freebsd"), None);
    assert_eq!(Os::from_id(""), None);
  }
}
