//! Host platform facts and their mapping to formula-level tags.
//!
//! [`HostFacts`] carries raw identifiers as a host reports them. [`Platform`]
//! is the validated pair of tags derived from them; deriving it is the only
//! place where unrecognized hosts are rejected.

pub mod arch;
pub mod os;
pub mod paths;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::env::EnvError;
use arch::Arch;
use os::Os;

/// Raw host identifiers, e.g. `("macos", "aarch64")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostFacts {
  pub os: String,
  pub cpu: String,
}

impl HostFacts {
  pub fn new(os: impl Into<String>, cpu: impl Into<String>) -> Self {
    Self {
      os: os.into(),
      cpu: cpu.into(),
    }
  }

  /// Facts for the running process.
  pub fn current() -> Self {
    Self::new(std::env::consts::OS, std::env::consts::ARCH)
  }
}

/// Platform identifier combining architecture and OS tags (e.g., "arm64-darwin")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
  pub arch: Arch,
  pub os: Os,
}

impl Platform {
  pub fn new(arch: Arch, os: Os) -> Self {
    Self { arch, os }
  }

  /// Validate host facts.
  ///
  /// The architecture is checked first, so a host that is wrong on both
  /// counts reports `UnsupportedArchitecture`.
  pub fn from_facts(facts: &HostFacts) -> Result<Self, EnvError> {
    let arch = Arch::from_cpu(&facts.cpu).ok_or_else(|| EnvError::UnsupportedArchitecture {
      cpu: facts.cpu.clone(),
    })?;
    let os = Os::from_id(&facts.os).ok_or_else(|| EnvError::UnsupportedOs { os: facts.os.clone() })?;
    Ok(Self { arch, os })
  }

  /// Detect the current platform at runtime
  ///
  /// Returns `None` if the OS or architecture is not supported
  pub fn current() -> Option<Self> {
    Some(Self {
      arch: Arch::current()?,
      os: Os::current()?,
    })
  }

  /// Returns the platform triple string (e.g., "arm64-darwin")
  pub fn triple(&self) -> String {
    format!("{}-{}", self.arch, self.os)
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.triple())
  }
}
