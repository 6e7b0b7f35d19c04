use std::fmt;

use serde::{Deserialize, Serialize};

/// Target architecture tags understood by formulas.
///
/// The set is closed: every CPU identifier a host may report maps to one of
/// these tags or is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
  /// 64-bit ARM (`aarch64`, `arm64`, `arm64e`, `armv8*`, `armv9*`).
  Arm64,
  /// 64-bit x86 (`x86_64`, `amd64`, `x64`).
  Amd64,
}

impl Arch {
  /// Map a CPU identifier reported by a host to its architecture tag.
  ///
  /// Matching is case-insensitive. Returns `None` for identifiers outside the
  /// recognized families, including 32-bit ARM and x86.
  pub fn from_cpu(cpu: &str) -> Option<Self> {
    let cpu = cpu.trim().to_ascii_lowercase();
    match cpu.as_str() {
      "aarch64" | "arm64" | "arm64e" => Some(Self::Arm64),
      "x86_64" | "x86-64" | "amd64" | "x64" => Some(Self::Amd64),
      other if other.starts_with("armv8") || other.starts_with("armv9") => Some(Self::Arm64),
      _ => None,
    }
  }

  /// Detect the architecture of the running process.
  pub fn current() -> Option<Self> {
    Self::from_cpu(std::env::consts::ARCH)
  }

  /// Returns the lowercase tag for this architecture
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Arm64 => "arm64",
      Self::Amd64 => "amd64",
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
