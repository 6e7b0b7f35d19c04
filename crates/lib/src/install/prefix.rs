use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{PREFIX_STATE_DIR, RECEIPTS_DIR};

/// Directory layout of an install prefix for one formula.
///
/// ```text
/// <root>/bin/
/// <root>/lib/
/// <root>/share/man/man1/
/// <root>/share/doc/<name>/
/// <root>/.kiln/receipts/<name>.json
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPrefix {
  root: PathBuf,
  name: String,
}

impl InstallPrefix {
  pub fn new(root: impl Into<PathBuf>, name: &str) -> Self {
    Self {
      root: root.into(),
      name: name.to_string(),
    }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn bin(&self) -> PathBuf {
    self.root.join("bin")
  }

  pub fn lib(&self) -> PathBuf {
    self.root.join("lib")
  }

  pub fn share(&self) -> PathBuf {
    self.root.join("share")
  }

  pub fn man(&self, section: u8) -> PathBuf {
    self.share().join("man").join(format!("man{section}"))
  }

  pub fn doc(&self) -> PathBuf {
    self.share().join("doc").join(&self.name)
  }

  pub fn state_dir(&self) -> PathBuf {
    self.root.join(PREFIX_STATE_DIR)
  }

  pub fn receipt_path(&self) -> PathBuf {
    self.state_dir().join(RECEIPTS_DIR).join(format!("{}.json", self.name))
  }

  /// Absolute destination directory for an install target.
  pub fn dir(&self, to: &InstallDir) -> PathBuf {
    match to {
      InstallDir::Bin => self.bin(),
      InstallDir::Lib => self.lib(),
      InstallDir::Man(section) => self.man(*section),
      InstallDir::Doc => self.doc(),
      InstallDir::Share(sub) => self.share().join(sub),
    }
  }
}

/// Destination of a `copy` step, always a subdirectory of the prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum InstallDir {
  Bin,
  Lib,
  /// `share/man/man<N>`, N in 1..=9
  Man(u8),
  /// `share/doc/<name>`
  Doc,
  /// `share/<subdir>`
  Share(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid install destination `{0}`: expected bin, lib, man1..man9, doc or share/<dir>")]
pub struct InvalidInstallDir(pub String);

impl FromStr for InstallDir {
  type Err = InvalidInstallDir;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let invalid = || InvalidInstallDir(s.to_string());
    match s {
      "bin" => Ok(InstallDir::Bin),
      "lib" => Ok(InstallDir::Lib),
      "doc" => Ok(InstallDir::Doc),
      _ => {
        if let Some(section) = s.strip_prefix("man") {
          return match section.parse::<u8>() {
            Ok(n @ 1..=9) if section.len() == 1 => Ok(InstallDir::Man(n)),
            _ => Err(invalid()),
          };
        }
        let sub = s.strip_prefix("share/").ok_or_else(invalid)?;
        let path = Path::new(sub);
        let plain = !sub.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)));
        if plain {
          Ok(InstallDir::Share(sub.trim_end_matches('/').to_string()))
        } else {
          Err(invalid())
        }
      }
    }
  }
}

impl TryFrom<String> for InstallDir {
  type Error = InvalidInstallDir;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<InstallDir> for String {
  fn from(dir: InstallDir) -> Self {
    dir.to_string()
  }
}

impl fmt::Display for InstallDir {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      InstallDir::Bin => f.write_str("bin"),
      InstallDir::Lib => f.write_str("lib"),
      InstallDir::Man(n) => write!(f, "man{n}"),
      InstallDir::Doc => f.write_str("doc"),
      InstallDir::Share(sub) => write!(f, "share/{sub}"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn layout_is_rooted_at_prefix() {
    let prefix = InstallPrefix::new("/opt/kiln", "blang");

    assert_eq!(prefix.bin(), PathBuf::from("/opt/kiln/bin"));
    assert_eq!(prefix.lib(), PathBuf::from("/opt/kiln/lib"));
    assert_eq!(prefix.man(1), PathBuf::from("/opt/kiln/share/man/man1"));
    assert_eq!(prefix.doc(), PathBuf::from("/opt/kiln/share/doc/blang"));
    assert_eq!(
      prefix.receipt_path(),
      PathBuf::from("/opt/kiln/.kiln/receipts/blang.json")
    );
  }

  #[test]
  fn every_destination_is_under_the_prefix() {
    let prefix = InstallPrefix::new("/opt/kiln", "blang");
    for to in ["bin", "lib", "man1", "man8", "doc", "share/blang/examples"] {
      let dir = prefix.dir(&to.parse().unwrap());
      assert!(dir.starts_with("/opt/kiln"), "{to} -> {}", dir.display());
    }
  }

  #[test]
  fn parses_known_destinations() {
    assert_eq!("bin".parse(), Ok(InstallDir::Bin));
    assert_eq!("man1".parse(), Ok(InstallDir::Man(1)));
    assert_eq!("share/vim".parse(), Ok(InstallDir::Share("vim".to_string())));
  }

  #[test]
  fn rejects_escaping_or_unknown_destinations() {
    for bad in ["etc", "man0", "man10", "share/", "share/../etc", "share//abs", "/bin"] {
      assert!(bad.parse::<InstallDir>().is_err(), "{bad} should be rejected");
    }
  }

  #[test]
  fn display_round_trips_share_subdir() {
    let dir = InstallDir::Share("blang/examples".to_string());
    assert_eq!(dir.to_string(), "share/blang/examples");
    assert_eq!(dir.to_string().parse(), Ok(dir));
  }
}
