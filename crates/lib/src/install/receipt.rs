use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{InstallError, InstallPrefix, InstalledFile, partial_path};
use crate::formula::Formula;

/// Record of what an install wrote into a prefix.
///
/// Contains no timestamps: installing the same build output twice yields a
/// byte-identical receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
  pub name: String,
  pub version: String,
  pub sha256: String,
  /// Sorted by path, one entry per path.
  pub files: Vec<InstalledFile>,
}

impl Receipt {
  pub fn new(formula: &Formula, files: Vec<InstalledFile>) -> Self {
    // A later copy to the same path wins.
    let by_path: BTreeMap<String, InstalledFile> = files.into_iter().map(|f| (f.path.clone(), f)).collect();
    let files = by_path.into_values().collect();
    Self {
      name: formula.name().to_string(),
      version: formula.version().to_string(),
      sha256: formula.sha256().to_string(),
      files,
    }
  }

  /// Write the receipt to `<prefix>/.kiln/receipts/<name>.json`.
  pub fn write(&self, prefix: &InstallPrefix) -> Result<PathBuf, InstallError> {
    let path = prefix.receipt_path();
    let err = |source| InstallError::Receipt {
      path: path.clone(),
      source,
    };

    if let Some(dir) = path.parent() {
      fs::create_dir_all(dir).map_err(err)?;
    }
    let mut json = serde_json::to_string_pretty(self).map_err(|e| err(io::Error::other(e)))?;
    json.push('\n');

    let partial = partial_path(&path);
    fs::write(&partial, json)
      .and_then(|_| fs::rename(&partial, &path))
      .map_err(err)?;
    Ok(path)
  }

  /// Read the receipt of `prefix`, if one was written.
  pub fn read(prefix: &InstallPrefix) -> Result<Option<Self>, InstallError> {
    let path = prefix.receipt_path();
    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(source) => return Err(InstallError::Read { path, source }),
    };
    serde_json::from_str(&content)
      .map(Some)
      .map_err(|e| InstallError::Read {
        path,
        source: io::Error::new(io::ErrorKind::InvalidData, e),
      })
  }

  /// Files of this receipt missing from the prefix.
  pub fn missing_files<'a>(&'a self, root: &'a Path) -> impl Iterator<Item = &'a InstalledFile> + 'a {
    self.files.iter().filter(move |f| !root.join(&f.path).exists())
  }
}
