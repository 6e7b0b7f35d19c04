//! Installation into a prefix.
//!
//! The [`Installer`] copies build output matched by a `copy` step into an
//! [`InstallPrefix`]. Copies are all-or-nothing per file: each file is written
//! to a temporary sibling and renamed into place, so a destination is either
//! complete or absent. Existing files are overwritten; files of a previous
//! install that are not part of this one are left alone.

pub mod glob;
mod prefix;
mod receipt;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::consts::PARTIAL_SUFFIX;
use crate::util::hash::{HashError, hash_file};

pub use prefix::{InstallDir, InstallPrefix, InvalidInstallDir};
pub use receipt::Receipt;

#[derive(Debug, Error)]
pub enum InstallError {
  #[error("artifact `{pattern}` not found in {}", dir.display())]
  MissingArtifact { pattern: String, dir: PathBuf },

  #[error("`{pattern}` matched {count} paths but `rename` needs exactly one")]
  AmbiguousRename { pattern: String, count: usize },

  #[error("failed to create {}: {source}", path.display())]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to copy {} to {}: {source}", from.display(), to.display())]
  Copy {
    from: PathBuf,
    to: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to read {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Hash(#[from] HashError),

  #[error("failed to write receipt {}: {source}", path.display())]
  Receipt {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// A file written into the prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstalledFile {
  /// Path relative to the prefix root, `/`-separated.
  pub path: String,
  pub sha256: String,
}

/// A resolved `copy` request.
#[derive(Debug, Clone, Copy)]
pub struct CopyRequest<'a> {
  /// Source path or pattern, relative to `cwd`.
  pub from: &'a str,
  pub to: &'a InstallDir,
  pub rename: Option<&'a str>,
  pub cwd: &'a Path,
}

pub struct Installer<'a> {
  prefix: &'a InstallPrefix,
}

impl<'a> Installer<'a> {
  pub fn new(prefix: &'a InstallPrefix) -> Self {
    Self { prefix }
  }

  /// Copy every path matched by `req.from` into its destination.
  ///
  /// All matches are expanded before anything is copied: a missing artifact
  /// leaves the prefix untouched.
  pub fn install(&self, req: &CopyRequest<'_>) -> Result<Vec<InstalledFile>, InstallError> {
    let matches = glob::expand(req.cwd, req.from).map_err(|source| InstallError::Read {
      path: req.cwd.to_path_buf(),
      source,
    })?;

    if matches.is_empty() {
      return Err(InstallError::MissingArtifact {
        pattern: req.from.to_string(),
        dir: req.cwd.to_path_buf(),
      });
    }
    if req.rename.is_some() && matches.len() != 1 {
      return Err(InstallError::AmbiguousRename {
        pattern: req.from.to_string(),
        count: matches.len(),
      });
    }

    let dest_dir = self.prefix.dir(req.to);
    fs::create_dir_all(&dest_dir).map_err(|source| InstallError::CreateDir {
      path: dest_dir.clone(),
      source,
    })?;

    let mut installed = Vec::new();
    for source in &matches {
      let name = match (req.rename, source.file_name()) {
        (Some(rename), _) => rename.into(),
        (None, Some(name)) => name.to_os_string(),
        (None, None) => continue,
      };
      let dest = dest_dir.join(name);

      if source.is_dir() {
        self.copy_dir(source, &dest, &mut installed)?;
      } else {
        installed.push(self.copy_file(source, &dest)?);
      }
    }

    Ok(installed)
  }

  fn copy_dir(&self, source: &Path, dest: &Path, installed: &mut Vec<InstalledFile>) -> Result<(), InstallError> {
    for entry in WalkDir::new(source).sort_by_file_name() {
      let entry = entry.map_err(|e| InstallError::Read {
        path: source.to_path_buf(),
        source: io::Error::other(e),
      })?;
      let rel = entry.path().strip_prefix(source).unwrap_or(entry.path());
      let target = dest.join(rel);

      if entry.file_type().is_dir() {
        fs::create_dir_all(&target).map_err(|source| InstallError::CreateDir { path: target, source })?;
      } else {
        installed.push(self.copy_file(entry.path(), &target)?);
      }
    }
    Ok(())
  }

  fn copy_file(&self, source: &Path, dest: &Path) -> Result<InstalledFile, InstallError> {
    copy_atomic(source, dest).map_err(|e| InstallError::Copy {
      from: source.to_path_buf(),
      to: dest.to_path_buf(),
      source: e,
    })?;
    debug!(from = %source.display(), to = %dest.display(), "installed file");

    let sha256 = hash_file(dest)?.0;
    Ok(InstalledFile {
      path: self.relative(dest),
      sha256,
    })
  }

  fn relative(&self, path: &Path) -> String {
    let rel = path.strip_prefix(self.prefix.root()).unwrap_or(path);
    rel
      .components()
      .map(|c| c.as_os_str().to_string_lossy())
      .collect::<Vec<_>>()
      .join("/")
  }
}

/// Temporary sibling a copy is staged in before it is renamed to `dest`.
pub(crate) fn partial_path(dest: &Path) -> PathBuf {
  let name = dest.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
  dest.with_file_name(format!(".{name}{PARTIAL_SUFFIX}"))
}

fn copy_atomic(source: &Path, dest: &Path) -> io::Result<()> {
  let partial = partial_path(dest);
  let result = fs::copy(source, &partial).and_then(|_| fs::rename(&partial, dest));
  if result.is_err() {
    let _ = fs::remove_file(&partial);
  }
  result
}
