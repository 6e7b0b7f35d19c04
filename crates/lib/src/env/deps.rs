//! Build dependency resolution.
//!
//! Resolution runs before the environment is built: it touches the
//! filesystem, the builder itself does not. A dependency resolves to a root
//! directory, the one a toolchain is usually installed under (`<root>/bin/go`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::EnvError;
use crate::formula::{Dependency, Formula};

/// Finds the root directory of a dependency.
pub trait DependencyLocator {
  fn locate(&self, dep: &Dependency) -> Option<PathBuf>;
}

/// Locates dependencies through explicit roots, then through a search path.
///
/// Roots are keyed by dependency name. On the search path the dependency's
/// program (its `bin`, or its name) is looked up: `<dir>/<program>` gives root
/// `<dir>/..` when `<dir>` is named `bin`, and `<dir>` otherwise.
#[derive(Debug, Clone, Default)]
pub struct SearchPathLocator {
  roots: BTreeMap<String, PathBuf>,
  search_path: String,
}

impl SearchPathLocator {
  pub fn new(search_path: impl Into<String>) -> Self {
    Self {
      roots: BTreeMap::new(),
      search_path: search_path.into(),
    }
  }

  pub fn with_roots(mut self, roots: BTreeMap<String, PathBuf>) -> Self {
    self.roots = roots;
    self
  }

  fn find_executable(&self, name: &str) -> Option<PathBuf> {
    std::env::split_paths(&self.search_path)
      .filter(|dir| !dir.as_os_str().is_empty())
      .flat_map(|dir| executable_names(name).map(move |file| dir.join(file)))
      .find(|candidate| is_executable(candidate))
  }
}

impl DependencyLocator for SearchPathLocator {
  fn locate(&self, dep: &Dependency) -> Option<PathBuf> {
    if let Some(root) = self.roots.get(&dep.name) {
      return Some(root.clone());
    }

    let exe = self.find_executable(dep.program())?;
    let dir = exe.parent()?;
    let root = if dir.file_name().is_some_and(|n| n == "bin") {
      dir.parent().unwrap_or(dir)
    } else {
      dir
    };
    Some(dunce::simplified(root).to_path_buf())
  }
}

#[cfg(windows)]
fn executable_names(name: &str) -> impl Iterator<Item = String> {
  [format!("{name}.exe"), format!("{name}.cmd"), name.to_string()].into_iter()
}

#[cfg(not(windows))]
fn executable_names(name: &str) -> impl Iterator<Item = String> {
  std::iter::once(name.to_string())
}

/// True for a regular file the current user may execute.
#[cfg(unix)]
pub(crate) fn is_executable(path: &Path) -> bool {
  use std::os::unix::fs::PermissionsExt;
  path
    .metadata()
    .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
    .unwrap_or(false)
}

#[cfg(windows)]
pub(crate) fn is_executable(path: &Path) -> bool {
  path.is_file()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDependency {
  pub name: String,
  pub root: PathBuf,
}

/// Roots of a formula's build dependencies, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedDependencies {
  entries: Vec<ResolvedDependency>,
}

impl ResolvedDependencies {
  pub fn new(entries: Vec<ResolvedDependency>) -> Self {
    Self { entries }
  }

  pub fn iter(&self) -> impl Iterator<Item = &ResolvedDependency> {
    self.entries.iter()
  }

  pub fn root(&self, name: &str) -> Option<&Path> {
    self.entries.iter().find(|d| d.name == name).map(|d| d.root.as_path())
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

/// Resolve every build dependency of `formula`.
///
/// Runtime dependencies are not resolved. The first unresolvable build
/// dependency is reported.
pub fn resolve_dependencies(
  formula: &Formula,
  locator: &impl DependencyLocator,
) -> Result<ResolvedDependencies, EnvError> {
  let mut entries = Vec::new();
  for dep in formula.build_dependencies() {
    let root = locator
      .locate(dep)
      .ok_or_else(|| EnvError::MissingDependency { name: dep.name.clone() })?;
    debug!(name = %dep.name, root = %root.display(), "resolved build dependency");
    entries.push(ResolvedDependency {
      name: dep.name.clone(),
      root,
    });
  }
  Ok(ResolvedDependencies::new(entries))
}
