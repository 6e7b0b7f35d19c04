//! Per-run process environment.
//!
//! Subprocesses never inherit the environment of the kiln process. Each run
//! computes an [`Environment`] from host facts, the formula and its resolved
//! dependencies; step-local overrides are layered on with
//! [`Environment::overlay`] without changing the run's base map.
//!
//! # Build environment
//!
//! | variable | value |
//! |----------|-------|
//! | `PATH` | `bin/` of each build dependency, then the configured search path |
//! | `HOME` | build path |
//! | `TMPDIR`, `TMP`, `TEMP` | `<buildpath>/.tmp` |
//! | `LANG`, `LC_ALL` | `C` |
//! | `SOURCE_DATE_EPOCH` | fixed epoch |
//! | `<NAME>_ROOT` | root of each build dependency |
//! | `KILN_OS`, `KILN_ARCH`, `KILN_PREFIX`, `KILN_NAME`, `KILN_VERSION` | run facts |
//!
//! Formula-level `env` entries are resolved and applied last.

mod deps;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::consts::{SCRATCH_DIR, SOURCE_DATE_EPOCH};
use crate::execute::resolver::{RunPaths, RunResolver};
use crate::formula::Formula;
use crate::install::InstallPrefix;
use crate::placeholder::{self, PlaceholderError};
use crate::platform::{HostFacts, Platform};

pub use deps::{DependencyLocator, ResolvedDependencies, ResolvedDependency, SearchPathLocator, resolve_dependencies};
pub(crate) use deps::is_executable;

#[derive(Debug, Error)]
pub enum EnvError {
  #[error("unsupported architecture: {cpu}")]
  UnsupportedArchitecture { cpu: String },

  #[error("unsupported operating system: {os}")]
  UnsupportedOs { os: String },

  #[error("build dependency `{name}` not found")]
  MissingDependency { name: String },

  #[error("env {key}: {source}")]
  Placeholder {
    key: String,
    #[source]
    source: PlaceholderError,
  },

  #[error("search path cannot be joined: {0}")]
  InvalidSearchPath(String),

  #[error("failed to prepare {}: {source}", path.display())]
  Workspace {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// An immutable environment mapping handed to subprocesses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
  vars: BTreeMap<String, String>,
}

impl Environment {
  pub fn from_vars(vars: BTreeMap<String, String>) -> Self {
    Self { vars }
  }

  pub fn vars(&self) -> &BTreeMap<String, String> {
    &self.vars
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.vars.get(key).map(String::as_str)
  }

  /// `PATH` of this environment, empty when unset.
  pub fn path(&self) -> &str {
    self.get("PATH").unwrap_or_default()
  }

  /// A new environment with `overrides` applied on top of this one.
  pub fn overlay(&self, overrides: &BTreeMap<String, String>) -> Environment {
    let mut vars = self.vars.clone();
    vars.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    Environment { vars }
  }
}

/// Inputs of [`build_environment`].
#[derive(Debug, Clone, Copy)]
pub struct EnvRequest<'a> {
  pub host: &'a HostFacts,
  pub formula: &'a Formula,
  pub deps: &'a ResolvedDependencies,
  pub prefix: &'a InstallPrefix,
  pub build_dir: &'a Path,
  /// Base `PATH`, in the host's path-list syntax.
  pub search_path: &'a str,
}

/// `<NAME>_ROOT` for a dependency name: upper-cased, `-`, `.` and `+` become `_`.
pub fn root_var_name(name: &str) -> String {
  let mut var: String = name
    .chars()
    .map(|c| match c {
      '-' | '.' | '+' => '_',
      c => c.to_ascii_uppercase(),
    })
    .collect();
  var.push_str("_ROOT");
  var
}

fn join_search_path(front: Vec<PathBuf>, base: &str) -> Result<String, EnvError> {
  let paths = front
    .into_iter()
    .chain(std::env::split_paths(base).filter(|p| !p.as_os_str().is_empty()));
  let joined = std::env::join_paths(paths).map_err(|e| EnvError::InvalidSearchPath(e.to_string()))?;
  joined
    .into_string()
    .map_err(|raw| EnvError::InvalidSearchPath(raw.to_string_lossy().into_owned()))
}

fn display(path: &Path) -> String {
  path.to_string_lossy().into_owned()
}

fn base_vars(platform: Platform, formula: &Formula, prefix: &InstallPrefix, home: &Path) -> BTreeMap<String, String> {
  let mut vars = BTreeMap::new();
  let scratch = display(&home.join(SCRATCH_DIR));

  vars.insert("HOME".to_string(), display(home));
  for key in ["TMPDIR", "TMP", "TEMP"] {
    vars.insert(key.to_string(), scratch.clone());
  }
  vars.insert("LANG".to_string(), "C".to_string());
  vars.insert("LC_ALL".to_string(), "C".to_string());
  vars.insert("SOURCE_DATE_EPOCH".to_string(), SOURCE_DATE_EPOCH.to_string());

  vars.insert("KILN_OS".to_string(), platform.os.as_str().to_string());
  vars.insert("KILN_ARCH".to_string(), platform.arch.as_str().to_string());
  vars.insert("KILN_PREFIX".to_string(), display(prefix.root()));
  vars.insert("KILN_NAME".to_string(), formula.name().to_string());
  vars.insert("KILN_VERSION".to_string(), formula.version().to_string());
  vars
}

/// Compute the build environment.
///
/// Pure: the same request always yields the same map, and nothing is read
/// from or written to the filesystem. An unrecognized host fails before any
/// variable is computed.
pub fn build_environment(req: &EnvRequest<'_>) -> Result<Environment, EnvError> {
  let platform = Platform::from_facts(req.host)?;

  let mut vars = base_vars(platform, req.formula, req.prefix, req.build_dir);

  let dep_bins = req.deps.iter().map(|d| d.root.join("bin")).collect();
  vars.insert("PATH".to_string(), join_search_path(dep_bins, req.search_path)?);

  for dep in req.deps.iter() {
    vars.insert(root_var_name(&dep.name), display(&dep.root));
  }

  let paths = RunPaths::build(req.prefix.clone(), req.build_dir.to_path_buf());
  let resolver = RunResolver::new(platform, req.formula, &paths, req.deps);
  for (key, value) in req.formula.env() {
    let resolved = placeholder::substitute(value, &resolver).map_err(|source| EnvError::Placeholder {
      key: key.clone(),
      source,
    })?;
    vars.insert(key.clone(), resolved);
  }

  Ok(Environment { vars })
}

/// Compute the environment of the test recipe.
///
/// `PATH` starts with the prefix's `bin/`. Dependency roots and formula-level
/// entries are not part of it.
pub fn build_test_environment(
  platform: Platform,
  formula: &Formula,
  prefix: &InstallPrefix,
  test_dir: &Path,
  search_path: &str,
) -> Result<Environment, EnvError> {
  let mut vars = base_vars(platform, formula, prefix, test_dir);
  vars.insert("PATH".to_string(), join_search_path(vec![prefix.bin()], search_path)?);
  Ok(Environment { vars })
}
