//! The formula model.
//!
//! A [`Formula`] is the validated, immutable description of one package: its
//! identity, dependencies, build and install step sequences, and an optional
//! test recipe. Formulas are loaded from Lua or JSON files (see [`load`]) or
//! built directly from a [`FormulaSpec`].
//!
//! Construction performs every check that does not need the filesystem of a
//! run; see [`validate`] for the rules. Nothing is executed at construction.

mod lua;
mod spec;
mod validate;

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::action::{Step, TestRecipe};
use crate::placeholder::PlaceholderError;

pub use spec::{DependencySpec, FormulaSpec};

/// When a dependency is needed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyPhase {
  /// Must be resolvable before any build step runs.
  Build,
  /// Recorded only.
  #[default]
  Runtime,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
  pub name: String,
  pub phase: DependencyPhase,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bin: Option<String>,
}

impl Dependency {
  /// Program whose location identifies the dependency.
  pub fn program(&self) -> &str {
    self.bin.as_deref().unwrap_or(&self.name)
  }

  pub fn is_build(&self) -> bool {
    self.phase == DependencyPhase::Build
  }
}

/// Errors that make a formula unusable. All of them are reported before any
/// stage of a run starts.
#[derive(Debug, Error)]
pub enum FormulaError {
  #[error("missing required field `{0}`")]
  MissingField(&'static str),

  #[error("invalid `{field}`: {reason}")]
  InvalidField { field: &'static str, reason: String },

  #[error("duplicate dependency `{0}`")]
  DuplicateDependency(String),

  #[error("{location}: {source}")]
  Placeholder {
    location: String,
    #[source]
    source: PlaceholderError,
  },

  #[error("{location}: placeholder `{placeholder}` is not available here")]
  PlaceholderScope { location: String, placeholder: String },

  #[error("{location}: `$${{dep:{name}}}` does not name a build dependency")]
  UndeclaredDependency { location: String, name: String },

  #[error("{location}: path `{path}` must be relative and stay inside its directory")]
  UnsafePath { location: String, path: String },

  #[error("{location}: copy with `rename` must name a single file, not a pattern")]
  RenamePattern { location: String },

  #[error("test action {index}: assert has no preceding run")]
  AssertWithoutRun { index: usize },

  #[error("failed to read formula {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse formula {}: {message}", path.display())]
  Parse { path: PathBuf, message: String },

  #[error("unsupported formula format: {} (expected .lua or .json)", path.display())]
  UnsupportedFormat { path: PathBuf },
}

/// A validated package formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Formula {
  name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  desc: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  homepage: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  url: Option<String>,
  version: String,
  sha256: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  license: Option<String>,
  depends_on: Vec<Dependency>,
  env: BTreeMap<String, String>,
  build: Vec<Step>,
  install: Vec<Step>,
  #[serde(skip_serializing_if = "Option::is_none")]
  test: Option<TestRecipe>,
}

impl Formula {
  /// Validate a raw record into a formula.
  pub fn from_spec(spec: FormulaSpec) -> Result<Self, FormulaError> {
    let name = required("name", spec.name)?;
    let version = required("version", spec.version)?;
    let sha256 = required("sha256", spec.sha256)?;

    validate::name(&name)?;
    validate::version(&version)?;
    validate::sha256(&sha256)?;

    let mut depends_on: Vec<Dependency> = Vec::with_capacity(spec.depends_on.len());
    for dep in &spec.depends_on {
      validate::dependency_name(dep.name())?;
      if let Some(bin) = dep.bin() {
        validate::dependency_name(bin)?;
      }
      if depends_on.iter().any(|d| d.name == dep.name()) {
        return Err(FormulaError::DuplicateDependency(dep.name().to_string()));
      }
      depends_on.push(Dependency {
        name: dep.name().to_string(),
        phase: dep.phase(),
        bin: dep.bin().map(str::to_string),
      });
    }

    let formula = Formula {
      name,
      desc: spec.desc,
      homepage: spec.homepage,
      url: spec.url,
      version,
      sha256,
      license: spec.license,
      depends_on,
      env: spec.env,
      build: spec.build,
      install: spec.install,
      test: spec.test.filter(|t| !t.is_empty()),
    };

    validate::body(&formula)?;
    Ok(formula)
  }

  /// Parse and validate a JSON formula.
  pub fn from_json_str(source: &str, path: &Path) -> Result<Self, FormulaError> {
    let spec: FormulaSpec = serde_json::from_str(source).map_err(|e| FormulaError::Parse {
      path: path.to_path_buf(),
      message: e.to_string(),
    })?;
    Self::from_spec(spec)
  }

  /// Evaluate and validate a Lua formula.
  pub fn from_lua_str(source: &str, path: &Path) -> Result<Self, FormulaError> {
    Self::from_spec(lua::evaluate(source, path)?)
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn desc(&self) -> Option<&str> {
    self.desc.as_deref()
  }

  pub fn homepage(&self) -> Option<&str> {
    self.homepage.as_deref()
  }

  pub fn url(&self) -> Option<&str> {
    self.url.as_deref()
  }

  pub fn version(&self) -> &str {
    &self.version
  }

  pub fn sha256(&self) -> &str {
    &self.sha256
  }

  pub fn license(&self) -> Option<&str> {
    self.license.as_deref()
  }

  pub fn dependencies(&self) -> &[Dependency] {
    &self.depends_on
  }

  /// Dependencies that must be resolved before building, in declaration order.
  pub fn build_dependencies(&self) -> impl Iterator<Item = &Dependency> {
    self.depends_on.iter().filter(|d| d.is_build())
  }

  /// Formula-level environment entries, placeholders unresolved.
  pub fn env(&self) -> &BTreeMap<String, String> {
    &self.env
  }

  pub fn build_steps(&self) -> &[Step] {
    &self.build
  }

  pub fn install_steps(&self) -> &[Step] {
    &self.install
  }

  pub fn test(&self) -> Option<&TestRecipe> {
    self.test.as_ref()
  }
}

fn required(field: &'static str, value: Option<String>) -> Result<String, FormulaError> {
  match value {
    Some(v) if !v.trim().is_empty() => Ok(v),
    _ => Err(FormulaError::MissingField(field)),
  }
}

/// Load a formula file, dispatching on its extension.
pub fn load(path: &Path) -> Result<Formula, FormulaError> {
  let read = || {
    std::fs::read_to_string(path).map_err(|source| FormulaError::Read {
      path: path.to_path_buf(),
      source,
    })
  };

  match path.extension().and_then(|e| e.to_str()) {
    Some("lua") => Formula::from_lua_str(&read()?, path),
    Some("json") => Formula::from_json_str(&read()?, path),
    _ => Err(FormulaError::UnsupportedFormat {
      path: path.to_path_buf(),
    }),
  }
}
