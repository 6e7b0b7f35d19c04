//! The raw, unvalidated formula record as it appears in a formula file.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::action::{Step, TestRecipe};

use super::DependencyPhase;

/// Formula fields exactly as parsed. Every identity field is optional here so
/// that a missing one is reported as a formula error naming the field, not as
/// a parse error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormulaSpec {
  pub name: Option<String>,
  pub desc: Option<String>,
  pub homepage: Option<String>,
  pub url: Option<String>,
  pub version: Option<String>,
  pub sha256: Option<String>,
  pub license: Option<String>,
  #[serde(default)]
  pub depends_on: Vec<DependencySpec>,
  #[serde(default)]
  pub env: BTreeMap<String, String>,
  #[serde(default)]
  pub build: Vec<Step>,
  #[serde(default)]
  pub install: Vec<Step>,
  #[serde(default)]
  pub test: Option<TestRecipe>,
}

/// A dependency given either as a bare name (runtime) or as
/// `{ name, phase, bin }`. `bin` names the program that locates it when that
/// differs from the name (`llvm` is found through `clang`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DependencySpec {
  Name(String),
  Full {
    name: String,
    #[serde(default)]
    phase: DependencyPhase,
    #[serde(default)]
    bin: Option<String>,
  },
}

impl DependencySpec {
  pub fn name(&self) -> &str {
    match self {
      DependencySpec::Name(name) | DependencySpec::Full { name, .. } => name,
    }
  }

  pub fn phase(&self) -> DependencyPhase {
    match self {
      DependencySpec::Name(_) => DependencyPhase::Runtime,
      DependencySpec::Full { phase, .. } => *phase,
    }
  }

  pub fn bin(&self) -> Option<&str> {
    match self {
      DependencySpec::Name(_) => None,
      DependencySpec::Full { bin, .. } => bin.as_deref(),
    }
  }
}
