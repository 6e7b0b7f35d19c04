//! Top-level error type of a kiln run.
//!
//! Each component reports its own error enum; [`KilnError`] is the closed set
//! of kinds a run can terminate with, and [`Stage`] is where it happened.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::env::EnvError;
use crate::execute::StepError;
use crate::formula::FormulaError;
use crate::install::InstallError;
use crate::verify::VerifyError;

/// Where in a run a failure originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
  Environment,
  Build,
  Install,
  Test,
}

impl Stage {
  pub fn as_str(&self) -> &'static str {
    match self {
      Stage::Environment => "environment",
      Stage::Build => "build",
      Stage::Install => "install",
      Stage::Test => "test",
    }
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Error)]
pub enum KilnError {
  #[error("malformed formula: {0}")]
  MalformedFormula(#[from] FormulaError),

  #[error("unsupported architecture: {cpu}")]
  UnsupportedArchitecture { cpu: String },

  #[error(transparent)]
  Environment(EnvError),

  #[error("build failed: {0}")]
  Build(StepError),

  #[error("install failed: {0}")]
  Install(StepError),

  #[error("install failed: {0}")]
  Receipt(InstallError),

  #[error("verification failed: {0}")]
  Verification(#[from] VerifyError),
}

impl KilnError {
  /// The stage this error is tagged with. Formula errors happen before any
  /// stage runs.
  pub fn stage(&self) -> Option<Stage> {
    match self {
      KilnError::MalformedFormula(_) => None,
      KilnError::UnsupportedArchitecture { .. } | KilnError::Environment(_) => Some(Stage::Environment),
      KilnError::Build(_) => Some(Stage::Build),
      KilnError::Install(_) | KilnError::Receipt(_) => Some(Stage::Install),
      KilnError::Verification(_) => Some(Stage::Test),
    }
  }
}

impl From<EnvError> for KilnError {
  fn from(err: EnvError) -> Self {
    match err {
      EnvError::UnsupportedArchitecture { cpu } => KilnError::UnsupportedArchitecture { cpu },
      other => KilnError::Environment(other),
    }
  }
}
