//! Run configuration.
//!
//! Values come from an optional JSON file at `<config_dir>/config.json`,
//! then `KILN_PREFIX` / `KILN_WORK_DIR`, then whatever the caller sets on top
//! (the CLI applies its flags last).

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::debug;

use crate::env::SearchPathLocator;
use crate::platform::paths::{config_dir, default_prefix, default_work_dir};

pub const CONFIG_FILENAME: &str = "config.json";
pub const PREFIX_ENV: &str = "KILN_PREFIX";
pub const WORK_DIR_ENV: &str = "KILN_WORK_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid config {}: {message}", path.display())]
  Parse { path: PathBuf, message: String },

  #[error("invalid timeout `{value}`: {message}")]
  InvalidTimeout { value: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
  /// Install prefix.
  pub prefix: PathBuf,
  /// Parent directory of staged build and test paths.
  pub work_dir: PathBuf,
  /// Base `PATH` of builds, in the host's path-list syntax.
  pub search_path: String,
  /// Dependency name to root directory, checked before the search path.
  pub dependency_roots: BTreeMap<String, PathBuf>,
  /// Wall-clock limit of each spawned program, e.g. `"10m"`.
  #[serde(
    serialize_with = "serialize_timeout",
    deserialize_with = "deserialize_timeout",
    skip_serializing_if = "Option::is_none"
  )]
  pub step_timeout: Option<Duration>,
  /// Keep the staged build path after a successful run.
  pub keep_build_dir: bool,
}

impl Default for RunConfig {
  fn default() -> Self {
    Self {
      prefix: default_prefix(),
      work_dir: default_work_dir(),
      search_path: std::env::var("PATH").unwrap_or_default(),
      dependency_roots: BTreeMap::new(),
      step_timeout: None,
      keep_build_dir: false,
    }
  }
}

impl RunConfig {
  pub fn default_path() -> PathBuf {
    config_dir().join(CONFIG_FILENAME)
  }

  /// Load the user config file (if any) and apply environment overrides.
  pub fn load() -> Result<Self, ConfigError> {
    Self::load_from(&Self::default_path())
  }

  /// Like [`RunConfig::load`] with an explicit file. A missing file yields
  /// the defaults.
  pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
    let config = match std::fs::read_to_string(path) {
      Ok(content) => {
        debug!(path = %path.display(), "loading config");
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
          path: path.to_path_buf(),
          message: e.to_string(),
        })?
      }
      Err(e) if e.kind() == io::ErrorKind::NotFound => RunConfig::default(),
      Err(source) => {
        return Err(ConfigError::Read {
          path: path.to_path_buf(),
          source,
        });
      }
    };
    Ok(config.with_env_overrides())
  }

  fn with_env_overrides(mut self) -> Self {
    if let Some(prefix) = std::env::var_os(PREFIX_ENV).filter(|v| !v.is_empty()) {
      self.prefix = PathBuf::from(prefix);
    }
    if let Some(work_dir) = std::env::var_os(WORK_DIR_ENV).filter(|v| !v.is_empty()) {
      self.work_dir = PathBuf::from(work_dir);
    }
    self
  }

  /// Locator for the configured roots and search path.
  pub fn locator(&self) -> SearchPathLocator {
    SearchPathLocator::new(self.search_path.clone()).with_roots(self.dependency_roots.clone())
  }
}

/// Parse a human-readable duration such as `90s` or `5m`.
pub fn parse_timeout(value: &str) -> Result<Duration, ConfigError> {
  humantime::parse_duration(value).map_err(|e| ConfigError::InvalidTimeout {
    value: value.to_string(),
    message: e.to_string(),
  })
}

fn serialize_timeout<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
  match value {
    Some(d) => serializer.serialize_str(&humantime::format_duration(*d).to_string()),
    None => serializer.serialize_none(),
  }
}

fn deserialize_timeout<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
  let value: Option<String> = Option::deserialize(deserializer)?;
  value
    .map(|v| parse_timeout(&v).map_err(serde::de::Error::custom))
    .transpose()
}
