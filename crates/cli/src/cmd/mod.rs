mod check;
mod env;
mod info;
mod install;
mod test;

pub use check::cmd_check;
pub use env::cmd_env;
pub use info::cmd_info;
pub use install::cmd_install;
pub use test::cmd_test;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use kiln_lib::Formula;
use kiln_lib::config::RunConfig;
use kiln_lib::formula;

/// Command-line values layered over the loaded [`RunConfig`].
pub struct Overrides<'a> {
  pub config: Option<&'a Path>,
  pub prefix: Option<PathBuf>,
  pub timeout: Option<Duration>,
  pub keep_build: bool,
}

impl Overrides<'_> {
  pub fn load(self) -> Result<RunConfig> {
    let mut config = match self.config {
      Some(path) => RunConfig::load_from(path),
      None => RunConfig::load(),
    }
    .context("Failed to load config")?;

    if let Some(prefix) = self.prefix {
      config.prefix = prefix;
    }
    if self.timeout.is_some() {
      config.step_timeout = self.timeout;
    }
    config.keep_build_dir |= self.keep_build;
    Ok(config)
  }
}

pub fn load_formula(path: &Path) -> Result<Formula> {
  formula::load(path).with_context(|| format!("Failed to load formula {}", path.display()))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Runtime::new().context("Failed to create async runtime")
}
