//! Implementation of the `kiln env` command.
//!
//! Resolves build dependencies and prints the environment the build steps
//! would see. Nothing is staged or launched.

use std::path::Path;

use anyhow::Result;

use kiln_lib::orchestrator::Orchestrator;
use kiln_lib::platform::HostFacts;

use super::{Overrides, load_formula};
use crate::output::{OutputFormat, print_json};

pub fn cmd_env(formula: &Path, overrides: Overrides<'_>, output: OutputFormat) -> Result<()> {
  let formula = load_formula(formula)?;
  let orchestrator = Orchestrator::from_config(overrides.load()?);
  let env = orchestrator.environment(&formula, &HostFacts::current())?;

  if output.is_json() {
    return print_json(env.vars());
  }
  for (key, value) in env.vars() {
    println!("{key}={value}");
  }
  Ok(())
}
