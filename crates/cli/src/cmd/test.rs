//! Implementation of the `kiln test` command.

use std::path::Path;

use anyhow::{Context, Result, bail};

use kiln_lib::install::Receipt;
use kiln_lib::orchestrator::Orchestrator;
use kiln_lib::platform::HostFacts;
use kiln_lib::prefix_lock::{LockMode, PrefixLock};

use super::{Overrides, load_formula, runtime};
use crate::output::{OutputFormat, print_info, print_json, print_success, print_warning};

pub fn cmd_test(formula: &Path, overrides: Overrides<'_>, output: OutputFormat) -> Result<()> {
  let formula = load_formula(formula)?;
  let orchestrator = Orchestrator::from_config(overrides.load()?);
  let prefix = orchestrator.prefix_for(&formula);

  let _lock = PrefixLock::acquire(&prefix, LockMode::Shared).context("Failed to acquire prefix lock")?;

  let Some(receipt) = Receipt::read(&prefix)? else {
    bail!("{} is not installed in {}", formula.name(), prefix.root().display());
  };
  if receipt.version != formula.version() {
    print_warning(&format!(
      "installed version {} differs from formula version {}",
      receipt.version,
      formula.version()
    ));
  }
  for file in receipt.missing_files(prefix.root()) {
    print_warning(&format!("installed file missing: {}", file.path));
  }

  let report = match runtime()?.block_on(orchestrator.verify_installed(&formula, &HostFacts::current())) {
    Ok(report) => report,
    Err(failure) => bail!("{failure}"),
  };

  if output.is_json() {
    return print_json(&report);
  }
  match report {
    Some(report) => print_success(&format!(
      "{} {}: {} runs, {} assertions passed",
      formula.name(),
      formula.version(),
      report.runs,
      report.assertions
    )),
    None => print_info(&format!("{} has no test recipe", formula.name())),
  }
  Ok(())
}
