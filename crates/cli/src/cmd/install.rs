//! Implementation of the `kiln install` command.
//!
//! Builds a formula from a verified source tree, installs it into the prefix
//! and runs its test recipe, holding the prefix lock for the whole run.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::info;

use kiln_lib::{KilnError, Stage};
use kiln_lib::execute::StepRecord;
use kiln_lib::orchestrator::{ExecutionResult, Failure, InstallSummary, Orchestrator};
use kiln_lib::platform::HostFacts;
use kiln_lib::prefix_lock::{LockMode, PrefixLock};

use super::{Overrides, load_formula, runtime};
use crate::output::{
  OutputFormat, format_duration, print_info, print_json, print_stat, print_step_records, print_success, symbols,
};

/// JSON shape of a failed run.
#[derive(Debug, Serialize)]
pub struct FailureOutput<'a> {
  pub stage: Option<Stage>,
  pub error: String,
  /// Captured stderr of the failed step, if a program ran.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub stderr: Option<&'a str>,
  pub steps: &'a [StepRecord],
}

impl<'a> FailureOutput<'a> {
  pub fn new(failure: &'a Failure) -> Self {
    let stderr = match &failure.error {
      KilnError::Build(e) | KilnError::Install(e) => e.stderr(),
      _ => None,
    };
    Self {
      stage: failure.stage,
      error: failure.detail(),
      stderr,
      steps: &failure.steps,
    }
  }
}

pub fn cmd_install(
  formula: &Path,
  source: &Path,
  overrides: Overrides<'_>,
  verify: bool,
  output: OutputFormat,
) -> Result<()> {
  let start = Instant::now();
  let formula = load_formula(formula)?;
  let config = overrides.load()?;
  let orchestrator = Orchestrator::from_config(config);

  let prefix = orchestrator.prefix_for(&formula);
  let _lock = PrefixLock::acquire(&prefix, LockMode::Exclusive).context("Failed to acquire prefix lock")?;

  let result = runtime()?.block_on(orchestrator.run(&formula, &HostFacts::current(), source, verify));

  match result {
    ExecutionResult::Success(summary) => {
      if output.is_json() {
        print_json(&summary)?;
      } else {
        print_summary(&summary, start);
      }
      info!(receipt = %summary.receipt.display(), "install complete");
      Ok(())
    }
    ExecutionResult::Failure(failure) => {
      if output.is_json() {
        print_json(&FailureOutput::new(&failure))?;
      } else if !failure.steps.is_empty() {
        print_step_records(&failure.steps);
      }
      bail!("{failure}")
    }
  }
}

fn print_summary(summary: &InstallSummary, start: Instant) {
  print_success(&format!(
    "Installed {} {} into {}",
    summary.name,
    summary.version,
    summary.prefix.display()
  ));
  for file in &summary.files {
    println!("  {} {}", symbols::PLUS, file.path);
  }
  println!();
  print_stat("Platform", &summary.platform.to_string());
  print_stat("Files", &summary.files.len().to_string());
  print_stat("Receipt", &summary.receipt.display().to_string());
  match &summary.test {
    Some(report) => print_stat(
      "Test",
      &format!("{} runs, {} assertions passed", report.runs, report.assertions),
    ),
    None => print_stat("Test", "skipped"),
  }
  if let Some(dir) = &summary.build_dir {
    print_info(&format!("Build directory kept at {}", dir.display()));
  }
  print_stat("Duration", &format_duration(start.elapsed()));
}
