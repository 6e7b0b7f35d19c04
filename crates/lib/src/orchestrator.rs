//! One install run.
//!
//! The [`Orchestrator`] composes the other components:
//!
//! 1. validate the host platform
//! 2. resolve build dependencies
//! 3. stage the source in `<work_dir>/<name>-<version>`
//! 4. compute the build environment
//! 5. run the build steps, then the install steps
//! 6. write the install receipt
//! 7. run the test recipe, if asked to
//!
//! The first failure ends the run with the stage it happened in. Nothing is
//! cleaned up after a failure: the prefix and the build directory keep
//! whatever state they reached.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::TempDir;
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::consts::SCRATCH_DIR;
use crate::env::{
  DependencyLocator, EnvError, EnvRequest, Environment, ResolvedDependencies, SearchPathLocator, build_environment,
  build_test_environment, resolve_dependencies,
};
use crate::error::{KilnError, Stage};
use crate::execute::actions::{CommandRunner, ProcessRunner};
use crate::execute::resolver::{RunPaths, RunResolver};
use crate::execute::{Phase, SequenceFailure, SequenceReport, StepExecutor, StepRecord};
use crate::formula::Formula;
use crate::install::{InstallPrefix, InstalledFile, Receipt};
use crate::platform::{HostFacts, Platform};
use crate::util::fs::{copy_tree, remove_dir_if_exists};
use crate::verify::{VerifyReport, Verifier};

/// What a successful run did.
#[derive(Debug, Clone, Serialize)]
pub struct InstallSummary {
  pub name: String,
  pub version: String,
  pub platform: Platform,
  pub prefix: PathBuf,
  pub receipt: PathBuf,
  pub build_steps: Vec<StepRecord>,
  pub install_steps: Vec<StepRecord>,
  pub files: Vec<InstalledFile>,
  /// `None` if the test recipe was skipped or the formula has none.
  pub test: Option<VerifyReport>,
  /// Set if the build directory was kept.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub build_dir: Option<PathBuf>,
}

/// A run that stopped early.
#[derive(Debug)]
pub struct Failure {
  pub stage: Option<Stage>,
  pub error: KilnError,
  /// Step states at the halt, for build and install failures.
  pub steps: Vec<StepRecord>,
}

impl Failure {
  fn with_steps(error: KilnError, steps: Vec<StepRecord>) -> Self {
    Self {
      stage: error.stage(),
      error,
      steps,
    }
  }

  /// Human-readable failure detail.
  pub fn detail(&self) -> String {
    self.error.to_string()
  }
}

impl From<KilnError> for Failure {
  fn from(err: KilnError) -> Self {
    Failure::with_steps(err, Vec::new())
  }
}

impl From<EnvError> for Failure {
  fn from(err: EnvError) -> Self {
    Failure::from(KilnError::from(err))
  }
}

impl fmt::Display for Failure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.stage {
      Some(stage) => write!(f, "{stage} stage failed: {}", self.error),
      None => write!(f, "{}", self.error),
    }
  }
}

#[derive(Debug)]
pub enum ExecutionResult {
  Success(InstallSummary),
  Failure(Failure),
}

impl ExecutionResult {
  pub fn into_result(self) -> Result<InstallSummary, Failure> {
    match self {
      ExecutionResult::Success(summary) => Ok(summary),
      ExecutionResult::Failure(failure) => Err(failure),
    }
  }
}

impl From<Result<InstallSummary, Failure>> for ExecutionResult {
  fn from(result: Result<InstallSummary, Failure>) -> Self {
    match result {
      Ok(summary) => ExecutionResult::Success(summary),
      Err(failure) => ExecutionResult::Failure(failure),
    }
  }
}

pub struct Orchestrator<R: CommandRunner, L: DependencyLocator> {
  runner: R,
  locator: L,
  config: RunConfig,
}

impl Orchestrator<ProcessRunner, SearchPathLocator> {
  /// Orchestrator that spawns real processes and locates dependencies as
  /// `config` describes.
  pub fn from_config(config: RunConfig) -> Self {
    let locator = config.locator();
    Self::new(ProcessRunner, locator, config)
  }
}

impl<R: CommandRunner, L: DependencyLocator> Orchestrator<R, L> {
  pub fn new(runner: R, locator: L, config: RunConfig) -> Self {
    Self {
      runner,
      locator,
      config,
    }
  }

  pub fn config(&self) -> &RunConfig {
    &self.config
  }

  pub fn runner(&self) -> &R {
    &self.runner
  }

  pub fn prefix_for(&self, formula: &Formula) -> InstallPrefix {
    InstallPrefix::new(&self.config.prefix, formula.name())
  }

  /// Staged source path of `formula`.
  pub fn build_dir(&self, formula: &Formula) -> PathBuf {
    self
      .config
      .work_dir
      .join(format!("{}-{}", formula.name(), formula.version()))
  }

  /// A fresh `<work_dir>/<name>-<version>-test-XXXXXX` directory. Every
  /// verification gets its own, so concurrent runs never share fixtures.
  fn test_dir(&self, formula: &Formula) -> Result<TempDir, EnvError> {
    let work_dir = &self.config.work_dir;
    std::fs::create_dir_all(work_dir).map_err(workspace_error(work_dir))?;
    let dir = tempfile::Builder::new()
      .prefix(&format!("{}-{}-test-", formula.name(), formula.version()))
      .tempdir_in(work_dir)
      .map_err(workspace_error(work_dir))?;
    let scratch = dir.path().join(SCRATCH_DIR);
    std::fs::create_dir_all(&scratch).map_err(workspace_error(&scratch))?;
    Ok(dir)
  }

  /// Build and install `formula` from the verified source tree at `source`.
  pub async fn run(&self, formula: &Formula, host: &HostFacts, source: &Path, verify: bool) -> ExecutionResult {
    info!(name = formula.name(), version = formula.version(), "installing formula");
    let result = self.try_run(formula, host, source, verify).await;

    if let Err(failure) = &result {
      let build_dir = self.build_dir(formula);
      if build_dir.exists() {
        warn!(dir = %build_dir.display(), stage = ?failure.stage, "run failed, build directory retained");
      }
    }
    result.into()
  }

  async fn try_run(
    &self,
    formula: &Formula,
    host: &HostFacts,
    source: &Path,
    verify: bool,
  ) -> Result<InstallSummary, Failure> {
    let platform = Platform::from_facts(host)?;
    let deps = resolve_dependencies(formula, &self.locator)?;
    let prefix = self.prefix_for(formula);

    let build_dir = self.build_dir(formula);
    stage_source(source, &build_dir)?;

    let env = build_environment(&EnvRequest {
      host,
      formula,
      deps: &deps,
      prefix: &prefix,
      build_dir: &build_dir,
      search_path: &self.config.search_path,
    })?;
    let resolver = RunResolver::new(
      platform,
      formula,
      &RunPaths::build(prefix.clone(), build_dir.clone()),
      &deps,
    );
    let executor =
      StepExecutor::new(&self.runner, &env, &resolver, &prefix).with_timeout(self.config.step_timeout);

    info!(stage = %Stage::Build, "starting stage");
    let build = executor
      .run(Phase::Build, formula.build_steps(), &build_dir)
      .await
      .map_err(|f| sequence_failure(f, KilnError::Build))?;

    info!(stage = %Stage::Install, prefix = %prefix.root().display(), "starting stage");
    let install = executor
      .run(Phase::Install, formula.install_steps(), &build_dir)
      .await
      .map_err(|f| sequence_failure(f, KilnError::Install))?;

    let installed = build.installed.iter().chain(&install.installed).cloned().collect();
    let receipt = Receipt::new(formula, installed);
    let receipt_path = receipt.write(&prefix).map_err(KilnError::Receipt)?;

    let kept = if self.config.keep_build_dir {
      warn!(dir = %build_dir.display(), "keeping build directory");
      Some(build_dir.clone())
    } else {
      if let Err(e) = remove_dir_if_exists(&build_dir) {
        warn!(dir = %build_dir.display(), error = %e, "failed to remove build directory");
      }
      None
    };

    let test = match formula.test() {
      Some(_) if verify => Some(self.verify_prefix(platform, formula, &prefix).await?),
      _ => None,
    };

    Ok(InstallSummary {
      name: formula.name().to_string(),
      version: formula.version().to_string(),
      platform,
      prefix: prefix.root().to_path_buf(),
      receipt: receipt_path,
      build_steps: build.records,
      install_steps: install.records,
      files: receipt.files,
      test,
      build_dir: kept,
    })
  }

  /// Run the test recipe against an existing install. Nothing is built.
  pub async fn verify_installed(&self, formula: &Formula, host: &HostFacts) -> Result<Option<VerifyReport>, Failure> {
    let platform = Platform::from_facts(host)?;
    if formula.test().is_none() {
      return Ok(None);
    }
    let prefix = self.prefix_for(formula);
    self.verify_prefix(platform, formula, &prefix).await.map(Some)
  }

  async fn verify_prefix(
    &self,
    platform: Platform,
    formula: &Formula,
    prefix: &InstallPrefix,
  ) -> Result<VerifyReport, Failure> {
    let Some(recipe) = formula.test() else {
      return Ok(VerifyReport::default());
    };

    info!(stage = %Stage::Test, "starting stage");
    let dir = self.test_dir(formula)?;
    let test_dir = dir.path().to_path_buf();

    let env = build_test_environment(platform, formula, prefix, &test_dir, &self.config.search_path)?;
    let resolver = RunResolver::new(
      platform,
      formula,
      &RunPaths::test(prefix.clone(), test_dir.clone()),
      &ResolvedDependencies::default(),
    );
    let verified = Verifier::new(&self.runner, prefix, &env, &resolver)
      .with_timeout(self.config.step_timeout)
      .verify(recipe, &test_dir)
      .await;

    match verified {
      Ok(report) if !self.config.keep_build_dir => {
        if let Err(e) = dir.close() {
          warn!(dir = %test_dir.display(), error = %e, "failed to remove test directory");
        }
        Ok(report)
      }
      Ok(report) => {
        let kept = dir.keep();
        info!(dir = %kept.display(), "keeping test directory");
        Ok(report)
      }
      Err(e) => {
        let kept = dir.keep();
        warn!(dir = %kept.display(), action = e.index(), "test failed, test directory retained");
        Err(KilnError::from(e).into())
      }
    }
  }

  /// The build environment `formula` would run with. Dependencies are
  /// resolved; nothing is staged or launched.
  pub fn environment(&self, formula: &Formula, host: &HostFacts) -> Result<Environment, KilnError> {
    let deps = resolve_dependencies(formula, &self.locator)?;
    let prefix = self.prefix_for(formula);
    let build_dir = self.build_dir(formula);
    Ok(build_environment(&EnvRequest {
      host,
      formula,
      deps: &deps,
      prefix: &prefix,
      build_dir: &build_dir,
      search_path: &self.config.search_path,
    })?)
  }
}

fn sequence_failure(failure: SequenceFailure, wrap: fn(crate::execute::StepError) -> KilnError) -> Failure {
  let SequenceFailure {
    report: SequenceReport { records, .. },
    error,
  } = failure;
  Failure::with_steps(wrap(error), records)
}

fn workspace_error(path: &Path) -> impl FnOnce(std::io::Error) -> EnvError + '_ {
  move |source| EnvError::Workspace {
    path: path.to_path_buf(),
    source,
  }
}

fn stage_source(source: &Path, build_dir: &Path) -> Result<(), EnvError> {
  if !source.is_dir() {
    return Err(EnvError::Workspace {
      path: source.to_path_buf(),
      source: std::io::Error::new(std::io::ErrorKind::NotFound, "source directory not found"),
    });
  }
  remove_dir_if_exists(build_dir).map_err(workspace_error(build_dir))?;
  let files = copy_tree(source, build_dir).map_err(workspace_error(build_dir))?;
  let scratch = build_dir.join(SCRATCH_DIR);
  std::fs::create_dir_all(&scratch).map_err(workspace_error(&scratch))?;
  info!(source = %source.display(), dir = %build_dir.display(), files, "staged source");
  Ok(())
}
