//! Step execution.
//!
//! The [`StepExecutor`] runs a formula's build or install sequence as a
//! linear state machine. Every step starts `Pending`, becomes `Running`, then
//! ends `Succeeded` or `Failed`. Execution halts at the first failed step:
//! later steps stay `Pending`, nothing is retried and nothing is rolled back.
//!
//! Nested `cd` steps are flattened into enter/leave markers around their
//! children, so the sequence runs as one flat loop with a working directory
//! stack.

pub mod actions;
pub mod resolver;
pub mod types;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::action::actions::exec::display_command;
use crate::action::{CopyOpts, ExecOpts, Step};
use crate::env::Environment;
use crate::install::{CopyRequest, InstallPrefix, Installer};
use crate::placeholder::{self, PlaceholderError};

use actions::{CommandRunner, Invocation, RunError, resolve_program};
use resolver::RunResolver;

pub use types::{Phase, SequenceReport, StepError, StepIndex, StepRecord, StepState};

/// A failed sequence: the error plus the state of every step at the halt.
#[derive(Debug)]
pub struct SequenceFailure {
  pub report: SequenceReport,
  pub error: StepError,
}

enum Op<'s> {
  Enter { record: usize, dir: &'s str },
  Leaf { record: usize, step: &'s Step },
  Leave { record: usize },
}

fn flatten<'s>(steps: &'s [Step], parent: Option<&StepIndex>, ops: &mut Vec<Op<'s>>, records: &mut Vec<StepRecord>) {
  for (i, step) in steps.iter().enumerate() {
    let index = match parent {
      Some(parent) => parent.child(i + 1),
      None => StepIndex::top(i + 1),
    };
    let record = records.len();
    records.push(StepRecord {
      index: index.clone(),
      description: step.describe(),
      state: StepState::Pending,
      code: None,
    });

    match step {
      Step::Cd(cd) => {
        ops.push(Op::Enter { record, dir: &cd.dir });
        flatten(&cd.steps, Some(&index), ops, records);
        ops.push(Op::Leave { record });
      }
      _ => ops.push(Op::Leaf { record, step }),
    }
  }
}

pub struct StepExecutor<'a, R: CommandRunner> {
  runner: &'a R,
  env: &'a Environment,
  resolver: &'a RunResolver,
  installer: Installer<'a>,
  timeout: Option<Duration>,
}

impl<'a, R: CommandRunner> StepExecutor<'a, R> {
  pub fn new(runner: &'a R, env: &'a Environment, resolver: &'a RunResolver, prefix: &'a InstallPrefix) -> Self {
    Self {
      runner,
      env,
      resolver,
      installer: Installer::new(prefix),
      timeout: None,
    }
  }

  /// Limit the runtime of each spawned program.
  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  /// Run `steps` in order, starting in `root`.
  pub async fn run(&self, phase: Phase, steps: &[Step], root: &Path) -> Result<SequenceReport, SequenceFailure> {
    let mut ops = Vec::new();
    let mut records = Vec::new();
    flatten(steps, None, &mut ops, &mut records);

    let mut report = SequenceReport {
      records,
      installed: Vec::new(),
    };
    let mut cwd: Vec<PathBuf> = vec![root.to_path_buf()];

    info!(%phase, steps = report.records.len(), "running steps");

    for op in ops {
      let current = cwd.last().cloned().unwrap_or_else(|| root.to_path_buf());

      let result = match op {
        Op::Enter { record, dir } => {
          report.records[record].state = StepState::Running;
          let index = report.records[record].index.clone();
          match self.enter(&index, dir, &current) {
            Ok(dir) => {
              debug!(step = %index, dir = %dir.display(), "entering directory");
              cwd.push(dir);
              Ok(())
            }
            Err(e) => Err((record, e)),
          }
        }
        Op::Leave { record } => {
          cwd.pop();
          report.records[record].state = StepState::Succeeded;
          Ok(())
        }
        Op::Leaf { record, step } => {
          report.records[record].state = StepState::Running;
          let index = report.records[record].index.clone();
          info!(%phase, step = %index, "{}", report.records[record].description);

          let outcome = match step {
            Step::Exec(opts) => self.exec(&index, opts, &current).await.map(Some),
            Step::Copy(opts) => self.copy(&index, opts, &current).map(|files| {
              report.installed.extend(files);
              None
            }),
            Step::Cd(_) => Ok(None),
          };

          match outcome {
            Ok(code) => {
              report.records[record].state = StepState::Succeeded;
              report.records[record].code = code;
              Ok(())
            }
            Err(e) => Err((record, e)),
          }
        }
      };

      if let Err((record, error)) = result {
        if let StepError::Failed { code, .. } = &error {
          report.records[record].code = *code;
        }
        // The failing step and every enclosing `cd` fail together.
        for rec in report.records.iter_mut().filter(|r| r.state == StepState::Running) {
          rec.state = StepState::Failed;
        }
        warn!(%phase, step = %error.index(), "step failed");
        return Err(SequenceFailure { report, error });
      }
    }

    Ok(report)
  }

  fn subst(&self, index: &StepIndex, value: &str) -> Result<String, StepError> {
    placeholder::substitute(value, self.resolver).map_err(|source: PlaceholderError| StepError::Placeholder {
      index: index.clone(),
      source,
    })
  }

  fn enter(&self, index: &StepIndex, dir: &str, current: &Path) -> Result<PathBuf, StepError> {
    let path = current.join(self.subst(index, dir)?);
    if !path.is_dir() {
      return Err(StepError::WorkingDir {
        index: index.clone(),
        path,
      });
    }
    Ok(path)
  }

  async fn exec(&self, index: &StepIndex, opts: &ExecOpts, cwd: &Path) -> Result<i32, StepError> {
    let bin = self.subst(index, &opts.bin)?;
    let args = opts
      .args()
      .iter()
      .map(|arg| self.subst(index, arg))
      .collect::<Result<Vec<_>, _>>()?;

    let mut overrides = BTreeMap::new();
    for (key, value) in opts.env.iter().flatten() {
      overrides.insert(key.clone(), self.subst(index, value)?);
    }
    let env = self.env.overlay(&overrides);

    let command = display_command(&bin, &args);
    let invocation = Invocation {
      program: resolve_program(&bin, env.path(), cwd),
      args,
      env: env.vars().clone(),
      cwd: cwd.to_path_buf(),
      timeout: self.timeout,
    };

    let output = match self.runner.run(&invocation).await {
      Ok(output) => output,
      Err(RunError::Spawn(source)) => {
        return Err(StepError::Spawn {
          index: index.clone(),
          command,
          source,
        });
      }
      Err(RunError::TimedOut(limit)) => {
        return Err(StepError::TimedOut {
          index: index.clone(),
          command,
          limit,
        });
      }
    };

    match output.code {
      Some(0) => Ok(0),
      code => Err(StepError::Failed {
        index: index.clone(),
        command,
        code,
        stderr: output.stderr,
      }),
    }
  }

  fn copy(
    &self,
    index: &StepIndex,
    opts: &CopyOpts,
    cwd: &Path,
  ) -> Result<Vec<crate::install::InstalledFile>, StepError> {
    let from = self.subst(index, &opts.from)?;
    let rename = opts.rename.as_deref().map(|r| self.subst(index, r)).transpose()?;

    self
      .installer
      .install(&CopyRequest {
        from: &from,
        to: &opts.to,
        rename: rename.as_deref(),
        cwd,
      })
      .map_err(|source| StepError::Copy {
        index: index.clone(),
        source,
      })
  }
}
