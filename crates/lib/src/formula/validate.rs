//! Construction-time checks of a formula.
//!
//! Placeholders are checked against the scope of the string that holds them:
//!
//! | scope        | allowed                                               |
//! |--------------|-------------------------------------------------------|
//! | build/install steps, formula env | every variable except `testpath`, `dep:<build dependency>` |
//! | test actions | every variable except `buildpath`                     |
//! | paths (`cd`, `copy`, `write`) | `name`, `version`, `os`, `arch`      |
//!
//! Expectations of `assert` actions and the content of `write` actions are
//! literal text and are not parsed.

use std::collections::BTreeMap;
use std::path::{Component, Path};

use crate::action::{Expect, Step, TestAction};
use crate::placeholder::{self, Placeholder, Var};

use super::{Formula, FormulaError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
  Steps,
  Test,
  Path,
}

impl Scope {
  fn allows(self, var: Var) -> bool {
    match self {
      Scope::Steps => var != Var::TestPath,
      Scope::Test => var != Var::BuildPath,
      Scope::Path => matches!(var, Var::Name | Var::Version | Var::Os | Var::Arch),
    }
  }
}

/// Characters allowed in names: `[A-Za-z0-9._+-]`, starting alphanumeric.
fn is_identifier(s: &str) -> bool {
  let mut chars = s.chars();
  matches!(chars.next(), Some(c) if c.is_ascii_alphanumeric())
    && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-'))
}

pub(super) fn name(name: &str) -> Result<(), FormulaError> {
  if is_identifier(name) {
    Ok(())
  } else {
    Err(FormulaError::InvalidField {
      field: "name",
      reason: format!("`{name}` must start alphanumeric and contain only [A-Za-z0-9._+-]"),
    })
  }
}

pub(super) fn dependency_name(name: &str) -> Result<(), FormulaError> {
  if is_identifier(name) {
    Ok(())
  } else {
    Err(FormulaError::InvalidField {
      field: "depends_on",
      reason: format!("invalid dependency name `{name}`"),
    })
  }
}

pub(super) fn version(version: &str) -> Result<(), FormulaError> {
  if is_identifier(version) {
    Ok(())
  } else {
    Err(FormulaError::InvalidField {
      field: "version",
      reason: format!("`{version}` must start alphanumeric and contain only [A-Za-z0-9._+-]"),
    })
  }
}

pub(super) fn sha256(sha256: &str) -> Result<(), FormulaError> {
  if sha256.len() == 64 && sha256.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
    Ok(())
  } else {
    Err(FormulaError::InvalidField {
      field: "sha256",
      reason: "expected 64 lowercase hex characters".to_string(),
    })
  }
}

/// Validate env, steps and the test recipe.
pub(super) fn body(formula: &Formula) -> Result<(), FormulaError> {
  let checker = Checker {
    build_deps: formula.build_dependencies().map(|d| d.name.as_str()).collect(),
  };

  checker.env("env", formula.env(), Scope::Steps)?;
  checker.steps("build", formula.build_steps(), &[])?;
  checker.steps("install", formula.install_steps(), &[])?;

  if let Some(recipe) = formula.test() {
    checker.test(recipe.actions())?;
  }
  Ok(())
}

struct Checker<'a> {
  build_deps: Vec<&'a str>,
}

impl Checker<'_> {
  fn templated(&self, location: &str, value: &str, scope: Scope) -> Result<(), FormulaError> {
    let refs = placeholder::references(value).map_err(|source| FormulaError::Placeholder {
      location: location.to_string(),
      source,
    })?;

    for reference in refs {
      match reference {
        Placeholder::Var(var) if !scope.allows(var) => {
          return Err(FormulaError::PlaceholderScope {
            location: location.to_string(),
            placeholder: var.to_string(),
          });
        }
        Placeholder::Var(_) => {}
        Placeholder::Dep(name) if scope != Scope::Steps => {
          return Err(FormulaError::PlaceholderScope {
            location: location.to_string(),
            placeholder: format!("dep:{name}"),
          });
        }
        Placeholder::Dep(name) => {
          if !self.build_deps.contains(&name.as_str()) {
            return Err(FormulaError::UndeclaredDependency {
              location: location.to_string(),
              name,
            });
          }
        }
      }
    }
    Ok(())
  }

  fn env(&self, location: &str, env: &BTreeMap<String, String>, scope: Scope) -> Result<(), FormulaError> {
    for (key, value) in env {
      if key.is_empty() || key.contains(['=', '\0']) {
        return Err(FormulaError::InvalidField {
          field: "env",
          reason: format!("{location}: invalid variable name `{key}`"),
        });
      }
      self.templated(&format!("{location} {key}"), value, scope)?;
    }
    Ok(())
  }

  /// A relative path that cannot leave its base directory.
  fn relative_path(&self, location: &str, path: &str) -> Result<(), FormulaError> {
    self.templated(location, path, Scope::Path)?;

    let unsafe_path = || FormulaError::UnsafePath {
      location: location.to_string(),
      path: path.to_string(),
    };
    if path.is_empty() || path.contains('\\') {
      return Err(unsafe_path());
    }
    if !Path::new(path)
      .components()
      .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    {
      return Err(unsafe_path());
    }
    Ok(())
  }

  fn steps(&self, phase: &'static str, steps: &[Step], parent: &[usize]) -> Result<(), FormulaError> {
    for (i, step) in steps.iter().enumerate() {
      let mut index = parent.to_vec();
      index.push(i + 1);
      let dotted = index.iter().map(ToString::to_string).collect::<Vec<_>>().join(".");
      let location = format!("{phase} step {dotted}");

      match step {
        Step::Exec(opts) => {
          if opts.bin.is_empty() {
            return Err(FormulaError::InvalidField {
              field: "bin",
              reason: format!("{location}: empty program"),
            });
          }
          self.templated(&location, &opts.bin, Scope::Steps)?;
          for arg in opts.args() {
            self.templated(&location, arg, Scope::Steps)?;
          }
          if let Some(env) = &opts.env {
            self.env(&location, env, Scope::Steps)?;
          }
        }
        Step::Cd(opts) => {
          self.relative_path(&location, &opts.dir)?;
          self.steps(phase, &opts.steps, &index)?;
        }
        Step::Copy(opts) => {
          self.relative_path(&location, &opts.from)?;
          if let Some(rename) = &opts.rename {
            if opts.is_pattern() {
              return Err(FormulaError::RenamePattern { location });
            }
            self.relative_path(&location, rename)?;
            if Path::new(rename).components().count() != 1 {
              return Err(FormulaError::UnsafePath {
                location,
                path: rename.clone(),
              });
            }
          }
        }
      }
    }
    Ok(())
  }

  fn test(&self, actions: &[TestAction]) -> Result<(), FormulaError> {
    let mut seen_run = false;

    for (i, action) in actions.iter().enumerate() {
      let index = i + 1;
      let location = format!("test action {index}");

      match action {
        TestAction::Write(opts) => {
          self.relative_path(&location, &opts.path)?;
        }
        TestAction::Run(opts) => {
          if opts.bin.is_empty() {
            return Err(FormulaError::InvalidField {
              field: "bin",
              reason: format!("{location}: empty program"),
            });
          }
          self.templated(&location, &opts.bin, Scope::Test)?;
          for arg in opts.args() {
            self.templated(&location, arg, Scope::Test)?;
          }
          if let Some(env) = &opts.env {
            self.env(&location, env, Scope::Test)?;
          }
          seen_run = true;
        }
        TestAction::Assert(expect) => {
          if !seen_run {
            return Err(FormulaError::AssertWithoutRun { index });
          }
          if let Expect::Matches(pattern) = expect {
            regex::Regex::new(pattern).map_err(|e| FormulaError::InvalidField {
              field: "test",
              reason: format!("{location}: invalid pattern: {e}"),
            })?;
          }
        }
      }
    }
    Ok(())
  }
}
