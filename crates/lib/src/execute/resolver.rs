//! Placeholder resolver for a run.
//!
//! [`RunResolver`] knows the layout of the install prefix, the formula's
//! identity, the platform tags and the resolved dependency roots. Which of
//! the build and test directories it knows depends on the phase it was
//! created for.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::env::ResolvedDependencies;
use crate::formula::Formula;
use crate::install::InstallPrefix;
use crate::placeholder::{PlaceholderError, Resolver, Var};
use crate::platform::Platform;

/// Directories known to a phase of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
  pub prefix: InstallPrefix,
  pub buildpath: Option<PathBuf>,
  pub testpath: Option<PathBuf>,
}

impl RunPaths {
  /// Paths of the build and install phases.
  pub fn build(prefix: InstallPrefix, buildpath: PathBuf) -> Self {
    Self {
      prefix,
      buildpath: Some(buildpath),
      testpath: None,
    }
  }

  /// Paths of the test phase.
  pub fn test(prefix: InstallPrefix, testpath: PathBuf) -> Self {
    Self {
      prefix,
      buildpath: None,
      testpath: Some(testpath),
    }
  }
}

pub struct RunResolver {
  vars: BTreeMap<Var, String>,
  deps: BTreeMap<String, String>,
}

impl RunResolver {
  pub fn new(platform: Platform, formula: &Formula, paths: &RunPaths, deps: &ResolvedDependencies) -> Self {
    let display = |p: PathBuf| p.to_string_lossy().into_owned();
    let prefix = &paths.prefix;

    let mut vars = BTreeMap::new();
    vars.insert(Var::Prefix, display(prefix.root().to_path_buf()));
    vars.insert(Var::Bin, display(prefix.bin()));
    vars.insert(Var::Lib, display(prefix.lib()));
    vars.insert(Var::Man1, display(prefix.man(1)));
    vars.insert(Var::Doc, display(prefix.doc()));
    vars.insert(Var::Share, display(prefix.share()));
    if let Some(buildpath) = &paths.buildpath {
      vars.insert(Var::BuildPath, display(buildpath.clone()));
    }
    if let Some(testpath) = &paths.testpath {
      vars.insert(Var::TestPath, display(testpath.clone()));
    }
    vars.insert(Var::Name, formula.name().to_string());
    vars.insert(Var::Version, formula.version().to_string());
    vars.insert(Var::Os, platform.os.as_str().to_string());
    vars.insert(Var::Arch, platform.arch.as_str().to_string());

    let deps = deps
      .iter()
      .map(|d| (d.name.clone(), display(d.root.clone())))
      .collect();

    Self { vars, deps }
  }
}

impl Resolver for RunResolver {
  fn resolve_var(&self, var: Var) -> Result<&str, PlaceholderError> {
    self
      .vars
      .get(&var)
      .map(String::as_str)
      .ok_or(PlaceholderError::Unresolved(var))
  }

  fn resolve_dep(&self, name: &str) -> Result<&str, PlaceholderError> {
    self
      .deps
      .get(name)
      .map(String::as_str)
      .ok_or_else(|| PlaceholderError::UnresolvedDep(name.to_string()))
  }
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;
  use crate::env::ResolvedDependency;
  use crate::formula::FormulaSpec;
  use crate::placeholder::substitute;
  use crate::platform::arch::Arch;
  use crate::platform::os::Os;
  use crate::util::testutil::DUMMY_SHA256;

  fn formula() -> Formula {
    Formula::from_spec(FormulaSpec {
      name: Some("blang".to_string()),
      version: Some("0.1".to_string()),
      sha256: Some(DUMMY_SHA256.to_string()),
      ..Default::default()
    })
    .unwrap()
  }

  fn deps() -> ResolvedDependencies {
    ResolvedDependencies::new(vec![ResolvedDependency {
      name: "go".to_string(),
      root: PathBuf::from("/opt/go"),
    }])
  }

  #[test]
  fn build_phase_resolves_layout_and_buildpath() {
    let paths = RunPaths::build(InstallPrefix::new("/opt/kiln", "blang"), PathBuf::from("/work/blang-0.1"));
    let resolver = RunResolver::new(Platform::new(Arch::Amd64, Os::Linux), &formula(), &paths, &deps());

    assert_eq!(
      substitute("$${bin}:$${man1}:$${doc}", &resolver).unwrap(),
      "/opt/kiln/bin:/opt/kiln/share/man/man1:/opt/kiln/share/doc/blang"
    );
    assert_eq!(substitute("$${buildpath}", &resolver).unwrap(), "/work/blang-0.1");
    assert_eq!(substitute("$${dep:go}/bin/go", &resolver).unwrap(), "/opt/go/bin/go");
    assert_eq!(substitute("$${os}-$${arch}", &resolver).unwrap(), "linux-amd64");
    assert_eq!(
      substitute("$${testpath}", &resolver),
      Err(PlaceholderError::Unresolved(Var::TestPath))
    );
  }

  #[test]
  fn test_phase_knows_only_testpath() {
    let paths = RunPaths::test(InstallPrefix::new("/opt/kiln", "blang"), PathBuf::from("/work/test"));
    let resolver = RunResolver::new(
      Platform::new(Arch::Arm64, Os::Darwin),
      &formula(),
      &paths,
      &ResolvedDependencies::default(),
    );

    assert_eq!(substitute("$${testpath}/hello.b", &resolver).unwrap(), "/work/test/hello.b");
    assert_eq!(
      substitute("$${buildpath}", &resolver),
      Err(PlaceholderError::Unresolved(Var::BuildPath))
    );
  }
}
