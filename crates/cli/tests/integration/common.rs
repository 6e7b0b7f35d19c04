//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Read fixture content.
pub fn fixture_content(name: &str) -> String {
  std::fs::read_to_string(fixture_path(name)).unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", name, e))
}

/// Isolated test environment.
///
/// Each test gets its own source tree, prefix, work directory and config
/// directory under one temporary directory.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// Source tree of the hello language plus the hello formula.
  pub fn hello() -> Self {
    let env = Self {
      temp: TempDir::new().unwrap(),
    };
    env.write_file("formula/hello.json", &fixture_content("hello.json"));
    env.write_file("source/src/hello.sh", &fixture_content("hello.sh"));
    env.write_file("source/runtime/.keep", "");
    env.write_file("source/doc/hello.1", ".TH HELLO 1\n");
    env.write_file("source/examples/greet.hl", "print 'hi'\n");
    env
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn formula_path(&self) -> PathBuf {
    self.temp.path().join("formula/hello.json")
  }

  pub fn source_path(&self) -> PathBuf {
    self.temp.path().join("source")
  }

  pub fn prefix_path(&self) -> PathBuf {
    self.temp.path().join("prefix")
  }

  pub fn work_path(&self) -> PathBuf {
    self.temp.path().join("work")
  }

  /// A kiln command isolated to this environment.
  pub fn kiln(&self) -> Command {
    let mut cmd = cargo_bin_cmd!("kiln");
    cmd
      .env("XDG_CONFIG_HOME", self.temp.path().join("config"))
      .env("KILN_PREFIX", self.prefix_path())
      .env("KILN_WORK_DIR", self.work_path())
      .env_remove("RUST_LOG");
    cmd
  }
}
