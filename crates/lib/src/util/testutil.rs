//! Test utilities for kiln-lib.
//!
//! Helpers for tests that need to run small programs. Formulas under test use
//! `/bin/sh` scripts as stand-ins for compilers and the packaged tools.

use std::path::{Path, PathBuf};

use crate::action::{ExecOpts, Step};

/// A step that runs `script` with `/bin/sh -c`.
#[cfg(unix)]
pub fn sh(script: &str) -> Step {
  Step::exec(ExecOpts::new("/bin/sh").with_args(["-c", script]))
}

/// Write an executable `/bin/sh` script to `dir/name`.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
  let path = dir.join(name);
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).unwrap();
  }
  std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
  crate::util::fs::set_executable(&path).unwrap();
  path
}

/// A SHA-256 shaped checksum for formulas whose source is never fetched.
pub const DUMMY_SHA256: &str = "0000000000000000000000000000000000000000000000000000000000000000";
