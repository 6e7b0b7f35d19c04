//! Wildcard expansion for `copy` sources.
//!
//! Supports `*` (any run of characters) and `?` (one character) inside a
//! single path component. Wildcards never cross `/`, and do not match a
//! leading `.` unless the pattern component itself starts with one.

use std::io;
use std::path::{Component, Path, PathBuf};

/// True when `name` matches the single-component `pattern`.
pub fn matches_component(pattern: &str, name: &str) -> bool {
  if name.starts_with('.') && !pattern.starts_with('.') {
    return false;
  }

  let pattern: Vec<char> = pattern.chars().collect();
  let name: Vec<char> = name.chars().collect();

  let (mut p, mut n) = (0, 0);
  // Position of the last `*` and the name index it was tried at.
  let mut backtrack: Option<(usize, usize)> = None;

  while n < name.len() {
    match pattern.get(p) {
      Some('*') => {
        backtrack = Some((p, n));
        p += 1;
      }
      Some('?') => {
        p += 1;
        n += 1;
      }
      Some(c) if *c == name[n] => {
        p += 1;
        n += 1;
      }
      _ => match backtrack {
        Some((star, tried)) => {
          p = star + 1;
          n = tried + 1;
          backtrack = Some((star, tried + 1));
        }
        None => return false,
      },
    }
  }

  pattern[p..].iter().all(|c| *c == '*')
}

fn has_wildcard(component: &str) -> bool {
  component.contains(['*', '?'])
}

/// Expand `pattern` relative to `base`.
///
/// Returns existing paths in sorted order. A pattern without wildcards yields
/// its single path when it exists. Missing intermediate directories produce
/// no matches rather than an error.
pub fn expand(base: &Path, pattern: &str) -> io::Result<Vec<PathBuf>> {
  let mut candidates = vec![base.to_path_buf()];

  for component in Path::new(pattern).components() {
    let part = match component {
      Component::Normal(part) => part.to_string_lossy().into_owned(),
      Component::CurDir => continue,
      _ => return Ok(Vec::new()),
    };

    let mut next = Vec::new();
    for dir in &candidates {
      if !has_wildcard(&part) {
        let path = dir.join(&part);
        if path.symlink_metadata().is_ok() {
          next.push(path);
        }
        continue;
      }

      if !dir.is_dir() {
        continue;
      }
      for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if matches_component(&part, &name.to_string_lossy()) {
          next.push(entry.path());
        }
      }
    }

    next.sort();
    candidates = next;
    if candidates.is_empty() {
      break;
    }
  }

  if candidates.len() == 1 && candidates[0] == base {
    return Ok(Vec::new());
  }
  Ok(candidates)
}
