//! Placeholder parsing and substitution for deferred value resolution.
//!
//! Formulas are written before the paths of a run are known. Step arguments,
//! environment values and test actions refer to those paths through
//! placeholders that are resolved right before each step runs.
//!
//! # Placeholder Formats
//!
//! - `$${prefix}`, `$${bin}`, `$${lib}`, `$${man1}`, `$${doc}`, `$${share}` - install layout
//! - `$${buildpath}` - the staged source tree the build runs in
//! - `$${testpath}` - the scratch directory of the test recipe
//! - `$${name}`, `$${version}` - formula identity
//! - `$${os}`, `$${arch}` - platform tags (e.g. `darwin`, `arm64`)
//! - `$${dep:<name>}` - root directory of a resolved build dependency
//!
//! # Shell Variables
//!
//! Single `$` characters pass through unchanged, so `$HOME` or `$1` inside an
//! argument handed to a shell work without escaping.
//!
//! # Escaping
//!
//! Use `$$$` before `{` to produce a literal `$${` sequence.
//!
//! # Example
//!
//! ```
//! use kiln_lib::placeholder::{parse, Placeholder, Segment, Var};
//!
//! let segments = parse("$${bin}/blang:$HOME").unwrap();
//! assert_eq!(segments, vec![
//!     Segment::Placeholder(Placeholder::Var(Var::Bin)),
//!     Segment::Literal("/blang:$HOME".to_string()),
//! ]);
//! ```

use std::fmt;

use thiserror::Error;

/// Named run variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Var {
  Prefix,
  Bin,
  Lib,
  Man1,
  Doc,
  Share,
  BuildPath,
  TestPath,
  Name,
  Version,
  Os,
  Arch,
}

impl Var {
  pub const ALL: [Var; 12] = [
    Var::Prefix,
    Var::Bin,
    Var::Lib,
    Var::Man1,
    Var::Doc,
    Var::Share,
    Var::BuildPath,
    Var::TestPath,
    Var::Name,
    Var::Version,
    Var::Os,
    Var::Arch,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Var::Prefix => "prefix",
      Var::Bin => "bin",
      Var::Lib => "lib",
      Var::Man1 => "man1",
      Var::Doc => "doc",
      Var::Share => "share",
      Var::BuildPath => "buildpath",
      Var::TestPath => "testpath",
      Var::Name => "name",
      Var::Version => "version",
      Var::Os => "os",
      Var::Arch => "arch",
    }
  }

  fn from_name(name: &str) -> Option<Self> {
    Var::ALL.into_iter().find(|v| v.as_str() == name)
  }
}

impl fmt::Display for Var {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A parsed placeholder reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
  /// `$${<var>}` - a named run variable
  Var(Var),

  /// `$${dep:<name>}` - root of a resolved build dependency
  Dep(String),
}

/// A segment of parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text (no placeholders)
  Literal(String),

  /// A placeholder to be resolved
  Placeholder(Placeholder),
}

/// Errors that can occur during placeholder parsing or resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaceholderError {
  #[error("unclosed placeholder at position {0}")]
  Unclosed(usize),

  #[error("unknown placeholder: {0}")]
  Unknown(String),

  #[error("malformed placeholder: {0}")]
  Malformed(String),

  #[error("placeholder `{0}` is not available here")]
  Unresolved(Var),

  #[error("unresolved dependency placeholder: {0}")]
  UnresolvedDep(String),
}

/// Trait for resolving placeholder values during execution.
pub trait Resolver {
  /// Resolve a named run variable.
  fn resolve_var(&self, var: Var) -> Result<&str, PlaceholderError>;

  /// Resolve the root directory of a build dependency.
  fn resolve_dep(&self, name: &str) -> Result<&str, PlaceholderError>;
}

/// Parse a string containing placeholders into segments.
///
/// # Errors
///
/// Returns an error if a placeholder is malformed (unclosed, unknown name, etc.)
pub fn parse(input: &str) -> Result<Vec<Segment>, PlaceholderError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut chars = input.char_indices().peekable();

  while let Some((pos, ch)) = chars.next() {
    if ch != '$' {
      literal.push(ch);
      continue;
    }

    match chars.peek() {
      Some((_, '$')) => {
        chars.next(); // second $

        match chars.peek() {
          Some((_, '$')) => {
            chars.next(); // third $

            match chars.peek() {
              Some((_, '{')) => {
                // Escaped: $$${ -> $${ (literal)
                literal.push_str("$${");
                chars.next();
              }
              _ => literal.push_str("$$$"),
            }
          }
          Some((_, '{')) => {
            chars.next(); // {

            if !literal.is_empty() {
              segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }

            let mut content = String::new();
            let mut found_close = false;

            for (_, c) in chars.by_ref() {
              if c == '}' {
                found_close = true;
                break;
              }
              content.push(c);
            }

            if !found_close {
              return Err(PlaceholderError::Unclosed(pos));
            }

            segments.push(Segment::Placeholder(parse_placeholder_content(&content)?));
          }
          _ => literal.push_str("$$"),
        }
      }
      // A lone $ is a shell variable and passes through
      _ => literal.push('$'),
    }
  }

  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

/// Parse the content inside a placeholder (everything between `$${` and `}`).
fn parse_placeholder_content(content: &str) -> Result<Placeholder, PlaceholderError> {
  if let Some(var) = Var::from_name(content) {
    return Ok(Placeholder::Var(var));
  }

  match content.split_once(':') {
    Some(("dep", name)) if !name.is_empty() && !name.contains(':') => Ok(Placeholder::Dep(name.to_string())),
    Some(("dep", _)) => Err(PlaceholderError::Malformed(format!("invalid dependency name in '{content}'"))),
    Some((kind, _)) => Err(PlaceholderError::Unknown(kind.to_string())),
    None => Err(PlaceholderError::Unknown(content.to_string())),
  }
}

/// All placeholders referenced by a string, in order of appearance.
pub fn references(input: &str) -> Result<Vec<Placeholder>, PlaceholderError> {
  Ok(
    parse(input)?
      .into_iter()
      .filter_map(|segment| match segment {
        Segment::Placeholder(p) => Some(p),
        Segment::Literal(_) => None,
      })
      .collect(),
  )
}

/// Substitute all placeholders in a string using the provided resolver.
///
/// # Errors
///
/// Returns an error if parsing fails or if any placeholder cannot be resolved.
pub fn substitute(input: &str, resolver: &impl Resolver) -> Result<String, PlaceholderError> {
  let segments = parse(input)?;
  substitute_segments(&segments, resolver)
}

/// Substitute placeholders in pre-parsed segments.
pub fn substitute_segments(segments: &[Segment], resolver: &impl Resolver) -> Result<String, PlaceholderError> {
  let mut result = String::new();

  for segment in segments {
    match segment {
      Segment::Literal(s) => result.push_str(s),
      Segment::Placeholder(p) => {
        let value = match p {
          Placeholder::Var(var) => resolver.resolve_var(*var)?,
          Placeholder::Dep(name) => resolver.resolve_dep(name)?,
        };
        result.push_str(value);
      }
    }
  }

  Ok(result)
}
