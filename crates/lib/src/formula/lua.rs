//! Lua formula evaluation.
//!
//! A Lua formula is a chunk returning a table. The chunk sees a `kiln` global
//! with two fields:
//! - `kiln.version` - version of the running executor
//! - `kiln.dir` - directory containing the formula file
//!
//! Host facts are not exposed; formulas branch on platform through the
//! `$${os}` and `$${arch}` placeholders instead.

use std::path::Path;

use mlua::prelude::*;

use super::{FormulaError, FormulaSpec};

fn register_globals(lua: &Lua, path: &Path) -> LuaResult<()> {
  let kiln = lua.create_table()?;
  kiln.set("version", env!("CARGO_PKG_VERSION"))?;

  let dir = path
    .canonicalize()
    .ok()
    .and_then(|p| p.parent().map(Path::to_path_buf))
    .unwrap_or_default();
  kiln.set("dir", dir.to_string_lossy().to_string())?;

  lua.globals().set("kiln", kiln)?;
  Ok(())
}

/// Evaluate `source` and convert the returned table into a raw formula record.
pub(super) fn evaluate(source: &str, path: &Path) -> Result<FormulaSpec, FormulaError> {
  let parse_error = |e: LuaError| FormulaError::Parse {
    path: path.to_path_buf(),
    message: e.to_string(),
  };

  let lua = Lua::new();
  register_globals(&lua, path).map_err(parse_error)?;

  let value = lua
    .load(source)
    .set_name(format!("@{}", path.display()))
    .eval::<LuaValue>()
    .map_err(parse_error)?;

  if !value.is_table() {
    return Err(FormulaError::Parse {
      path: path.to_path_buf(),
      message: format!("formula must return a table, got {}", value.type_name()),
    });
  }

  lua.from_value::<FormulaSpec>(value).map_err(parse_error)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::action::{Expect, Step, TestAction};
  use crate::formula::{DependencyPhase, Formula};
  use crate::install::InstallDir;

  const BLANG: &str = r#"
    return {
      name = "blang",
      desc = "B compiler with an LLVM IR backend",
      homepage = "https://example.org/blang",
      url = "https://example.org/blang/archive/main.tar.gz",
      version = "0.1",
      sha256 = "ac7f0e1f3b52cf38606404e54f961775f7fca22c230c57b395c77770638bd28e",
      license = "MIT",
      depends_on = {
        { name = "go", phase = "build" },
        { name = "llvm", phase = "build", bin = "clang" },
      },
      env = {
        GOPATH = "$${buildpath}",
        GOOS = "$${os}",
        GOARCH = "$${arch}",
      },
      build = {
        { exec = { bin = "go", args = { "build", "-o", "blang" } } },
        { cd = { dir = "runtime", steps = {
          { exec = { bin = "make", args = { "CFLAGS=-O -Wall -ffreestanding" } } },
        } } },
      },
      install = {
        { copy = { from = "blang", to = "bin" } },
        { copy = { from = "runtime/libb.a", to = "lib" } },
        { copy = { from = "doc/blang.1", to = "man1" } },
        { copy = { from = "examples/*.b", to = "doc" } },
      },
      test = {
        { run = { bin = "blang", args = { "--version" } } },
        { assert = { contains = "blang version" } },
        { write = { path = "hello.b", content = "main() {\n  write('Hello, World!*n');\n}\n" } },
        { run = { bin = "blang", args = { "hello.b", "-o", "hello" } } },
        { run = { bin = "./hello" } },
        { assert = { equals = "Hello, World!" } },
      },
    }
  "#;

  #[test]
  fn evaluates_full_formula() {
    let spec = evaluate(BLANG, Path::new("blang.lua")).unwrap();
    let formula = Formula::from_spec(spec).unwrap();

    assert_eq!(formula.name(), "blang");
    assert_eq!(formula.license(), Some("MIT"));
    assert!(formula.dependencies().iter().all(|d| d.phase == DependencyPhase::Build));
    assert_eq!(formula.dependencies()[1].program(), "clang");
    assert_eq!(formula.env().get("GOARCH").map(String::as_str), Some("$${arch}"));
    assert!(matches!(&formula.build_steps()[1], Step::Cd(cd) if cd.steps.len() == 1));
    assert!(matches!(&formula.install_steps()[2], Step::Copy(c) if c.to == InstallDir::Man(1)));

    let test = formula.test().unwrap();
    assert_eq!(test.actions().len(), 6);
    assert_eq!(
      test.actions()[5],
      TestAction::Assert(Expect::Equals("Hello, World!".to_string()))
    );
  }

  #[test]
  fn kiln_global_is_visible() {
    let source = r#"return { name = "x", version = kiln.version, sha256 = string.rep("0", 64) }"#;
    let spec = evaluate(source, Path::new("x.lua")).unwrap();
    assert_eq!(spec.version.as_deref(), Some(env!("CARGO_PKG_VERSION")));
  }

  #[test]
  fn non_table_result_is_rejected() {
    let err = evaluate("return 42", Path::new("bad.lua")).unwrap_err();
    assert!(matches!(err, FormulaError::Parse { message, .. } if message.contains("integer")));
  }

  #[test]
  fn lua_errors_become_parse_errors() {
    let err = evaluate("error('boom')", Path::new("bad.lua")).unwrap_err();
    assert!(matches!(err, FormulaError::Parse { message, .. } if message.contains("boom")));
  }

  #[test]
  fn missing_fields_survive_evaluation() {
    let spec = evaluate(r#"return { name = "x" }"#, Path::new("x.lua")).unwrap();
    assert!(matches!(
      Formula::from_spec(spec),
      Err(FormulaError::MissingField("version"))
    ));
  }
}
