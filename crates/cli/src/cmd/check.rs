use std::path::Path;

use anyhow::Result;

use super::load_formula;
use crate::output::print_success;

pub fn cmd_check(formula: &Path) -> Result<()> {
  let formula = load_formula(formula)?;
  print_success(&format!("{} {}: formula is valid", formula.name(), formula.version()));
  Ok(())
}
