//! Implementation of the `kiln info` command.

use std::path::Path;

use anyhow::Result;

use kiln_lib::action::actions::exec::display_command;
use kiln_lib::action::{Step, TestAction};
use kiln_lib::execute::StepIndex;
use kiln_lib::formula::{DependencyPhase, Formula};
use kiln_lib::platform::Platform;

use super::load_formula;
use crate::output::{OutputFormat, print_json, print_stat, print_success, symbols, truncate_hash};

pub fn cmd_info(formula: &Path, output: OutputFormat) -> Result<()> {
  let formula = load_formula(formula)?;

  if output.is_json() {
    return print_json(&formula);
  }

  print_success(&format!("{} {}", formula.name(), formula.version()));
  if let Some(desc) = formula.desc() {
    println!("  {desc}");
  }
  println!();
  for (label, value) in [
    ("Homepage", formula.homepage()),
    ("Source", formula.url()),
    ("License", formula.license()),
  ] {
    if let Some(value) = value {
      print_stat(label, value);
    }
  }
  print_stat("SHA-256", truncate_hash(formula.sha256()));
  match Platform::current() {
    Some(platform) => print_stat("Platform", &platform.triple()),
    None => print_stat("Platform", "unsupported"),
  }

  print_dependencies(&formula);

  if !formula.env().is_empty() {
    println!();
    println!("Environment:");
    for (key, value) in formula.env() {
      println!("  {key}={value}");
    }
  }

  for (title, steps) in [("Build", formula.build_steps()), ("Install", formula.install_steps())] {
    if !steps.is_empty() {
      println!();
      println!("{title}:");
      print_steps(steps, None, 1);
    }
  }

  if let Some(test) = formula.test() {
    println!();
    println!("Test:");
    for (i, action) in test.actions().iter().enumerate() {
      let text = match action {
        TestAction::Write(opts) => format!("write {}", opts.path),
        TestAction::Run(opts) => format!("run {}", display_command(&opts.bin, opts.args())),
        TestAction::Assert(expect) => format!("assert {} {:?}", expect.kind(), expect.text()),
      };
      println!("  {}. {}", i + 1, text);
    }
  }

  Ok(())
}

fn print_dependencies(formula: &Formula) {
  if formula.dependencies().is_empty() {
    return;
  }
  println!();
  println!("Dependencies:");
  for dep in formula.dependencies() {
    let phase = match dep.phase {
      DependencyPhase::Build => "build",
      DependencyPhase::Runtime => "runtime",
    };
    match &dep.bin {
      Some(bin) => println!("  {} {} ({phase}, via {bin})", symbols::INFO, dep.name),
      None => println!("  {} {} ({phase})", symbols::INFO, dep.name),
    }
  }
}

fn print_steps(steps: &[Step], parent: Option<&StepIndex>, depth: usize) {
  for (i, step) in steps.iter().enumerate() {
    let index = match parent {
      Some(parent) => parent.child(i + 1),
      None => StepIndex::top(i + 1),
    };
    println!("{:indent$}{index}. {}", "", step.describe(), indent = depth * 2);
    if let Step::Cd(cd) = step {
      print_steps(&cd.steps, Some(&index), depth + 1);
    }
  }
}
