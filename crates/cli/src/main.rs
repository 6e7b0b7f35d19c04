mod cmd;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{cmd_check, cmd_env, cmd_info, cmd_install, cmd_test};
use output::{OutputFormat, print_error};

/// kiln - build and install package formulas
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Increase log output (-v info, -vv debug)
  #[arg(short, long, global = true, action = clap::ArgAction::Count)]
  verbose: u8,

  /// Config file (default: <config dir>/kiln/config.json)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build a formula from a source tree, install it and run its test
  Install {
    /// Formula file (.lua or .json)
    formula: PathBuf,

    /// Verified source tree to build from
    #[arg(long)]
    source: PathBuf,

    /// Install prefix
    #[arg(long)]
    prefix: Option<PathBuf>,

    /// Skip the formula's test recipe
    #[arg(long)]
    no_test: bool,

    /// Limit each spawned program (e.g., "90s", "10m")
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Keep the build directory after a successful install
    #[arg(long)]
    keep_build: bool,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Run a formula's test recipe against an existing install
  Test {
    /// Formula file (.lua or .json)
    formula: PathBuf,

    /// Install prefix
    #[arg(long)]
    prefix: Option<PathBuf>,

    /// Limit each spawned program (e.g., "90s", "10m")
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Show formula metadata, dependencies and steps
  Info {
    /// Formula file (.lua or .json)
    formula: PathBuf,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Print the build environment of a formula
  Env {
    /// Formula file (.lua or .json)
    formula: PathBuf,

    /// Install prefix
    #[arg(long)]
    prefix: Option<PathBuf>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Parse and validate a formula
  Check {
    /// Formula file (.lua or .json)
    formula: PathBuf,
  },
}

fn init_tracing(verbose: u8) {
  let filter = match verbose {
    0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    1 => EnvFilter::new("info"),
    _ => EnvFilter::new("debug"),
  };

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .with_target(false)
    .init();
}

fn run(cli: Cli) -> Result<()> {
  let config = cli.config.as_deref();
  match cli.command {
    Commands::Install {
      formula,
      source,
      prefix,
      no_test,
      timeout,
      keep_build,
      output,
    } => cmd_install(
      &formula,
      &source,
      cmd::Overrides {
        config,
        prefix,
        timeout,
        keep_build,
      },
      !no_test,
      output,
    ),
    Commands::Test {
      formula,
      prefix,
      timeout,
      output,
    } => cmd_test(
      &formula,
      cmd::Overrides {
        config,
        prefix,
        timeout,
        keep_build: false,
      },
      output,
    ),
    Commands::Info { formula, output } => cmd_info(&formula, output),
    Commands::Env {
      formula,
      prefix,
      output,
    } => cmd_env(
      &formula,
      cmd::Overrides {
        config,
        prefix,
        timeout: None,
        keep_build: false,
      },
      output,
    ),
    Commands::Check { formula } => cmd_check(&formula),
  }
}

fn main() {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  if let Err(e) = run(cli) {
    print_error(&format!("{e:#}"));
    std::process::exit(1);
  }
}
