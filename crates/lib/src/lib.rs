//! kiln-lib: Core types and logic for kiln
//!
//! This crate interprets package formulas:
//! - `Formula`: immutable metadata, dependencies, build/install steps and a test recipe
//! - `Environment`: the per-run process environment derived from host facts
//! - `StepExecutor`: runs build and install steps in order, halting on the first failure
//! - `Installer`: stages artifacts into an `InstallPrefix`
//! - `Verifier`: runs the formula's smoke test against the installed artifacts
//! - `Orchestrator`: composes all of the above into one install run

pub mod action;
pub mod config;
pub mod consts;
pub mod env;
pub mod error;
pub mod execute;
pub mod formula;
pub mod install;
pub mod orchestrator;
pub mod placeholder;
pub mod platform;
pub mod prefix_lock;
pub mod util;
pub mod verify;

pub use error::{KilnError, Stage};
pub use formula::Formula;
pub use orchestrator::{ExecutionResult, Failure, InstallSummary, Orchestrator};
