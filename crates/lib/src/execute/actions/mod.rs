//! Action execution module.
//!
//! - [`cmd`] - subprocess invocation behind the [`CommandRunner`] seam

pub mod cmd;

pub use cmd::{CommandOutput, CommandRunner, Invocation, ProcessRunner, RunError, resolve_program};
