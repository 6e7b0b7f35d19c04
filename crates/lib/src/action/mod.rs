//! Formula actions.
//!
//! Actions are the primitive operations a formula can request. Build and
//! install sequences are made of [`Step`]s; the test recipe is made of
//! [`TestAction`]s. Both are plain data: nothing here touches the filesystem
//! or spawns a process. Interpretation lives in [`crate::execute`],
//! [`crate::install`] and [`crate::verify`].
//!
//! # Step Types
//!
//! - [`Step::Exec`] - Run a program with an argument vector and env overrides
//! - [`Step::Cd`] - Run nested steps from a subdirectory
//! - [`Step::Copy`] - Copy files matched by a glob into the prefix
//!
//! # Placeholder Resolution
//!
//! String fields support `$${...}` placeholders such as `$${bin}` or
//! `$${dep:go}`. See [`crate::placeholder`].

pub mod actions;
mod types;

pub use actions::copy::CopyOpts;
pub use actions::exec::ExecOpts;
pub use types::*;
