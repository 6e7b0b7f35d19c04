//! Individual action option types.
//!
//! - [`exec`] - External program invocation with an argument vector and env overrides
//! - [`copy`] - Copying build output into the install prefix

pub mod copy;
pub mod exec;
