//! Integration tests for kiln-lib.

#[cfg(unix)]
mod common;
#[cfg(unix)]
mod install_tests;
