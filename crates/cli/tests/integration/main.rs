//! CLI integration tests that build and install the hello fixture.

#[cfg(unix)]
mod common;
#[cfg(unix)]
mod install_tests;
