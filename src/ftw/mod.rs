//! go-ftw integration
//!
//! Derives the per-run go-ftw configuration and executes the test binary.

pub mod overlay;
mod runner;

pub use overlay::ConfigError;
pub use runner::{FtwInvocation, FtwRunner, TestExecutor};
