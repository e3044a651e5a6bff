//! Test run orchestration
//!
//! Sequences service resolution, the optional tunnel, the connectivity
//! probe, log capture and config derivation, runs go-ftw, and always cleans
//! up what it started.

mod error;
mod run;
mod shutdown;
mod state;

pub use error::RunError;
pub use run::Orchestrator;
pub use state::{RunReport, RunState};
