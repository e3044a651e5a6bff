//! Orchestration errors

use std::io;
use thiserror::Error;

use crate::ftw::ConfigError;
use crate::http::HttpError;
use crate::k8s::{ResolutionError, TunnelError};

/// Exit code for runs that fail before go-ftw reports a result
pub const FAILURE_EXIT_CODE: i32 = 1;

/// Exit code for runs stopped by Ctrl+C or SIGTERM
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Fatal run errors
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Tunnel(#[from] TunnelError),

    #[error(
        "Could not establish connectivity to the gateway at {target} after {attempts} attempts (last error: {})",
        .last_error.as_deref().unwrap_or("none")
    )]
    ProbeExhausted {
        target: String,
        attempts: u32,
        last_error: Option<String>,
    },

    #[error("Failed to set up connectivity probe: {0}")]
    Prober(#[from] HttpError),

    #[error("Failed to create log file: {0}")]
    LogFile(#[source] io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to run tests: {0:#}")]
    Execution(anyhow::Error),

    #[error("Interrupted")]
    Interrupted,
}

impl RunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Interrupted => INTERRUPTED_EXIT_CODE,
            _ => FAILURE_EXIT_CODE,
        }
    }
}
