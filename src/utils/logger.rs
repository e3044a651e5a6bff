//! Logging setup
//!
//! Diagnostics go to stderr through `tracing`; stdout is left to the run
//! banner lines.

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Crate target used in the filter directive
const CRATE_TARGET: &str = "gateway_ftw";

/// Log verbosity selectable with `--log-level`
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[value(alias = "warning")]
    Warn,
    Error,
}

impl LogLevel {
    /// Effective level from the CLI flags; an explicit level wins over
    /// `--verbose`
    pub fn from_flags(level: Option<LogLevel>, verbose: bool) -> Self {
        match level {
            Some(level) => level,
            None if verbose => LogLevel::Debug,
            None => LogLevel::Info,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    fn directive(self) -> String {
        format!("{CRATE_TARGET}={}", self.as_str())
    }
}

/// Install the global subscriber
///
/// Only this crate's events pass the filter; kube and hyper stay quiet.
pub fn init_logger(level: LogLevel) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level.directive()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
