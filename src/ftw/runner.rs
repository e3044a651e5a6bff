//! go-ftw invocation
//!
//! Runs the go-ftw test binary against the prepared endpoint and reports its
//! exit code.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::process::ExitStatus;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::RunnerConfig;

/// Module path used with `go run`
const GO_FTW_MODULE: &str = "github.com/coreruleset/go-ftw/v2";

/// Arguments of one go-ftw run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FtwInvocation {
    pub rules_dir: PathBuf,
    pub config_path: PathBuf,
    pub log_file: PathBuf,
    pub read_timeout: String,
    pub output_log: Option<PathBuf>,
    pub output_format: Option<String>,
}

impl FtwInvocation {
    /// go-ftw `run` arguments
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            self.rules_dir.to_string_lossy().to_string(),
            "--config".to_string(),
            self.config_path.to_string_lossy().to_string(),
            "--log-file".to_string(),
            self.log_file.to_string_lossy().to_string(),
            "--read-timeout".to_string(),
            self.read_timeout.clone(),
        ];

        if let Some(ref output_log) = self.output_log {
            args.push("-f".to_string());
            args.push(output_log.to_string_lossy().to_string());
        }

        if let Some(ref format) = self.output_format {
            args.push("--output".to_string());
            args.push(format.clone());
        }

        args
    }
}

/// Runs a test invocation and returns its exit code
pub trait TestExecutor {
    async fn execute(&self, invocation: &FtwInvocation) -> Result<i32>;

    /// Human-readable command line, for the run banner
    fn command_line(&self, invocation: &FtwInvocation) -> String;
}

/// go-ftw process runner
#[derive(Clone, Debug)]
pub struct FtwRunner {
    program: String,
    prefix_args: Vec<String>,
}

impl FtwRunner {
    /// Run an installed go-ftw binary
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            program: binary.into(),
            prefix_args: Vec::new(),
        }
    }

    /// Run go-ftw through `go run` pinned by a go.mod file
    pub fn go_run(modfile: impl Into<PathBuf>) -> Self {
        let modfile: PathBuf = modfile.into();
        Self {
            program: "go".to_string(),
            prefix_args: vec![
                "run".to_string(),
                format!("-modfile={}", modfile.display()),
                GO_FTW_MODULE.to_string(),
            ],
        }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        match config.ftw_modfile {
            Some(ref modfile) => Self::go_run(modfile.clone()),
            None => Self::new(config.ftw_bin.clone()),
        }
    }

    fn full_args(&self, invocation: &FtwInvocation) -> Vec<String> {
        let mut args = self.prefix_args.clone();
        args.extend(invocation.args());
        args
    }
}

impl TestExecutor for FtwRunner {
    async fn execute(&self, invocation: &FtwInvocation) -> Result<i32> {
        let args = self.full_args(invocation);
        debug!("Executing {} {:?}", self.program, args);

        let status = Command::new(&self.program)
            .kill_on_drop(true)
            .args(&args)
            .status()
            .await
            .with_context(|| format!("Failed to execute {}", self.program))?;

        Ok(exit_code(status))
    }

    fn command_line(&self, invocation: &FtwInvocation) -> String {
        std::iter::once(self.program.clone())
            .chain(self.full_args(invocation))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Exit code of a finished process, `128 + signal` if it was killed
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            warn!("Test process terminated by signal {}", signal);
            return 128 + signal;
        }
    }

    warn!("Test process ended without an exit code");
    1
}
