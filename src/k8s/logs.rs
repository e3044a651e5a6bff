//! Gateway pod log capture
//!
//! Streams the logs of every pod matching the gateway selector into a file
//! for the duration of a run. go-ftw reads that file to correlate requests
//! with rule hits. Capture is best-effort: failures never abort a run.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use super::Kubectl;

/// Log stream lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogStreamState {
    /// Started, no output seen yet
    Pending,
    /// Output file has received data
    Streaming,
    /// Background task dropped
    Abandoned,
}

/// A background log capture
///
/// The task is never joined. [`LogStream::abandon`] bounds it at shutdown.
#[derive(Debug)]
pub struct LogStream {
    output_path: PathBuf,
    state: LogStreamState,
    task: JoinHandle<()>,
}

impl LogStream {
    pub fn new(output_path: impl Into<PathBuf>, task: JoinHandle<()>) -> Self {
        Self {
            output_path: output_path.into(),
            state: LogStreamState::Pending,
            task,
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn state(&self) -> LogStreamState {
        self.state
    }

    /// Readiness gate
    ///
    /// Any byte in the output file counts as ready, whether or not it is a
    /// relevant log line. Returns false on timeout.
    pub async fn wait_ready(&mut self, timeout: Duration, poll_interval: Duration) -> bool {
        let ready = wait_for_output(&self.output_path, timeout, poll_interval).await;
        if ready && self.state == LogStreamState::Pending {
            self.state = LogStreamState::Streaming;
        }
        ready
    }

    /// Stop tracking the task, aborting it if still running
    pub fn abandon(&mut self) {
        self.task.abort();
        self.state = LogStreamState::Abandoned;
    }
}

/// Starts background log captures
pub trait LogSource {
    fn start_streaming(&self, selector: &str, output_path: &Path) -> LogStream;
}

/// `kubectl logs -f` based collector
#[derive(Clone, Debug)]
pub struct LogCollector {
    kubectl: Kubectl,
}

impl LogCollector {
    pub fn new(kubectl: Kubectl) -> Self {
        Self { kubectl }
    }
}

impl LogSource for LogCollector {
    fn start_streaming(&self, selector: &str, output_path: &Path) -> LogStream {
        info!("Streaming pod logs to: {}", output_path.display());

        let kubectl = self.kubectl.clone();
        let selector = selector.to_string();
        let path = output_path.to_path_buf();

        let task = tokio::spawn(async move {
            if let Err(e) = stream_logs(&kubectl, &selector, &path).await {
                debug!("Log streaming for {} ended: {:#}", selector, e);
            }
        });

        LogStream::new(output_path, task)
    }
}

async fn stream_logs(kubectl: &Kubectl, selector: &str, path: &Path) -> Result<()> {
    let stdout = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    let stderr = stdout.try_clone().context("Failed to clone log file handle")?;

    let mut child = kubectl
        .command(vec![
            "logs".to_string(),
            "-l".to_string(),
            selector.to_string(),
            "-f".to_string(),
            "--all-containers=true".to_string(),
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .kill_on_drop(true)
        .spawn()
        .context("Failed to spawn kubectl logs")?;

    let status = child.wait().await.context("Failed to wait for kubectl logs")?;
    debug!("kubectl logs exited with {}", status);

    Ok(())
}

/// Poll `path` until it exists with non-zero size or `timeout` elapses
pub async fn wait_for_output(path: &Path, timeout: Duration, poll_interval: Duration) -> bool {
    let deadline = Instant::now() + timeout;

    loop {
        if has_output(path).await {
            return true;
        }

        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        sleep(poll_interval.min(deadline - now)).await;
    }
}

async fn has_output(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.len() > 0)
        .unwrap_or(false)
}

/// Create an empty, persistent log file in the temp directory
pub fn allocate_log_file() -> io::Result<PathBuf> {
    let file = tempfile::Builder::new()
        .prefix("ftw_logs_")
        .suffix(".log")
        .tempfile()?;
    let (_, path) = file.keep().map_err(|e| e.error)?;
    Ok(path)
}
