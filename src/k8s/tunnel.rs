//! Local port relay to a cluster service
//!
//! Wraps `kubectl port-forward` for gateways that have no externally
//! reachable address.

use std::io;
use std::net::TcpListener;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use super::Kubectl;

/// Tunnel errors
#[derive(Error, Debug)]
pub enum TunnelError {
    #[error("Failed to allocate a local port: {0}")]
    PortAllocation(#[source] io::Error),

    #[error("Failed to start port-forward to service/{service}: {source}")]
    Spawn {
        service: String,
        #[source]
        source: io::Error,
    },
}

/// Tunnel lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TunnelState {
    Starting,
    Running,
    Stopped,
}

/// Handle to a running port relay
#[derive(Debug)]
pub struct TunnelHandle {
    local_port: u16,
    process: Option<Child>,
    state: TunnelState,
}

impl TunnelHandle {
    pub fn new(local_port: u16, process: Option<Child>) -> Self {
        Self {
            local_port,
            process,
            state: TunnelState::Starting,
        }
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub fn state(&self) -> TunnelState {
        self.state
    }

    pub fn mark_running(&mut self) {
        self.state = TunnelState::Running;
    }

    pub fn mark_stopped(&mut self) {
        self.state = TunnelState::Stopped;
    }

    fn take_process(&mut self) -> Option<Child> {
        self.process.take()
    }
}

/// Starts and stops port relays
pub trait Tunneler {
    async fn start(&self, service_name: &str, remote_port: u16)
        -> Result<TunnelHandle, TunnelError>;

    /// Tear the relay down. Never fails; problems are logged.
    async fn stop(&self, handle: &mut TunnelHandle);
}

/// Pick a free local port
///
/// The port is found by binding an ephemeral port and releasing it again
/// before kubectl binds it. Another process can claim the port in between;
/// that window is accepted, the probe stage surfaces the failure.
pub fn free_local_port() -> io::Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}

/// `kubectl port-forward` based tunnel manager
#[derive(Clone, Debug)]
pub struct TunnelManager {
    kubectl: Kubectl,
    settle_delay: Duration,
    stop_grace: Duration,
}

impl TunnelManager {
    pub fn new(kubectl: Kubectl, settle_delay: Duration, stop_grace: Duration) -> Self {
        Self {
            kubectl,
            settle_delay,
            stop_grace,
        }
    }
}

impl Tunneler for TunnelManager {
    /// Launch the relay and give it `settle_delay` to come up
    ///
    /// Readiness is not checked here.
    async fn start(
        &self,
        service_name: &str,
        remote_port: u16,
    ) -> Result<TunnelHandle, TunnelError> {
        let local_port = free_local_port().map_err(TunnelError::PortAllocation)?;
        info!("Using local port {} for port-forward", local_port);

        let child = self
            .kubectl
            .command(vec![
                "port-forward".to_string(),
                format!("service/{service_name}"),
                format!("{local_port}:{remote_port}"),
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TunnelError::Spawn {
                service: service_name.to_string(),
                source,
            })?;

        let mut handle = TunnelHandle::new(local_port, Some(child));

        debug!(
            "Waiting {}ms for port-forward to settle",
            self.settle_delay.as_millis()
        );
        sleep(self.settle_delay).await;
        handle.mark_running();

        Ok(handle)
    }

    async fn stop(&self, handle: &mut TunnelHandle) {
        let Some(mut child) = handle.take_process() else {
            handle.mark_stopped();
            return;
        };

        info!("Stopping port-forward on local port {}", handle.local_port);

        if let Err(e) = terminate(&mut child).await {
            warn!(
                "Failed to request port-forward termination, killing after {}ms: {}",
                self.stop_grace.as_millis(),
                e
            );
        }

        let exited = match timeout(self.stop_grace, child.wait()).await {
            Ok(Ok(status)) => {
                debug!("Port-forward exited with {}", status);
                true
            }
            Ok(Err(e)) => {
                warn!("Error waiting for port-forward: {}", e);
                false
            }
            Err(_) => {
                warn!("Port-forward did not stop gracefully, killing...");
                false
            }
        };

        // kill() also reaps the process
        if !exited {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill port-forward: {}", e);
            }
        }

        handle.mark_stopped();
    }
}

/// Ask the process to exit
#[cfg(unix)]
async fn terminate(child: &mut Child) -> io::Result<()> {
    let Some(pid) = child.id() else {
        return Ok(());
    };

    let status = Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;

    if status.success() {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::Other,
            format!("kill -TERM {pid} exited with {status}"),
        ))
    }
}

#[cfg(not(unix))]
async fn terminate(child: &mut Child) -> io::Result<()> {
    child.start_kill()
}
