//! Run sequencing

use std::future::Future;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::shutdown::shutdown_signal;
use super::{RunError, RunReport, RunState};
use crate::config::RunnerConfig;
use crate::ftw::{overlay, FtwInvocation, TestExecutor};
use crate::health::ConnectivityProber;
use crate::k8s::{
    allocate_log_file, GatewayEndpoint, LogSource, LogStream, ServiceResolver, ServiceSource,
    TunnelHandle, Tunneler,
};
use crate::utils::Timer;

/// Loopback address the tunnel listens on
const TUNNEL_HOST: &str = "127.0.0.1";

/// Resources a run has acquired and must release
#[derive(Default)]
struct Session {
    tunnel: Option<TunnelHandle>,
    log_stream: Option<LogStream>,
    derived_config: Option<PathBuf>,
}

/// Drives one test run from resolution to cleanup
pub struct Orchestrator<S, T, L, E> {
    config: RunnerConfig,
    resolver: ServiceResolver<S>,
    tunnels: T,
    logs: L,
    executor: E,
}

impl<S, T, L, E> Orchestrator<S, T, L, E>
where
    S: ServiceSource,
    T: Tunneler,
    L: LogSource,
    E: TestExecutor,
{
    pub fn new(config: RunnerConfig, services: S, tunnels: T, logs: L, executor: E) -> Self {
        let resolver = ServiceResolver::new(services, config.label_key.clone());
        Self {
            config,
            resolver,
            tunnels,
            logs,
            executor,
        }
    }

    /// Run the whole pipeline, stopping early on Ctrl+C or SIGTERM
    pub async fn run(&self) -> RunReport {
        self.run_until(shutdown_signal()).await
    }

    /// Run the whole pipeline until `shutdown` resolves
    ///
    /// Once resolution has succeeded, cleanup runs on every path before the
    /// report is returned, an interrupt included.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) -> RunReport {
        let total = Timer::start("Test run");
        let mut states = Vec::new();

        enter(&mut states, RunState::Resolving);
        let endpoint = match self.resolve().await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                enter(&mut states, RunState::Failed);
                return RunReport {
                    states,
                    outcome: Err(e),
                };
            }
        };

        let mut session = Session::default();
        let outcome = tokio::select! {
            outcome = self.execute(&endpoint, &mut session, &mut states) => outcome,
            _ = shutdown => Err(RunError::Interrupted),
        };

        enter(&mut states, RunState::Cleanup);
        self.cleanup(&mut session).await;

        match outcome {
            Ok(_) => enter(&mut states, RunState::Done),
            Err(ref e) => {
                warn!("Run failed: {}", e);
                enter(&mut states, RunState::Failed);
            }
        }
        total.stop();

        RunReport { states, outcome }
    }

    async fn resolve(&self) -> Result<GatewayEndpoint, RunError> {
        let timer = Timer::start("Service resolution");
        let endpoint = self.resolver.resolve(&self.config.gateway).await?;
        timer.stop();

        println!("Gateway service: {}", endpoint.service_name);
        println!("Address: {} ({})", endpoint.host, endpoint.address_kind);
        println!("Port: {}", endpoint.port);

        Ok(endpoint)
    }

    async fn execute(
        &self,
        endpoint: &GatewayEndpoint,
        session: &mut Session,
        states: &mut Vec<RunState>,
    ) -> Result<i32, RunError> {
        let (host, port) = if endpoint.needs_tunnel() {
            enter(states, RunState::TunnelSetup);
            let timer = Timer::start("Tunnel setup");
            let handle = self
                .tunnels
                .start(&endpoint.service_name, endpoint.port)
                .await?;
            let tunnel = session.tunnel.insert(handle);
            timer.stop();
            (TUNNEL_HOST.to_string(), tunnel.local_port())
        } else {
            (endpoint.host.clone(), endpoint.port)
        };

        enter(states, RunState::Probing);
        self.probe(&host, port).await?;
        println!("Target: {host}:{port}");

        enter(states, RunState::Ready);
        let log_file = self.start_log_capture(session).await?;
        let config_path = self.derive_config(&host, port, session)?;

        enter(states, RunState::Running);
        let invocation = FtwInvocation {
            rules_dir: self.config.rules_dir.clone(),
            config_path,
            log_file: log_file.clone(),
            read_timeout: self.config.read_timeout.clone(),
            output_log: self.config.output_log.clone(),
            output_format: self.config.output_format.clone(),
        };

        println!("Executing: {}", self.executor.command_line(&invocation));
        let timer = Timer::start("go-ftw");
        let code = self
            .executor
            .execute(&invocation)
            .await
            .map_err(RunError::Execution)?;
        timer.stop();

        println!("go-ftw exited with code {code}");
        println!("Gateway logs kept at: {}", log_file.display());

        Ok(code)
    }

    async fn probe(&self, host: &str, port: u16) -> Result<(), RunError> {
        let timer = Timer::start("Connectivity probe");
        let prober = ConnectivityProber::new(self.config.probe_timeout)?;
        let result = prober
            .probe(
                host,
                port,
                self.config.probe_attempts,
                self.config.probe_interval,
            )
            .await;
        timer.stop();

        if result.success {
            info!(
                "Gateway reachable after {} attempt(s)",
                result.attempts_used
            );
            Ok(())
        } else {
            Err(RunError::ProbeExhausted {
                target: format!("{host}:{port}"),
                attempts: result.attempts_used,
                last_error: result.last_error,
            })
        }
    }

    /// Start streaming gateway logs and wait briefly for the first bytes
    ///
    /// A stream that stays silent is reported and the run carries on.
    async fn start_log_capture(&self, session: &mut Session) -> Result<PathBuf, RunError> {
        let log_file = allocate_log_file().map_err(RunError::LogFile)?;
        println!("Log file: {}", log_file.display());

        let stream = self
            .logs
            .start_streaming(&self.config.selector(), &log_file);
        let stream = session.log_stream.insert(stream);

        let timer = Timer::start("Log stream start");
        let ready = stream
            .wait_ready(self.config.log_start_timeout, self.config.log_poll_interval)
            .await;
        timer.stop();

        if !ready {
            warn!(
                "No gateway log output after {}ms",
                self.config.log_start_timeout.as_millis()
            );
            eprintln!(
                "WARNING: gateway logs did not start within {:.1}s, continuing without them",
                self.config.log_start_timeout.as_secs_f64()
            );
        }

        Ok(log_file)
    }

    fn derive_config(
        &self,
        host: &str,
        port: u16,
        session: &mut Session,
    ) -> Result<PathBuf, RunError> {
        let base = overlay::load(&self.config.config_file)?;
        let mut derived = overlay::overlay(base, host, port);
        if let Some(ref hostname) = self.config.hostname {
            info!("Using virtual host {}", hostname);
            derived = overlay::with_virtual_host(derived, hostname);
        }

        let path = overlay::persist(&derived)?;
        session.derived_config = Some(path.clone());
        println!("Config file: {}", path.display());

        Ok(path)
    }

    async fn cleanup(&self, session: &mut Session) {
        if let Some(mut tunnel) = session.tunnel.take() {
            self.tunnels.stop(&mut tunnel).await;
            debug!(
                "Tunnel on local port {} is {:?}",
                tunnel.local_port(),
                tunnel.state()
            );
        }

        if let Some(mut stream) = session.log_stream.take() {
            let state = stream.state();
            stream.abandon();
            debug!(
                "Log stream to {} abandoned ({:?})",
                stream.output_path().display(),
                state
            );
        }

        if let Some(path) = session.derived_config.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                debug!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
}

fn enter(states: &mut Vec<RunState>, state: RunState) {
    info!("Entering {} stage", state);
    states.push(state);
}
