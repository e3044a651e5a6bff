//! gateway-ftw - go-ftw WAF test runner for Kubernetes gateways
//!
//! Finds the service behind a Gateway API gateway, makes it reachable from
//! the local machine (directly or through `kubectl port-forward`), streams
//! the gateway's pod logs to a file, and runs go-ftw against it with a
//! derived configuration.
//!
//! ## Usage
//!
//! ```bash
//! # Run the CRS regression tests against a gateway
//! gateway-ftw run --namespace waf --gateway gw-istio \
//!     --config-file ftw.yaml --rules-directory tests/
//!
//! # Send every test with a fixed Host header
//! gateway-ftw run -n waf -g gw-istio -c ftw.yaml -r tests/ --hostname waf.example.com
//!
//! # Show which service backs a gateway
//! gateway-ftw resolve --namespace waf --gateway gw-istio
//! ```
//!
//! `FTW_LOG_START_TIMEOUT_SECONDS` bounds the wait for the first gateway log
//! line (default 5).

use anyhow::Result;
use clap::Parser;
use tracing::debug;

mod cli;
mod config;
mod ftw;
mod health;
mod http;
mod k8s;
mod orchestrator;
#[cfg(test)]
mod testing;
mod utils;

use cli::Args;
use config::{EnvConfig, RunnerConfig};
use ftw::FtwRunner;
use k8s::{K8sClient, Kubectl, LogCollector, ServiceResolver, TunnelManager};
use orchestrator::Orchestrator;
use utils::{init_logger, LogLevel};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logger(LogLevel::from_flags(args.log_level, args.verbose));

    let code = match args.command {
        cli::Command::Run(run_args) => run(run_args).await,
        cli::Command::Resolve(resolve_args) => match resolve(resolve_args).await {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("ERROR: {e:#}");
                1
            }
        },
    };

    std::process::exit(code);
}

async fn run(args: cli::RunArgs) -> i32 {
    let config = args.to_config().with_env(&EnvConfig::load());

    let orchestrator = match build_orchestrator(config).await {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            eprintln!("ERROR: {e:#}");
            return 1;
        }
    };

    let report = orchestrator.run().await;
    if let Err(ref e) = report.outcome {
        eprintln!("ERROR: {e}");
    }
    if let Some(state) = report.final_state() {
        debug!("Run ended in {} state", state);
    }

    report.exit_code()
}

async fn build_orchestrator(
    config: RunnerConfig,
) -> Result<Orchestrator<K8sClient, TunnelManager, LogCollector, FtwRunner>> {
    let client = K8sClient::new(&config.namespace, config.kubeconfig.as_deref()).await?;
    let kubectl = Kubectl::new(&config.namespace, config.kubeconfig.clone());

    let tunnels = TunnelManager::new(kubectl.clone(), config.settle_delay, config.stop_grace);
    let logs = LogCollector::new(kubectl);
    let executor = FtwRunner::from_config(&config);

    Ok(Orchestrator::new(config, client, tunnels, logs, executor))
}

async fn resolve(args: cli::ResolveArgs) -> Result<()> {
    let target = &args.target;
    let client = K8sClient::new(&target.namespace, target.kubeconfig.as_deref()).await?;
    let namespace = client.namespace().to_string();
    let resolver = ServiceResolver::new(client, config::GATEWAY_NAME_LABEL);

    let endpoint = resolver.resolve(&target.gateway).await?;

    if args.yaml {
        print!("{}", serde_yaml::to_string(&endpoint)?);
        return Ok(());
    }

    println!("Namespace: {namespace}");
    println!("Service: {}", endpoint.service_name);
    println!("Address kind: {}", endpoint.address_kind);
    println!("Host: {}", endpoint.host);
    println!("Port: {}", endpoint.port);
    if endpoint.needs_tunnel() {
        println!("Tests will run through a port-forward to this service.");
    }

    Ok(())
}
