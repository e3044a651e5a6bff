//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::RunnerConfig;
use crate::utils::LogLevel;

/// go-ftw test runner for Kubernetes Gateway API gateways
#[derive(Parser, Debug)]
#[command(name = "gateway-ftw")]
#[command(version = "0.1.0")]
#[command(about = "Run go-ftw WAF tests against a Kubernetes gateway")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level
    #[arg(long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve the gateway, open connectivity and run go-ftw
    Run(RunArgs),

    /// Print the gateway's service endpoint and exit
    Resolve(ResolveArgs),
}

/// Gateway selection shared by all commands
#[derive(ClapArgs, Debug)]
pub struct GatewayArgs {
    /// Namespace of the gateway
    #[arg(short, long)]
    pub namespace: String,

    /// Gateway name
    #[arg(short, long)]
    pub gateway: String,

    /// Path to kubeconfig
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: GatewayArgs,

    /// Base go-ftw configuration file
    #[arg(short, long)]
    pub config_file: PathBuf,

    /// Directory containing the test rules
    #[arg(short, long)]
    pub rules_directory: PathBuf,

    /// Write go-ftw results to this file
    #[arg(long)]
    pub output_log: Option<PathBuf>,

    /// go-ftw output format
    #[arg(long)]
    pub output_format: Option<String>,

    /// Send tests with this Host header
    #[arg(long)]
    pub hostname: Option<String>,

    /// go-ftw executable
    #[arg(long, default_value = "go-ftw")]
    pub ftw_bin: String,

    /// Run go-ftw with `go run` using this go.mod
    #[arg(long)]
    pub ftw_modfile: Option<PathBuf>,

    /// Connectivity probe attempts
    #[arg(long, default_value = "30")]
    pub probe_attempts: u32,

    /// Delay between probe attempts in milliseconds
    #[arg(long, default_value = "1000")]
    pub probe_interval_ms: u64,

    /// Time given to the port-forward to come up, in milliseconds
    #[arg(long, default_value = "2000")]
    pub settle_delay_ms: u64,

    /// go-ftw read timeout
    #[arg(long, default_value = "10s")]
    pub read_timeout: String,
}

impl RunArgs {
    /// Runner configuration before environment overrides
    pub fn to_config(&self) -> RunnerConfig {
        let mut config = RunnerConfig::new(&self.target.namespace, &self.target.gateway)
            .kubeconfig(self.target.kubeconfig.clone())
            .rules_dir(&self.rules_directory)
            .config_file(&self.config_file)
            .settle_delay(Duration::from_millis(self.settle_delay_ms))
            .probe(
                self.probe_attempts,
                Duration::from_millis(self.probe_interval_ms),
            )
            .hostname(self.hostname.clone());

        config.output_log = self.output_log.clone();
        config.output_format = self.output_format.clone();
        config.ftw_bin = self.ftw_bin.clone();
        config.ftw_modfile = self.ftw_modfile.clone();
        config.read_timeout = self.read_timeout.clone();
        config
    }
}

/// Arguments for resolve command
#[derive(Parser, Debug)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub target: GatewayArgs,

    /// Print the endpoint as YAML
    #[arg(long)]
    pub yaml: bool,
}
