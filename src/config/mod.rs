//! Configuration module
//!
//! Every tunable of a test run lives in [`RunnerConfig`] and is threaded
//! through the orchestrator explicitly.

mod env;

pub use env::EnvConfig;

use std::path::PathBuf;
use std::time::Duration;

/// Label that binds a gateway's backing service and pods to the gateway
pub const GATEWAY_NAME_LABEL: &str = "gateway.networking.k8s.io/gateway-name";

/// Runner configuration
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Namespace the gateway lives in
    pub namespace: String,

    /// Gateway name
    pub gateway: String,

    /// Kubeconfig location
    ///
    /// When unset, both the kube client and kubectl fall back to their own
    /// discovery (`KUBECONFIG`, then `~/.kube/config`, then in-cluster).
    pub kubeconfig: Option<PathBuf>,

    /// Label key used to find the gateway's service and pods
    pub label_key: String,

    /// Delay after spawning the tunnel before it is used
    pub settle_delay: Duration,

    /// Grace period between terminate and kill when stopping the tunnel
    pub stop_grace: Duration,

    /// Maximum number of connectivity probes
    pub probe_attempts: u32,

    /// Sleep between failed probes
    pub probe_interval: Duration,

    /// Timeout of a single probe request
    pub probe_timeout: Duration,

    /// How long to wait for the log file to receive its first bytes
    pub log_start_timeout: Duration,

    /// Poll increment of the log readiness gate
    pub log_poll_interval: Duration,

    /// go-ftw read timeout, passed through verbatim
    pub read_timeout: String,

    /// Rules directory handed to go-ftw
    pub rules_dir: PathBuf,

    /// Base go-ftw configuration file
    pub config_file: PathBuf,

    /// go-ftw execution log output (stdout when unset)
    pub output_log: Option<PathBuf>,

    /// go-ftw execution log format
    pub output_format: Option<String>,

    /// Host header for virtual-host mode
    pub hostname: Option<String>,

    /// go-ftw executable
    pub ftw_bin: String,

    /// When set, go-ftw is run through `go run -modfile=<path>`
    pub ftw_modfile: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            gateway: String::new(),
            kubeconfig: None,
            label_key: GATEWAY_NAME_LABEL.to_string(),
            settle_delay: Duration::from_secs(2),
            stop_grace: Duration::from_secs(5),
            probe_attempts: 30,
            probe_interval: Duration::from_secs(1),
            probe_timeout: Duration::from_secs(2),
            log_start_timeout: Duration::from_secs(5),
            log_poll_interval: Duration::from_millis(100),
            read_timeout: "10s".to_string(),
            rules_dir: PathBuf::new(),
            config_file: PathBuf::new(),
            output_log: None,
            output_format: None,
            hostname: None,
            ftw_bin: "go-ftw".to_string(),
            ftw_modfile: None,
        }
    }
}

impl RunnerConfig {
    pub fn new(namespace: impl Into<String>, gateway: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            gateway: gateway.into(),
            ..Default::default()
        }
    }

    pub fn kubeconfig(mut self, path: Option<PathBuf>) -> Self {
        self.kubeconfig = path;
        self
    }

    pub fn rules_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.rules_dir = path.into();
        self
    }

    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = path.into();
        self
    }

    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn probe(mut self, attempts: u32, interval: Duration) -> Self {
        self.probe_attempts = attempts;
        self.probe_interval = interval;
        self
    }

    pub fn log_start_timeout(mut self, timeout: Duration) -> Self {
        self.log_start_timeout = timeout;
        self
    }

    pub fn hostname(mut self, hostname: Option<String>) -> Self {
        self.hostname = hostname;
        self
    }

    /// Apply environment overrides on top of the current values
    pub fn with_env(self, env: &EnvConfig) -> Self {
        match env.log_start_timeout {
            Some(timeout) => self.log_start_timeout(timeout),
            None => self,
        }
    }

    /// Label selector matching the gateway's service and pods
    pub fn selector(&self) -> String {
        format!("{}={}", self.label_key, self.gateway)
    }
}
