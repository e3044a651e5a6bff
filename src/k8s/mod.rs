//! Kubernetes access module
//!
//! Service resolution through the API, plus the kubectl-backed port relay
//! and log streaming used while a test run is in progress.

mod client;
mod kubectl;
mod logs;
mod service;
mod tunnel;

pub use client::K8sClient;
pub use kubectl::Kubectl;
pub use logs::{allocate_log_file, LogCollector, LogSource, LogStream};
pub use service::{GatewayEndpoint, ResolutionError, ServiceResolver, ServiceSource};
pub use tunnel::{TunnelError, TunnelHandle, TunnelManager, Tunneler};

#[cfg(test)]
pub(crate) use tunnel::free_local_port;
#[cfg(test)]
pub(crate) use service::tests as service_fixtures;
