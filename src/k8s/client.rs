//! Kubernetes client wrapper
//!
//! Provides a high-level interface to the Kubernetes API.

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Service;
use kube::{
    api::{Api, ListParams},
    config::{KubeConfigOptions, Kubeconfig},
    Client, Config,
};
use std::path::Path;
use tracing::debug;

use super::service::ServiceSource;

/// Kubernetes client wrapper
#[derive(Clone)]
pub struct K8sClient {
    client: Client,
    namespace: String,
}

impl K8sClient {
    /// Create a new Kubernetes client
    ///
    /// Reads the given kubeconfig when provided, otherwise uses kube's
    /// default discovery.
    pub async fn new(namespace: impl Into<String>, kubeconfig: Option<&Path>) -> Result<Self> {
        let client = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .with_context(|| format!("Failed to read kubeconfig: {}", path.display()))?;
                let config =
                    Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                        .await
                        .with_context(|| {
                            format!("Failed to load kubeconfig: {}", path.display())
                        })?;
                Client::try_from(config)
                    .context("Failed to create Kubernetes client from config")?
            }
            None => Client::try_default()
                .await
                .context("Failed to create Kubernetes client")?,
        };

        Ok(Self {
            client,
            namespace: namespace.into(),
        })
    }

    /// Get the namespace
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Get services in namespace matching a label selector
    pub async fn services_by_label(&self, selector: &str) -> Result<Vec<Service>> {
        let services: Api<Service> = Api::namespaced(self.client.clone(), &self.namespace);
        let params = ListParams::default().labels(selector);

        debug!("Listing services in {} with {}", self.namespace, selector);

        let svc_list = services
            .list(&params)
            .await
            .with_context(|| format!("Failed to list services in namespace {}", self.namespace))?;

        Ok(svc_list.items)
    }
}

impl ServiceSource for K8sClient {
    async fn list_services(&self, selector: &str) -> Result<Vec<Service>> {
        self.services_by_label(selector).await
    }
}
