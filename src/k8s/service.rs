//! Gateway service resolution
//!
//! Finds the single Service backing a Gateway and decides how the gateway
//! can be reached from the machine running the tests.

use anyhow::Result;
use k8s_openapi::api::core::v1::Service;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Port used when the service declares no port named "http"
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Service lookup errors
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("No service found with label {selector}")]
    NotFound { selector: String },

    #[error("Multiple services ({count}) found with label {selector}, expected only one")]
    Ambiguous { selector: String, count: usize },

    #[error("Malformed service returned for label {selector}: {reason}")]
    MalformedResponse { selector: String, reason: String },

    #[error("Failed to query services with label {selector}: {message}")]
    Lookup { selector: String, message: String },
}

/// Source of Service objects selected by label
///
/// Implemented by [`super::K8sClient`]; tests substitute in-memory fixtures.
pub trait ServiceSource {
    async fn list_services(&self, selector: &str) -> Result<Vec<Service>>;
}

/// How the gateway is exposed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AddressKind {
    /// Externally reachable load balancer address
    #[serde(rename = "LoadBalancerIP")]
    LoadBalancerIp,
    /// Cluster-internal only, needs a tunnel
    #[serde(rename = "ClusterIP")]
    ClusterIp,
}

impl fmt::Display for AddressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressKind::LoadBalancerIp => write!(f, "LoadBalancerIP"),
            AddressKind::ClusterIp => write!(f, "ClusterIP"),
        }
    }
}

/// Resolved gateway endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayEndpoint {
    pub address_kind: AddressKind,
    /// Load balancer IP, or the service's cluster IP (informational only)
    pub host: String,
    pub port: u16,
    pub service_name: String,
}

impl GatewayEndpoint {
    /// Whether a local tunnel is needed to reach the gateway
    pub fn needs_tunnel(&self) -> bool {
        self.address_kind == AddressKind::ClusterIp
    }

    /// Build an endpoint from a single service object
    pub fn from_service(service: &Service, selector: &str) -> Result<Self, ResolutionError> {
        let malformed = |reason: String| ResolutionError::MalformedResponse {
            selector: selector.to_string(),
            reason,
        };

        let service_name = service
            .metadata
            .name
            .clone()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| malformed("service has no name".to_string()))?;

        let spec = service.spec.as_ref();
        let port = match http_port(service) {
            Some(port) => u16::try_from(port)
                .ok()
                .filter(|port| *port != 0)
                .ok_or_else(|| {
                    malformed(format!("service {service_name} has invalid http port {port}"))
                })?,
            None => DEFAULT_HTTP_PORT,
        };

        let (address_kind, host) = match load_balancer_ip(service) {
            Some(ip) => (AddressKind::LoadBalancerIp, ip),
            None => (
                AddressKind::ClusterIp,
                spec.and_then(|s| s.cluster_ip.clone()).unwrap_or_default(),
            ),
        };

        Ok(Self {
            address_kind,
            host,
            port,
            service_name,
        })
    }
}

/// First ingress IP of a LoadBalancer service
///
/// A LoadBalancer without an assigned IP yet is not reachable externally
/// and yields `None`, as does every other service type.
fn load_balancer_ip(service: &Service) -> Option<String> {
    let is_load_balancer = service
        .spec
        .as_ref()
        .and_then(|spec| spec.type_.as_deref())
        == Some("LoadBalancer");
    if !is_load_balancer {
        return None;
    }

    service
        .status
        .as_ref()?
        .load_balancer
        .as_ref()?
        .ingress
        .as_ref()?
        .iter()
        .find_map(|ingress| ingress.ip.clone().filter(|ip| !ip.is_empty()))
}

/// Port of the entry named exactly "http"
fn http_port(service: &Service) -> Option<i32> {
    service
        .spec
        .as_ref()?
        .ports
        .as_ref()?
        .iter()
        .find(|p| p.name.as_deref() == Some("http"))
        .map(|p| p.port)
}

/// Resolves a gateway name to its backing service endpoint
pub struct ServiceResolver<S> {
    source: S,
    label_key: String,
}

impl<S: ServiceSource> ServiceResolver<S> {
    pub fn new(source: S, label_key: impl Into<String>) -> Self {
        Self {
            source,
            label_key: label_key.into(),
        }
    }

    /// Label selector for a gateway
    pub fn selector(&self, gateway: &str) -> String {
        format!("{}={}", self.label_key, gateway)
    }

    /// Resolve the gateway's endpoint
    ///
    /// Exactly one service must carry the gateway label. No retries.
    pub async fn resolve(&self, gateway: &str) -> Result<GatewayEndpoint, ResolutionError> {
        let selector = self.selector(gateway);
        debug!("Resolving gateway service with {}", selector);

        let services = self
            .source
            .list_services(&selector)
            .await
            .map_err(|e| ResolutionError::Lookup {
                selector: selector.clone(),
                message: format!("{e:#}"),
            })?;

        let service = match services.as_slice() {
            [] => return Err(ResolutionError::NotFound { selector }),
            [service] => service,
            _ => {
                return Err(ResolutionError::Ambiguous {
                    selector,
                    count: services.len(),
                })
            }
        };

        let endpoint = GatewayEndpoint::from_service(service, &selector)?;
        info!(
            "Resolved gateway {} to service {} ({}, port {})",
            gateway, endpoint.service_name, endpoint.address_kind, endpoint.port
        );

        Ok(endpoint)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) struct FixedServices(pub Vec<Service>);

    impl ServiceSource for FixedServices {
        async fn list_services(&self, _selector: &str) -> Result<Vec<Service>> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    impl ServiceSource for FailingSource {
        async fn list_services(&self, _selector: &str) -> Result<Vec<Service>> {
            anyhow::bail!("connection refused")
        }
    }

    pub(crate) fn service(value: serde_json::Value) -> Service {
        serde_json::from_value(value).unwrap()
    }

    pub(crate) fn cluster_ip_service(name: &str, port: u16) -> Service {
        service(json!({
            "metadata": { "name": name },
            "spec": {
                "type": "ClusterIP",
                "clusterIP": "10.96.0.15",
                "ports": [{ "name": "http", "port": port }]
            }
        }))
    }

    pub(crate) fn load_balancer_service(name: &str, ip: &str, port: u16) -> Service {
        service(json!({
            "metadata": { "name": name },
            "spec": {
                "type": "LoadBalancer",
                "clusterIP": "10.96.0.16",
                "ports": [{ "name": "http", "port": port }]
            },
            "status": { "loadBalancer": { "ingress": [{ "ip": ip }] } }
        }))
    }

    fn resolver(services: Vec<Service>) -> ServiceResolver<FixedServices> {
        ServiceResolver::new(FixedServices(services), crate::config::GATEWAY_NAME_LABEL)
    }

    #[tokio::test]
    async fn test_resolve_single_load_balancer() {
        let resolver = resolver(vec![load_balancer_service("gw-istio", "172.18.255.129", 80)]);

        let endpoint = resolver.resolve("gw").await.unwrap();
        assert_eq!(
            endpoint,
            GatewayEndpoint {
                address_kind: AddressKind::LoadBalancerIp,
                host: "172.18.255.129".to_string(),
                port: 80,
                service_name: "gw-istio".to_string(),
            }
        );
        assert!(!endpoint.needs_tunnel());
    }

    #[tokio::test]
    async fn test_resolve_cluster_ip() {
        let resolver = resolver(vec![cluster_ip_service("gw-istio", 8080)]);

        let endpoint = resolver.resolve("gw").await.unwrap();
        assert_eq!(endpoint.address_kind, AddressKind::ClusterIp);
        assert_eq!(endpoint.host, "10.96.0.15");
        assert_eq!(endpoint.port, 8080);
        assert!(endpoint.needs_tunnel());
    }

    #[tokio::test]
    async fn test_resolve_no_services() {
        let err = resolver(vec![]).resolve("gw").await.unwrap_err();
        match err {
            ResolutionError::NotFound { selector } => {
                assert_eq!(selector, "gateway.networking.k8s.io/gateway-name=gw");
            }
            other => panic!("Expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resolve_multiple_services() {
        let resolver = resolver(vec![
            cluster_ip_service("a", 80),
            cluster_ip_service("b", 80),
        ]);

        let err = resolver.resolve("gw").await.unwrap_err();
        assert!(matches!(err, ResolutionError::Ambiguous { count: 2, .. }));
        assert!(err.to_string().contains("gateway-name=gw"));
    }

    #[tokio::test]
    async fn test_resolve_lookup_failure() {
        let resolver = ServiceResolver::new(FailingSource, "app");

        let err = resolver.resolve("gw").await.unwrap_err();
        assert!(matches!(err, ResolutionError::Lookup { .. }));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_load_balancer_without_ingress_falls_back_to_cluster_ip() {
        let svc = service(json!({
            "metadata": { "name": "gw" },
            "spec": { "type": "LoadBalancer", "clusterIP": "10.0.0.1" },
            "status": { "loadBalancer": { "ingress": [] } }
        }));

        let endpoint = GatewayEndpoint::from_service(&svc, "sel").unwrap();
        assert_eq!(endpoint.address_kind, AddressKind::ClusterIp);
        assert_eq!(endpoint.host, "10.0.0.1");
    }

    #[test]
    fn test_load_balancer_with_hostname_only_ingress_falls_back() {
        let svc = service(json!({
            "metadata": { "name": "gw" },
            "spec": { "type": "LoadBalancer" },
            "status": { "loadBalancer": { "ingress": [{ "hostname": "lb.example.com" }] } }
        }));

        let endpoint = GatewayEndpoint::from_service(&svc, "sel").unwrap();
        assert_eq!(endpoint.address_kind, AddressKind::ClusterIp);
    }

    #[test]
    fn test_ingress_ip_ignored_for_non_load_balancer() {
        let svc = service(json!({
            "metadata": { "name": "gw" },
            "spec": { "type": "NodePort" },
            "status": { "loadBalancer": { "ingress": [{ "ip": "1.2.3.4" }] } }
        }));

        let endpoint = GatewayEndpoint::from_service(&svc, "sel").unwrap();
        assert_eq!(endpoint.address_kind, AddressKind::ClusterIp);
    }

    #[test]
    fn test_http_named_port_selected() {
        let svc = service(json!({
            "metadata": { "name": "gw" },
            "spec": {
                "ports": [
                    { "name": "metrics", "port": 9090 },
                    { "name": "http", "port": 8080 }
                ]
            }
        }));

        assert_eq!(GatewayEndpoint::from_service(&svc, "sel").unwrap().port, 8080);
    }

    #[test]
    fn test_default_port_without_http_entry() {
        let unnamed = service(json!({
            "metadata": { "name": "gw" },
            "spec": { "ports": [{ "name": "https", "port": 443 }, { "port": 8081 }] }
        }));
        let no_ports = service(json!({ "metadata": { "name": "gw" }, "spec": {} }));

        assert_eq!(GatewayEndpoint::from_service(&unnamed, "sel").unwrap().port, 80);
        assert_eq!(GatewayEndpoint::from_service(&no_ports, "sel").unwrap().port, 80);
    }

    #[test]
    fn test_malformed_service() {
        let nameless = service(json!({ "metadata": {}, "spec": {} }));
        let bad_port = service(json!({
            "metadata": { "name": "gw" },
            "spec": { "ports": [{ "name": "http", "port": 70000 }] }
        }));

        assert!(matches!(
            GatewayEndpoint::from_service(&nameless, "sel"),
            Err(ResolutionError::MalformedResponse { .. })
        ));
        assert!(matches!(
            GatewayEndpoint::from_service(&bad_port, "sel"),
            Err(ResolutionError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_endpoint_yaml() {
        let endpoint = GatewayEndpoint::from_service(
            &load_balancer_service("gw-istio", "172.18.255.129", 8080),
            "sel",
        )
        .unwrap();

        let yaml = serde_yaml::to_string(&endpoint).unwrap();
        assert!(yaml.contains("addressKind: LoadBalancerIP"));
        assert!(yaml.contains("serviceName: gw-istio"));
        assert!(yaml.contains("port: 8080"));
    }
}
