//! Thin client over the discovery agent's HTTP API.
//!
//! Registration and deregistration never raise: failures are logged and
//! reported as `false` so the orchestrator can emit its own terminal events.
//! The client is stateless; one instance is shared across the hub.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};

use registry_hub_core::HubError;

/// Tag prefix under which capabilities surface in the discovery agent.
pub const CAPABILITY_TAG_PREFIX: &str = "capability:";

/// Interval of the gRPC health check configured at registration.
const HEALTH_CHECK_INTERVAL: &str = "10s";
/// How long a critical instance lingers before the agent drops it.
const DEREGISTER_CRITICAL_AFTER: &str = "1m";

/// Discovery-agent errors
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Discovery agent request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Discovery agent returned {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
}

impl From<DiscoveryError> for HubError {
    fn from(err: DiscoveryError) -> Self {
        HubError::Discovery {
            message: err.to_string(),
        }
    }
}

/// One instance registration as handed to the discovery agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentServiceRegistration {
    pub service_id: String,
    pub service_name: String,
    pub host: String,
    pub port: i32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub version: String,
}

impl AgentServiceRegistration {
    /// Tags as published: declared tags plus one `capability:` tag per
    /// capability.
    pub fn published_tags(&self) -> Vec<String> {
        let mut tags = self.tags.clone();
        tags.extend(
            self.capabilities
                .iter()
                .map(|c| format!("{}{}", CAPABILITY_TAG_PREFIX, c)),
        );
        tags
    }

    /// Metadata as published: declared entries plus the version.
    pub fn published_meta(&self) -> HashMap<String, String> {
        let mut meta = self.metadata.clone();
        if !self.version.is_empty() {
            meta.insert("version".to_string(), self.version.clone());
        }
        meta
    }
}

/// One healthy catalog entry as seen through the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub service_id: String,
    pub service_name: String,
    pub address: String,
    pub port: i32,
    pub tags: Vec<String>,
    pub meta: HashMap<String, String>,
}

impl CatalogEntry {
    /// Tags without the capability prefix entries.
    pub fn plain_tags(&self) -> Vec<String> {
        self.tags
            .iter()
            .filter(|t| !t.starts_with(CAPABILITY_TAG_PREFIX))
            .cloned()
            .collect()
    }

    /// Capability names carried as prefixed tags.
    pub fn capabilities(&self) -> Vec<String> {
        self.tags
            .iter()
            .filter_map(|t| t.strip_prefix(CAPABILITY_TAG_PREFIX))
            .map(str::to_string)
            .collect()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Operations against the discovery agent.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiscoveryClient: Send + Sync {
    /// Register an instance together with its gRPC health check. Never
    /// raises; a failure is logged and reported as `false`.
    async fn register(&self, registration: &AgentServiceRegistration) -> bool;

    /// Remove an instance from the agent. Never raises.
    async fn deregister(&self, service_id: &str) -> bool;

    /// Instances of a service whose health checks are passing.
    async fn healthy_nodes(&self, service_name: &str)
        -> Result<Vec<CatalogEntry>, DiscoveryError>;

    /// Reachability probe for readiness.
    async fn agent_info(&self) -> Result<(), DiscoveryError>;

    /// Names of all services known to the agent's catalog.
    async fn catalog_services(&self) -> Result<Vec<String>, DiscoveryError>;
}

/// Consul implementation of [`DiscoveryClient`].
pub struct ConsulDiscoveryClient {
    base_url: String,
    http: reqwest::Client,
}

impl ConsulDiscoveryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct HealthServiceEntry {
    #[serde(rename = "Service")]
    service: HealthServiceBlock,
}

#[derive(Deserialize)]
struct HealthServiceBlock {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Service")]
    service: String,
    #[serde(rename = "Address", default)]
    address: String,
    #[serde(rename = "Port", default)]
    port: i32,
    #[serde(rename = "Tags", default)]
    tags: Vec<String>,
    #[serde(rename = "Meta", default)]
    meta: HashMap<String, String>,
}

#[async_trait]
impl DiscoveryClient for ConsulDiscoveryClient {
    async fn register(&self, registration: &AgentServiceRegistration) -> bool {
        let payload = json!({
            "ID": registration.service_id,
            "Name": registration.service_name,
            "Address": registration.host,
            "Port": registration.port,
            "Tags": registration.published_tags(),
            "Meta": registration.published_meta(),
            "Check": {
                "GRPC": format!("{}:{}", registration.host, registration.port),
                "Interval": HEALTH_CHECK_INTERVAL,
                "DeregisterCriticalServiceAfter": DEREGISTER_CRITICAL_AFTER,
            }
        });

        let result = self
            .http
            .put(format!("{}/agent/service/register", self.base_url))
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!(service_id = %registration.service_id, "Registered with discovery agent");
                true
            }
            Ok(response) => {
                error!(
                    service_id = %registration.service_id,
                    status = response.status().as_u16(),
                    "Discovery agent rejected registration"
                );
                false
            }
            Err(e) => {
                error!(
                    service_id = %registration.service_id,
                    "Discovery agent registration failed: {}", e
                );
                false
            }
        }
    }

    async fn deregister(&self, service_id: &str) -> bool {
        let result = self
            .http
            .put(format!(
                "{}/agent/service/deregister/{}",
                self.base_url, service_id
            ))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!(service_id, "Deregistered from discovery agent");
                true
            }
            Ok(response) => {
                error!(
                    service_id,
                    status = response.status().as_u16(),
                    "Discovery agent rejected deregistration"
                );
                false
            }
            Err(e) => {
                error!(service_id, "Discovery agent deregistration failed: {}", e);
                false
            }
        }
    }

    async fn healthy_nodes(
        &self,
        service_name: &str,
    ) -> Result<Vec<CatalogEntry>, DiscoveryError> {
        let response = self
            .http
            .get(format!("{}/health/service/{}", self.base_url, service_name))
            .query(&[("passing", "true")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::UnexpectedStatus {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let entries: Vec<HealthServiceEntry> = response.json().await?;
        Ok(entries
            .into_iter()
            .map(|e| CatalogEntry {
                service_id: e.service.id,
                service_name: e.service.service,
                address: e.service.address,
                port: e.service.port,
                tags: e.service.tags,
                meta: e.service.meta,
            })
            .collect())
    }

    async fn agent_info(&self) -> Result<(), DiscoveryError> {
        let response = self
            .http
            .get(format!("{}/agent/self", self.base_url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::UnexpectedStatus {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }

    async fn catalog_services(&self) -> Result<Vec<String>, DiscoveryError> {
        let response = self
            .http
            .get(format!("{}/catalog/services", self.base_url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::UnexpectedStatus {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let services: HashMap<String, Vec<String>> = response.json().await?;
        Ok(services.into_keys().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> AgentServiceRegistration {
        AgentServiceRegistration {
            service_id: "orders-10-0-0-4-9090".to_string(),
            service_name: "orders".to_string(),
            host: "10.0.0.4".to_string(),
            port: 9090,
            tags: vec!["api".to_string()],
            metadata: HashMap::new(),
            capabilities: vec!["search".to_string()],
            version: "1.2.0".to_string(),
        }
    }

    #[test]
    fn test_capabilities_become_prefixed_tags() {
        let tags = registration().published_tags();
        assert_eq!(tags, vec!["api".to_string(), "capability:search".to_string()]);
    }

    #[test]
    fn test_version_is_injected_into_meta() {
        let meta = registration().published_meta();
        assert_eq!(meta.get("version").map(String::as_str), Some("1.2.0"));
    }

    #[test]
    fn test_catalog_entry_splits_capability_tags() {
        let entry = CatalogEntry {
            service_id: "orders-10-0-0-4-9090".to_string(),
            service_name: "orders".to_string(),
            address: "10.0.0.4".to_string(),
            port: 9090,
            tags: vec![
                "api".to_string(),
                "capability:search".to_string(),
                "capability:index".to_string(),
            ],
            meta: HashMap::new(),
        };
        assert_eq!(entry.plain_tags(), vec!["api".to_string()]);
        assert_eq!(
            entry.capabilities(),
            vec!["search".to_string(), "index".to_string()]
        );
        assert!(entry.has_tag("api"));
        assert!(!entry.has_tag("module"));
    }
}
