//! Discovery query surface: listing, lookups, filtered resolution and
//! change-watch streams, all answered from the discovery agent's view.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use futures_util::Stream;
use tracing::warn;

use registry_hub_core::ids;
use registry_hub_core::requests::{
    ModuleDetails, ModuleListResponse, ServiceDetails, ServiceListResponse,
    ServiceResolveRequest, ServiceResolveResponse,
};
use registry_hub_core::HubError;

use crate::discovery::client::{CatalogEntry, DiscoveryClient};

/// Tag that marks an instance as a pipeline module.
pub const MODULE_TAG: &str = "module";

/// Re-snapshot period of the watch streams.
const WATCH_INTERVAL: Duration = Duration::from_secs(2);

const LOCAL_ADDRESSES: [&str; 2] = ["localhost", "127.0.0.1"];

/// Read-only discovery surface over the agent.
pub struct DiscoveryQueryService {
    discovery: Arc<dyn DiscoveryClient>,
}

fn entry_to_service_details(entry: CatalogEntry) -> ServiceDetails {
    ServiceDetails {
        version: entry.meta.get("version").cloned(),
        tags: entry.plain_tags(),
        capabilities: entry.capabilities(),
        service_id: entry.service_id,
        service_name: entry.service_name,
        host: entry.address,
        port: entry.port,
        metadata: entry.meta,
    }
}

fn entry_to_module_details(entry: CatalogEntry) -> ModuleDetails {
    ModuleDetails {
        version: entry.meta.get("version").cloned(),
        tags: entry.plain_tags(),
        capabilities: entry.capabilities(),
        service_id: entry.service_id,
        module_name: entry.service_name,
        host: entry.address,
        port: entry.port,
        metadata: entry.meta,
    }
}

impl DiscoveryQueryService {
    pub fn new(discovery: Arc<dyn DiscoveryClient>) -> Self {
        Self { discovery }
    }

    /// Every healthy instance the agent knows, fanned out per catalog name.
    /// Individual name failures degrade to empty lists; a catalog failure
    /// degrades to an empty snapshot.
    async fn snapshot(&self) -> Vec<CatalogEntry> {
        let mut names = match self.discovery.catalog_services().await {
            Ok(names) => names,
            Err(e) => {
                warn!("Catalog enumeration failed, returning empty snapshot: {}", e);
                return Vec::new();
            }
        };
        names.sort();

        let results =
            join_all(names.iter().map(|name| self.discovery.healthy_nodes(name))).await;
        results
            .into_iter()
            .zip(names)
            .flat_map(|(result, name)| match result {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(service_name = %name, "Health listing failed, skipping: {}", e);
                    Vec::new()
                }
            })
            .collect()
    }

    pub async fn list_services(&self) -> ServiceListResponse {
        let services: Vec<ServiceDetails> = self
            .snapshot()
            .await
            .into_iter()
            .filter(|e| !e.has_tag(MODULE_TAG))
            .map(entry_to_service_details)
            .collect();

        ServiceListResponse {
            total_count: services.len(),
            services,
            as_of: Utc::now(),
        }
    }

    pub async fn list_modules(&self) -> ModuleListResponse {
        let modules: Vec<ModuleDetails> = self
            .snapshot()
            .await
            .into_iter()
            .filter(|e| e.has_tag(MODULE_TAG))
            .map(entry_to_module_details)
            .collect();

        ModuleListResponse {
            total_count: modules.len(),
            modules,
            as_of: Utc::now(),
        }
    }

    pub async fn get_service_by_name(&self, name: &str) -> Result<ServiceDetails, HubError> {
        let nodes = self.discovery.healthy_nodes(name).await?;
        nodes
            .into_iter()
            .next()
            .map(entry_to_service_details)
            .ok_or_else(|| HubError::not_found(format!("Service not found: {}", name)))
    }

    pub async fn get_module_by_name(&self, name: &str) -> Result<ModuleDetails, HubError> {
        let nodes = self.discovery.healthy_nodes(name).await?;
        nodes
            .into_iter()
            .find(|e| e.has_tag(MODULE_TAG))
            .map(entry_to_module_details)
            .ok_or_else(|| HubError::not_found(format!("Module not found: {}", name)))
    }

    pub async fn get_service_by_id(&self, service_id: &str) -> Result<ServiceDetails, HubError> {
        let name = ids::service_name_from_id(service_id)?;
        let nodes = self.discovery.healthy_nodes(&name).await?;
        nodes
            .into_iter()
            .find(|e| e.service_id == service_id)
            .map(entry_to_service_details)
            .ok_or_else(|| HubError::not_found(format!("Service not found: {}", service_id)))
    }

    pub async fn get_module_by_id(&self, service_id: &str) -> Result<ModuleDetails, HubError> {
        let name = ids::service_name_from_id(service_id)?;
        let nodes = self.discovery.healthy_nodes(&name).await?;
        nodes
            .into_iter()
            .find(|e| e.service_id == service_id && e.has_tag(MODULE_TAG))
            .map(entry_to_module_details)
            .ok_or_else(|| HubError::not_found(format!("Module not found: {}", service_id)))
    }

    /// Filtered instance selection with an optional local preference.
    pub async fn resolve_service(&self, request: ServiceResolveRequest) -> ServiceResolveResponse {
        let instances = match self.discovery.healthy_nodes(&request.service_name).await {
            Ok(instances) => instances,
            Err(e) => {
                warn!(
                    service_name = %request.service_name,
                    "Resolution query failed: {}", e
                );
                Vec::new()
            }
        };
        let healthy_count = instances.len();

        if instances.is_empty() {
            return ServiceResolveResponse::not_found(
                0,
                0,
                format!(
                    "No healthy instances found for service: {}",
                    request.service_name
                ),
            );
        }

        let candidates: Vec<&CatalogEntry> = instances
            .iter()
            .filter(|e| request.required_tags.iter().all(|t| e.has_tag(t)))
            .filter(|e| {
                let capabilities = e.capabilities();
                request
                    .required_capabilities
                    .iter()
                    .all(|c| capabilities.contains(c))
            })
            .collect();

        if candidates.is_empty() {
            return ServiceResolveResponse::not_found(
                healthy_count,
                healthy_count,
                "No instances matched the required tags and capabilities",
            );
        }

        let local = request
            .prefer_local
            .then(|| {
                candidates
                    .iter()
                    .find(|e| LOCAL_ADDRESSES.contains(&e.address.as_str()))
                    .copied()
            })
            .flatten();

        let (selected, reason) = match local {
            Some(entry) => (entry, "Selected local instance as requested"),
            None => (candidates[0], "Selected first available healthy instance"),
        };

        ServiceResolveResponse {
            found: true,
            host: Some(selected.address.clone()),
            port: Some(selected.port),
            service_id: Some(selected.service_id.clone()),
            version: selected.meta.get("version").cloned(),
            metadata: selected.meta.clone(),
            tags: selected.plain_tags(),
            capabilities: selected.capabilities(),
            total_instances: healthy_count,
            healthy_instances: healthy_count,
            selection_reason: reason.to_string(),
            resolved_at: Utc::now(),
        }
    }

    /// Stream of service snapshots: one immediately, then one every tick.
    /// The stream ends only when the receiver is dropped.
    pub fn watch_services(&self) -> Pin<Box<dyn Stream<Item = ServiceListResponse> + Send>> {
        let service = DiscoveryQueryService {
            discovery: Arc::clone(&self.discovery),
        };
        Box::pin(async_stream::stream! {
            let mut ticker = tokio::time::interval(WATCH_INTERVAL);
            loop {
                ticker.tick().await;
                yield service.list_services().await;
            }
        })
    }

    /// Stream of module snapshots with the same cadence as
    /// [`Self::watch_services`].
    pub fn watch_modules(&self) -> Pin<Box<dyn Stream<Item = ModuleListResponse> + Send>> {
        let service = DiscoveryQueryService {
            discovery: Arc::clone(&self.discovery),
        };
        Box::pin(async_stream::stream! {
            let mut ticker = tokio::time::interval(WATCH_INTERVAL);
            loop {
                ticker.tick().await;
                yield service.list_modules().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use futures_util::StreamExt;

    use crate::discovery::client::{DiscoveryError, MockDiscoveryClient};

    fn entry(service_id: &str, name: &str, address: &str, tags: Vec<&str>) -> CatalogEntry {
        CatalogEntry {
            service_id: service_id.to_string(),
            service_name: name.to_string(),
            address: address.to_string(),
            port: 9090,
            tags: tags.into_iter().map(str::to_string).collect(),
            meta: HashMap::from([("version".to_string(), "1.2.0".to_string())]),
        }
    }

    #[tokio::test]
    async fn test_listing_partitions_on_module_tag() {
        let mut discovery = MockDiscoveryClient::new();
        discovery
            .expect_catalog_services()
            .returning(|| Ok(vec!["orders".to_string(), "splitter".to_string()]));
        discovery.expect_healthy_nodes().returning(|name| {
            Ok(match name {
                "orders" => vec![entry("orders-10-0-0-4-9090", "orders", "10.0.0.4", vec!["api"])],
                _ => vec![entry(
                    "splitter-localhost-7000",
                    "splitter",
                    "localhost",
                    vec!["module", "document-processor"],
                )],
            })
        });

        let surface = DiscoveryQueryService::new(Arc::new(discovery));
        let services = surface.list_services().await;
        assert_eq!(services.total_count, 1);
        assert_eq!(services.services[0].service_name, "orders");

        let modules = surface.list_modules().await;
        assert_eq!(modules.total_count, 1);
        assert_eq!(modules.modules[0].module_name, "splitter");
    }

    #[tokio::test]
    async fn test_listing_degrades_per_name_failures_to_empty() {
        let mut discovery = MockDiscoveryClient::new();
        discovery
            .expect_catalog_services()
            .returning(|| Ok(vec!["orders".to_string(), "broken".to_string()]));
        discovery.expect_healthy_nodes().returning(|name| {
            if name == "broken" {
                Err(DiscoveryError::UnexpectedStatus {
                    status: 500,
                    body: String::new(),
                })
            } else {
                Ok(vec![entry("orders-10-0-0-4-9090", "orders", "10.0.0.4", vec![])])
            }
        });

        let surface = DiscoveryQueryService::new(Arc::new(discovery));
        let services = surface.list_services().await;
        assert_eq!(services.total_count, 1);
    }

    #[tokio::test]
    async fn test_resolve_prefers_local_instance() {
        let mut discovery = MockDiscoveryClient::new();
        discovery.expect_healthy_nodes().returning(|_| {
            Ok(vec![
                entry("orders-10-0-0-4-9090", "orders", "10.0.0.4", vec![]),
                entry("orders-127-0-0-1-9090", "orders", "127.0.0.1", vec![]),
            ])
        });

        let surface = DiscoveryQueryService::new(Arc::new(discovery));
        let response = surface
            .resolve_service(ServiceResolveRequest {
                service_name: "orders".to_string(),
                prefer_local: true,
                required_tags: vec![],
                required_capabilities: vec![],
            })
            .await;

        assert!(response.found);
        assert_eq!(response.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(
            response.selection_reason,
            "Selected local instance as requested"
        );
        assert_eq!(response.healthy_instances, 2);
    }

    #[tokio::test]
    async fn test_resolve_filters_tags_and_capabilities() {
        let mut discovery = MockDiscoveryClient::new();
        discovery.expect_healthy_nodes().returning(|_| {
            Ok(vec![
                entry("orders-10-0-0-4-9090", "orders", "10.0.0.4", vec!["api"]),
                entry(
                    "orders-10-0-0-5-9090",
                    "orders",
                    "10.0.0.5",
                    vec!["api", "capability:search"],
                ),
            ])
        });

        let surface = DiscoveryQueryService::new(Arc::new(discovery));
        let response = surface
            .resolve_service(ServiceResolveRequest {
                service_name: "orders".to_string(),
                prefer_local: false,
                required_tags: vec!["api".to_string()],
                required_capabilities: vec!["search".to_string()],
            })
            .await;

        assert!(response.found);
        assert_eq!(response.host.as_deref(), Some("10.0.0.5"));
        assert_eq!(response.capabilities, vec!["search".to_string()]);
        assert!(response.tags.iter().all(|t| !t.starts_with("capability:")));
    }

    #[tokio::test]
    async fn test_resolve_reports_miss_with_counts() {
        let mut discovery = MockDiscoveryClient::new();
        discovery
            .expect_healthy_nodes()
            .returning(|_| Ok(vec![entry("orders-10-0-0-4-9090", "orders", "10.0.0.4", vec![])]));

        let surface = DiscoveryQueryService::new(Arc::new(discovery));
        let response = surface
            .resolve_service(ServiceResolveRequest {
                service_name: "orders".to_string(),
                prefer_local: false,
                required_tags: vec!["missing-tag".to_string()],
                required_capabilities: vec![],
            })
            .await;

        assert!(!response.found);
        assert_eq!(response.total_instances, 1);
        assert_eq!(response.healthy_instances, 1);
    }

    #[tokio::test]
    async fn test_malformed_id_lookup_never_reaches_agent() {
        let mut discovery = MockDiscoveryClient::new();
        discovery.expect_healthy_nodes().never();

        let surface = DiscoveryQueryService::new(Arc::new(discovery));
        let err = surface.get_service_by_id("bad-id").await.unwrap_err();
        assert!(matches!(err, HubError::InvalidArgument { .. }));
        assert!(err.to_string().contains("Invalid service ID format: bad-id"));
    }

    #[tokio::test]
    async fn test_lookup_by_id_matches_exactly() {
        let mut discovery = MockDiscoveryClient::new();
        discovery.expect_healthy_nodes().returning(|_| {
            Ok(vec![entry(
                "orders-10-0-0-4-9090",
                "orders",
                "10.0.0.4",
                vec![],
            )])
        });

        let surface = DiscoveryQueryService::new(Arc::new(discovery));
        let found = surface.get_service_by_id("orders-10-0-0-4-9090").await.unwrap();
        assert_eq!(found.service_id, "orders-10-0-0-4-9090");

        let miss = surface.get_service_by_id("orders-10-0-0-9-9090").await;
        assert!(matches!(miss, Err(HubError::NotFound { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_emits_first_snapshot_immediately() {
        let mut discovery = MockDiscoveryClient::new();
        discovery
            .expect_catalog_services()
            .returning(|| Ok(vec!["orders".to_string()]));
        discovery
            .expect_healthy_nodes()
            .returning(|_| Ok(vec![entry("orders-10-0-0-4-9090", "orders", "10.0.0.4", vec![])]));

        let surface = DiscoveryQueryService::new(Arc::new(discovery));
        let mut watch = surface.watch_services();

        // The first element arrives without waiting for the tick.
        let first = watch.next().await.expect("first snapshot");
        assert_eq!(first.total_count, 1);

        // The second only after the 2 s interval elapses.
        tokio::time::advance(Duration::from_secs(2)).await;
        let second = watch.next().await.expect("second snapshot");
        assert_eq!(second.total_count, 1);
    }

    #[tokio::test]
    async fn test_watch_replaces_upstream_errors_with_empty_snapshot() {
        let mut discovery = MockDiscoveryClient::new();
        discovery.expect_catalog_services().returning(|| {
            Err(DiscoveryError::UnexpectedStatus {
                status: 500,
                body: String::new(),
            })
        });

        let surface = DiscoveryQueryService::new(Arc::new(discovery));
        let mut watch = surface.watch_services();
        let first = watch.next().await.expect("snapshot despite failure");
        assert_eq!(first.total_count, 0);
    }
}
