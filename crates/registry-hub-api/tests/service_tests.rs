//! Facade tests: lookup dispatch, argument validation and the operational
//! count surface.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use diesel::r2d2::{ConnectionManager, Pool};

use registry_hub_api::db::session::DbPool;
use registry_hub_api::discovery::surface::DiscoveryQueryService;
use registry_hub_api::orchestrator::RegistrationOrchestrator;
use registry_hub_api::readiness::ReadinessService;
use registry_hub_api::schemas::SchemaLookupService;
use registry_hub_api::RegistrationHubService;
use registry_hub_core::requests::{ServiceLookupRequest, ServiceResolveRequest};
use registry_hub_core::HubError;

use common::{
    healthy_entry, MockArtifacts, MockDiscovery, MockStore, MockStubFactory, RecordingEmitter,
};

fn offline_pool() -> DbPool {
    Pool::builder()
        .max_size(1)
        .connection_timeout(Duration::from_millis(50))
        .build_unchecked(ConnectionManager::new("postgres://invalid:1/missing"))
}

fn build_service(discovery: MockDiscovery, store: MockStore) -> RegistrationHubService {
    let discovery = Arc::new(discovery);
    let store = Arc::new(store);
    let artifacts = Arc::new(MockArtifacts::new());
    let stubs = Arc::new(MockStubFactory::new());
    let (emitter, _rx) = RecordingEmitter::new();

    let orchestrator = RegistrationOrchestrator::new(
        discovery.clone(),
        store.clone(),
        artifacts.clone(),
        emitter,
        stubs.clone(),
    );
    let surface = DiscoveryQueryService::new(discovery.clone());
    let schemas = SchemaLookupService::new(store.clone(), artifacts.clone(), stubs);
    let readiness = ReadinessService::new(offline_pool(), discovery, artifacts);

    RegistrationHubService::new(orchestrator, surface, schemas, readiness, store)
}

#[tokio::test]
async fn test_get_service_prefers_id_over_name() {
    let mut discovery = MockDiscovery::new();
    discovery
        .expect_healthy_nodes()
        .withf(|name| name == "orders-10-0-0")
        .returning(|_| {
            Ok(vec![healthy_entry(
                "orders-10-0-0-4-9090",
                "orders",
                "10.0.0.4",
                9090,
            )])
        });

    let hub = build_service(discovery, MockStore::new());
    let details = hub
        .get_service(ServiceLookupRequest {
            service_name: Some("ignored".to_string()),
            service_id: Some("orders-10-0-0-4-9090".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(details.service_id, "orders-10-0-0-4-9090");
}

#[tokio::test]
async fn test_get_service_requires_a_selector() {
    let hub = build_service(MockDiscovery::new(), MockStore::new());
    let err = hub.get_service(ServiceLookupRequest::default()).await.unwrap_err();
    assert!(matches!(err, HubError::InvalidArgument { .. }));
}

#[tokio::test]
async fn test_resolve_validates_service_name() {
    let hub = build_service(MockDiscovery::new(), MockStore::new());
    let err = hub
        .resolve_service(ServiceResolveRequest {
            service_name: "  ".to_string(),
            prefer_local: false,
            required_tags: vec![],
            required_capabilities: vec![],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::InvalidArgument { .. }));
}

#[tokio::test]
async fn test_service_counts_come_from_the_store() {
    let mut store = MockStore::new();
    store.expect_count_services_by_status().returning(|| {
        Ok(HashMap::from([
            ("ACTIVE".to_string(), 3),
            ("UNHEALTHY".to_string(), 1),
        ]))
    });

    let hub = build_service(MockDiscovery::new(), store);
    let counts = hub.service_counts().await.unwrap();
    assert_eq!(counts.get("ACTIVE"), Some(&3));
    assert_eq!(counts.get("UNHEALTHY"), Some(&1));
}
