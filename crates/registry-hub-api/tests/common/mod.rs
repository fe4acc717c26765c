//! Shared test doubles for the integration tests, generated with mockall
//! against the hub's collaborator traits.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use mockall::mock;
use tokio::sync::mpsc;

use registry_hub_api::apicurio::{
    ArtifactError, ArtifactMetadata, ArtifactRef, ArtifactRegistryClient,
};
use registry_hub_api::db::config_schema::ConfigSchema;
use registry_hub_api::db::module::ServiceModule;
use registry_hub_api::db::store::{ModuleRegistration, RegistryStore, StoreError};
use registry_hub_api::discovery::client::{
    AgentServiceRegistration, CatalogEntry, DiscoveryClient, DiscoveryError,
};
use registry_hub_api::events::{EventEmitter, LifecycleEvent};
use registry_hub_api::orchestrator::module_stub::{ModuleStub, ModuleStubFactory};
use registry_hub_core::requests::ServiceRegistrationMetadata;
use registry_hub_core::HubError;

mock! {
    pub Discovery {}

    #[async_trait::async_trait]
    impl DiscoveryClient for Discovery {
        async fn register(&self, registration: &AgentServiceRegistration) -> bool;
        async fn deregister(&self, service_id: &str) -> bool;
        async fn healthy_nodes(&self, service_name: &str) -> Result<Vec<CatalogEntry>, DiscoveryError>;
        async fn agent_info(&self) -> Result<(), DiscoveryError>;
        async fn catalog_services(&self) -> Result<Vec<String>, DiscoveryError>;
    }
}

mock! {
    pub Store {}

    #[async_trait::async_trait]
    impl RegistryStore for Store {
        async fn register_module(&self, registration: ModuleRegistration) -> Result<ServiceModule, StoreError>;
        async fn save_schema(&self, service_name: &str, version: &str, json_schema: &str) -> Result<ConfigSchema, StoreError>;
        async fn update_heartbeat(&self, service_id: &str) -> Result<(), StoreError>;
        async fn mark_unhealthy(&self, service_id: &str) -> Result<(), StoreError>;
        async fn unregister_module(&self, service_id: &str) -> Result<bool, StoreError>;
        async fn get_active_services(&self) -> Result<Vec<ServiceModule>, StoreError>;
        async fn get_all_services(&self) -> Result<Vec<ServiceModule>, StoreError>;
        async fn find_stale_services(&self) -> Result<Vec<ServiceModule>, StoreError>;
        async fn find_by_id(&self, service_id: &str) -> Result<Option<ServiceModule>, StoreError>;
        async fn find_schema_by_id(&self, schema_id: &str) -> Result<Option<ConfigSchema>, StoreError>;
        async fn find_latest_schema_by_service_name(&self, service_name: &str) -> Result<Option<ConfigSchema>, StoreError>;
        async fn find_schemas_needing_sync(&self) -> Result<Vec<ConfigSchema>, StoreError>;
        async fn mark_schema_synced(&self, schema_id: &str, artifact: &ArtifactRef) -> Result<(), StoreError>;
        async fn mark_schema_sync_failed(&self, schema_id: &str, error: &str) -> Result<(), StoreError>;
        async fn count_services_by_status(&self) -> Result<HashMap<String, i64>, StoreError>;
    }
}

mock! {
    pub Artifacts {}

    #[async_trait::async_trait]
    impl ArtifactRegistryClient for Artifacts {
        async fn create_or_update(&self, service_name: &str, version: &str, json_schema: &str) -> Result<ArtifactRef, ArtifactError>;
        async fn get_schema(&self, service_name: &str, version: &str) -> Result<String, ArtifactError>;
        async fn get_artifact_metadata(&self, service_name: &str) -> Result<Option<ArtifactMetadata>, ArtifactError>;
        async fn list_artifacts(&self) -> Result<Vec<String>, ArtifactError>;
        async fn delete_artifact(&self, service_name: &str) -> Result<bool, ArtifactError>;
        async fn is_healthy(&self) -> bool;
    }
}

mock! {
    pub StubFactory {}

    #[async_trait::async_trait]
    impl ModuleStubFactory for StubFactory {
        async fn open_stub(&self, module_name: &str) -> Result<Box<dyn ModuleStub>, HubError>;
    }
}

mock! {
    pub Stub {}

    #[async_trait::async_trait]
    impl ModuleStub for Stub {
        async fn get_service_registration(&self) -> Result<ServiceRegistrationMetadata, HubError>;
    }
}

/// Emitter double that forwards every event into a channel the test drains.
pub struct RecordingEmitter {
    tx: mpsc::UnboundedSender<LifecycleEvent>,
}

impl RecordingEmitter {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait::async_trait]
impl EventEmitter for RecordingEmitter {
    async fn emit(&self, event: LifecycleEvent) {
        let _ = self.tx.send(event);
    }
}

pub fn healthy_entry(service_id: &str, name: &str, address: &str, port: i32) -> CatalogEntry {
    CatalogEntry {
        service_id: service_id.to_string(),
        service_name: name.to_string(),
        address: address.to_string(),
        port,
        tags: vec![],
        meta: HashMap::new(),
    }
}

pub fn module_row(
    service_id: &str,
    name: &str,
    host: &str,
    port: i32,
    config_schema_id: Option<&str>,
) -> ServiceModule {
    ServiceModule {
        service_id: service_id.to_string(),
        service_name: name.to_string(),
        host: host.to_string(),
        port,
        version: "1.0.0".to_string(),
        config_schema_id: config_schema_id.map(str::to_string),
        metadata: serde_json::json!({}),
        registered_at: Utc::now(),
        last_heartbeat: Utc::now(),
        status: "ACTIVE".to_string(),
    }
}
