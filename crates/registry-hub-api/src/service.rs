//! The hub's RPC surface.
//!
//! One facade exposes every externally callable method with its request and
//! response shapes; the transport binding lives outside this workspace.
//! Server-streaming methods return streams, unary methods return `Result`s
//! whose `InvalidArgument`/`NotFound` variants map to the matching status
//! codes.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::Stream;
use tokio_stream::wrappers::ReceiverStream;

use registry_hub_core::events::RegistrationEvent;
use registry_hub_core::requests::{
    ModuleDetails, ModuleListResponse, ModuleRegistrationRequest, ModuleSchemaRequest,
    ModuleSchemaResponse, ServiceDetails, ServiceListResponse, ServiceLookupRequest,
    ServiceRegistrationRequest, ServiceResolveRequest, ServiceResolveResponse, UnregisterRequest,
    UnregisterResponse,
};
use registry_hub_core::HubError;

use crate::db::store::RegistryStore;
use crate::discovery::surface::DiscoveryQueryService;
use crate::orchestrator::RegistrationOrchestrator;
use crate::readiness::{ReadinessReport, ReadinessService};
use crate::schemas::SchemaLookupService;

/// Facade composing the orchestrator, the discovery surface, schema lookup
/// and readiness.
pub struct RegistrationHubService {
    orchestrator: RegistrationOrchestrator,
    surface: DiscoveryQueryService,
    schemas: SchemaLookupService,
    readiness: ReadinessService,
    store: Arc<dyn RegistryStore>,
}

impl RegistrationHubService {
    pub fn new(
        orchestrator: RegistrationOrchestrator,
        surface: DiscoveryQueryService,
        schemas: SchemaLookupService,
        readiness: ReadinessService,
        store: Arc<dyn RegistryStore>,
    ) -> Self {
        Self {
            orchestrator,
            surface,
            schemas,
            readiness,
            store,
        }
    }

    /// Server-streaming service registration.
    pub fn register_service(
        &self,
        request: ServiceRegistrationRequest,
    ) -> ReceiverStream<RegistrationEvent> {
        self.orchestrator.register_service(request)
    }

    /// Server-streaming module registration.
    pub fn register_module(
        &self,
        request: ModuleRegistrationRequest,
    ) -> ReceiverStream<RegistrationEvent> {
        self.orchestrator.register_module(request)
    }

    pub async fn unregister_service(
        &self,
        request: UnregisterRequest,
    ) -> Result<UnregisterResponse, HubError> {
        self.orchestrator.unregister_service(request).await
    }

    pub async fn unregister_module(
        &self,
        request: UnregisterRequest,
    ) -> Result<UnregisterResponse, HubError> {
        self.orchestrator.unregister_module(request).await
    }

    pub async fn list_services(&self) -> ServiceListResponse {
        self.surface.list_services().await
    }

    pub async fn list_modules(&self) -> ModuleListResponse {
        self.surface.list_modules().await
    }

    pub async fn get_service(
        &self,
        request: ServiceLookupRequest,
    ) -> Result<ServiceDetails, HubError> {
        match (&request.service_id, &request.service_name) {
            (Some(service_id), _) => self.surface.get_service_by_id(service_id).await,
            (None, Some(name)) => self.surface.get_service_by_name(name).await,
            (None, None) => Err(HubError::invalid_argument(
                "service_name or service_id is required",
            )),
        }
    }

    pub async fn get_module(
        &self,
        request: ServiceLookupRequest,
    ) -> Result<ModuleDetails, HubError> {
        match (&request.service_id, &request.service_name) {
            (Some(service_id), _) => self.surface.get_module_by_id(service_id).await,
            (None, Some(name)) => self.surface.get_module_by_name(name).await,
            (None, None) => Err(HubError::invalid_argument(
                "service_name or service_id is required",
            )),
        }
    }

    pub async fn resolve_service(
        &self,
        request: ServiceResolveRequest,
    ) -> Result<ServiceResolveResponse, HubError> {
        if request.service_name.trim().is_empty() {
            return Err(HubError::invalid_argument("service_name is required"));
        }
        Ok(self.surface.resolve_service(request).await)
    }

    pub fn watch_services(&self) -> Pin<Box<dyn Stream<Item = ServiceListResponse> + Send>> {
        self.surface.watch_services()
    }

    pub fn watch_modules(&self) -> Pin<Box<dyn Stream<Item = ModuleListResponse> + Send>> {
        self.surface.watch_modules()
    }

    pub async fn get_module_schema(
        &self,
        request: ModuleSchemaRequest,
    ) -> Result<ModuleSchemaResponse, HubError> {
        self.schemas.get_module_schema(request).await
    }

    pub async fn readiness(&self) -> ReadinessReport {
        self.readiness.check().await
    }

    /// Operational view of the registry: row counts per lifecycle status.
    pub async fn service_counts(&self) -> Result<HashMap<String, i64>, HubError> {
        Ok(self.store.count_services_by_status().await?)
    }
}
