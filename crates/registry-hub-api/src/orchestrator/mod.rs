//! Registration orchestrator.
//!
//! A registration is a multi-stage pipeline across four systems with no
//! common commit protocol; progress is streamed to the caller as one
//! [`RegistrationEvent`] per stage. Each registration runs as its own task
//! writing into a bounded channel that backs the caller's stream, so stages
//! of one registration are strictly sequential while independent
//! registrations proceed concurrently.
//!
//! Compensation rules:
//! - failures before the store write deregister the instance from the
//!   discovery agent (best-effort)
//! - store failures fail the registration without touching the agent
//! - artifact-registry failures after the store write are absorbed; the
//!   store is the system of record and the sync reconciler retries later
//!
//! Failures always arrive as a terminal FAILED event, never as a transport
//! error, so callers can always read the reason.

pub mod module_stub;

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use registry_hub_core::events::{RegistrationEvent, RegistrationEventType};
use registry_hub_core::requests::{
    ModuleRegistrationRequest, ServiceRegistrationRequest, UnregisterRequest, UnregisterResponse,
};
use registry_hub_core::schema::default_config_schema;
use registry_hub_core::{ids, HubError};

use crate::db::store::{ModuleRegistration, RegistryStore};
use crate::discovery::client::{AgentServiceRegistration, DiscoveryClient};
use crate::discovery::health::HealthConverger;
use crate::apicurio::ArtifactRegistryClient;
use crate::events::payloads::{
    ModuleRegistered, ModuleUnregistered, ServiceRegistered, ServiceUnregistered,
};
use crate::events::{EventEmitter, LifecycleEvent};
use module_stub::ModuleStubFactory;

/// Fixed tags every module carries in the discovery agent.
const MODULE_TAGS: [&str; 2] = ["module", "document-processor"];
/// Capability every module provides.
const MODULE_CAPABILITY: &str = "PipeStepProcessor";

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Drives registrations across discovery agent, store, artifact registry and
/// event bus.
#[derive(Clone)]
pub struct RegistrationOrchestrator {
    discovery: Arc<dyn DiscoveryClient>,
    converger: Arc<HealthConverger>,
    store: Arc<dyn RegistryStore>,
    artifacts: Arc<dyn ArtifactRegistryClient>,
    emitter: Arc<dyn EventEmitter>,
    stubs: Arc<dyn ModuleStubFactory>,
}

/// Send one event into the caller's stream; `false` when the caller went
/// away.
async fn send(tx: &mpsc::Sender<RegistrationEvent>, event: RegistrationEvent) -> bool {
    tx.send(event).await.is_ok()
}

/// Flatten a module registration into the service-registration shape handed
/// to the discovery phase.
fn module_to_service_request(request: &ModuleRegistrationRequest) -> ServiceRegistrationRequest {
    let mut tags: Vec<String> = MODULE_TAGS.iter().map(|t| t.to_string()).collect();
    let mut metadata = request.metadata.clone();

    metadata.insert("module-name".to_string(), request.module_name.clone());
    if !request.version.is_empty() {
        metadata.insert("module-version".to_string(), request.version.clone());
    }

    if let Some(embedded) = &request.registration_metadata {
        tags.extend(embedded.tags.iter().cloned());
        if let Some(schema) = embedded
            .json_config_schema
            .as_deref()
            .filter(|s| !s.trim().is_empty())
        {
            metadata.insert("json-config-schema".to_string(), schema.to_string());
        }
        if let Some(display_name) = &embedded.display_name {
            metadata.insert("display-name".to_string(), display_name.clone());
        }
        if let Some(description) = &embedded.description {
            metadata.insert("description".to_string(), description.clone());
        }
    }

    ServiceRegistrationRequest {
        service_name: request.module_name.clone(),
        host: request.host.clone(),
        port: request.port,
        version: request.version.clone(),
        tags,
        metadata,
        capabilities: vec![MODULE_CAPABILITY.to_string()],
    }
}

impl RegistrationOrchestrator {
    pub fn new(
        discovery: Arc<dyn DiscoveryClient>,
        store: Arc<dyn RegistryStore>,
        artifacts: Arc<dyn ArtifactRegistryClient>,
        emitter: Arc<dyn EventEmitter>,
        stubs: Arc<dyn ModuleStubFactory>,
    ) -> Self {
        let converger = Arc::new(HealthConverger::new(Arc::clone(&discovery)));
        Self {
            discovery,
            converger,
            store,
            artifacts,
            emitter,
            stubs,
        }
    }

    /// Register a plain service; returns the caller's event stream.
    pub fn register_service(
        &self,
        request: ServiceRegistrationRequest,
    ) -> ReceiverStream<RegistrationEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.run_service_registration(request, tx).await;
        });
        ReceiverStream::new(rx)
    }

    /// Register a pipeline module; returns the caller's event stream.
    pub fn register_module(
        &self,
        request: ModuleRegistrationRequest,
    ) -> ReceiverStream<RegistrationEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.run_module_registration(request, tx).await;
        });
        ReceiverStream::new(rx)
    }

    async fn run_service_registration(
        &self,
        request: ServiceRegistrationRequest,
        tx: mpsc::Sender<RegistrationEvent>,
    ) {
        let Some(service_id) = self.run_discovery_phase(&request, &tx).await else {
            return;
        };

        let completed = send(
            &tx,
            RegistrationEvent::progress(
                RegistrationEventType::Completed,
                Some(service_id.clone()),
                format!("Service {} registered", request.service_name),
            ),
        )
        .await;

        if completed {
            self.publish(LifecycleEvent::ServiceRegistered(ServiceRegistered {
                service_id,
                service_name: request.service_name,
                host: request.host,
                port: request.port,
                version: request.version,
                timestamp: Utc::now().timestamp_millis(),
            }));
        }
    }

    async fn run_module_registration(
        &self,
        request: ModuleRegistrationRequest,
        tx: mpsc::Sender<RegistrationEvent>,
    ) {
        let service_request = module_to_service_request(&request);
        let Some(service_id) = self.run_discovery_phase(&service_request, &tx).await else {
            return;
        };

        // Pull the module's own registration metadata back over a dynamic
        // stub; a module that cannot answer is not registrable.
        let metadata = match self.fetch_module_metadata(&request.module_name).await {
            Ok(metadata) => metadata,
            Err(e) => {
                self.compensate_deregister(&service_id).await;
                send(
                    &tx,
                    RegistrationEvent::failed(
                        Some(service_id),
                        "Failed to retrieve module registration metadata",
                        e.to_string(),
                    ),
                )
                .await;
                return;
            }
        };
        if !send(
            &tx,
            RegistrationEvent::progress(
                RegistrationEventType::MetadataRetrieved,
                Some(service_id.clone()),
                format!("Retrieved registration metadata from {}", request.module_name),
            ),
        )
        .await
        {
            return;
        }

        let json_schema = metadata
            .json_config_schema
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_config_schema(&request.module_name));
        if !send(
            &tx,
            RegistrationEvent::progress(
                RegistrationEventType::SchemaValidated,
                Some(service_id.clone()),
                "Configuration schema validated",
            ),
        )
        .await
        {
            return;
        }

        let registration = ModuleRegistration {
            service_name: request.module_name.clone(),
            host: request.host.clone(),
            port: request.port,
            version: request.version.clone(),
            metadata: service_request.metadata.clone(),
            json_schema: Some(json_schema.clone()),
        };
        let module = match self.store.register_module(registration).await {
            Ok(module) => module,
            Err(e) => {
                // The agent entry stays: the store is authoritative and the
                // operator reconciles through the stale scan.
                send(
                    &tx,
                    RegistrationEvent::failed(
                        Some(service_id),
                        "Failed to persist module registration",
                        e.to_string(),
                    ),
                )
                .await;
                return;
            }
        };
        if !send(
            &tx,
            RegistrationEvent::progress(
                RegistrationEventType::DatabaseSaved,
                Some(service_id.clone()),
                format!("Module {} persisted", module.service_id),
            ),
        )
        .await
        {
            return;
        }

        let artifact_id = match self
            .artifacts
            .create_or_update(&request.module_name, &request.version, &json_schema)
            .await
        {
            Ok(artifact) => {
                if let Some(schema_id) = &module.config_schema_id {
                    if let Err(e) = self.store.mark_schema_synced(schema_id, &artifact).await {
                        warn!(%schema_id, "Failed to record schema sync: {}", e);
                    }
                }
                if !send(
                    &tx,
                    RegistrationEvent::progress(
                        RegistrationEventType::ApicurioRegistered,
                        Some(service_id.clone()),
                        format!("Schema mirrored as {}", artifact.artifact_id),
                    ),
                )
                .await
                {
                    return;
                }
                artifact.artifact_id
            }
            Err(e) => {
                warn!(
                    module_name = %request.module_name,
                    "Artifact registry sync failed, continuing: {}", e
                );
                if let Some(schema_id) = &module.config_schema_id {
                    if let Err(err) = self
                        .store
                        .mark_schema_sync_failed(schema_id, &e.to_string())
                        .await
                    {
                        warn!(%schema_id, "Failed to record schema sync failure: {}", err);
                    }
                }
                if !send(
                    &tx,
                    RegistrationEvent::progress(
                        RegistrationEventType::SchemaValidated,
                        Some(service_id.clone()),
                        "Apicurio registry sync skipped (failure)",
                    ),
                )
                .await
                {
                    return;
                }
                String::new()
            }
        };

        let completed = send(
            &tx,
            RegistrationEvent::progress(
                RegistrationEventType::Completed,
                Some(service_id.clone()),
                format!("Module {} registered", request.module_name),
            ),
        )
        .await;

        if completed {
            self.publish(LifecycleEvent::ModuleRegistered(ModuleRegistered {
                service_id,
                module_name: request.module_name,
                host: request.host,
                port: request.port,
                version: request.version,
                schema_id: module.config_schema_id.unwrap_or_default(),
                artifact_id,
                timestamp: Utc::now().timestamp_millis(),
            }));
        }
    }

    /// Stages shared by both registration kinds: validate, register with the
    /// discovery agent and wait for health convergence. Emits through
    /// CONSUL_HEALTHY; on failure emits FAILED (compensating where the agent
    /// entry already exists) and returns `None`.
    async fn run_discovery_phase(
        &self,
        request: &ServiceRegistrationRequest,
        tx: &mpsc::Sender<RegistrationEvent>,
    ) -> Option<String> {
        if !send(
            tx,
            RegistrationEvent::progress(
                RegistrationEventType::Started,
                None,
                format!("Starting registration for {}", request.service_name),
            ),
        )
        .await
        {
            return None;
        }

        if !request.is_valid() {
            send(
                tx,
                RegistrationEvent::failed(
                    None,
                    "Invalid service registration request",
                    "service name, host and a positive port are required",
                ),
            )
            .await;
            return None;
        }
        if !send(
            tx,
            RegistrationEvent::progress(
                RegistrationEventType::Validated,
                None,
                "Registration request validated",
            ),
        )
        .await
        {
            return None;
        }

        let service_id = ids::service_id(&request.service_name, &request.host, request.port);
        let registration = AgentServiceRegistration {
            service_id: service_id.clone(),
            service_name: request.service_name.clone(),
            host: request.host.clone(),
            port: request.port,
            tags: request.tags.clone(),
            metadata: request.metadata.clone(),
            capabilities: request.capabilities.clone(),
            version: request.version.clone(),
        };

        if !self.discovery.register(&registration).await {
            send(
                tx,
                RegistrationEvent::failed(
                    Some(service_id),
                    "Discovery agent registration failed",
                    "the discovery agent rejected the registration",
                ),
            )
            .await;
            return None;
        }
        if !send(
            tx,
            RegistrationEvent::progress(
                RegistrationEventType::ConsulRegistered,
                Some(service_id.clone()),
                format!("Registered with discovery agent as {}", service_id),
            ),
        )
        .await
        {
            return None;
        }
        if !send(
            tx,
            RegistrationEvent::progress(
                RegistrationEventType::HealthCheckConfigured,
                Some(service_id.clone()),
                "gRPC health check configured (10s interval)",
            ),
        )
        .await
        {
            return None;
        }

        if !self.converger.wait_for_healthy(&service_id).await {
            self.compensate_deregister(&service_id).await;
            send(
                tx,
                RegistrationEvent::failed(
                    Some(service_id),
                    "Instance never reported healthy by the discovery agent",
                    "health convergence exhausted its attempts",
                ),
            )
            .await;
            return None;
        }
        if !send(
            tx,
            RegistrationEvent::progress(
                RegistrationEventType::ConsulHealthy,
                Some(service_id.clone()),
                "Instance healthy in discovery agent",
            ),
        )
        .await
        {
            return None;
        }

        Some(service_id)
    }

    /// Unregister a service from the discovery agent. The store row is left
    /// in place; deletion is an administrative store operation.
    pub async fn unregister_service(
        &self,
        request: UnregisterRequest,
    ) -> Result<UnregisterResponse, HubError> {
        let service_id = self.validated_unregister_id(&request)?;
        let success = self.discovery.deregister(&service_id).await;

        if success {
            self.publish(LifecycleEvent::ServiceUnregistered(ServiceUnregistered {
                service_id: service_id.clone(),
                service_name: request.service_name.clone(),
                timestamp: Utc::now().timestamp_millis(),
            }));
        }

        Ok(UnregisterResponse {
            message: if success {
                format!("Service {} unregistered", service_id)
            } else {
                format!("Failed to unregister service {}", service_id)
            },
            success,
            timestamp: Utc::now(),
        })
    }

    /// Module counterpart of [`Self::unregister_service`], emitting on the
    /// module topic.
    pub async fn unregister_module(
        &self,
        request: UnregisterRequest,
    ) -> Result<UnregisterResponse, HubError> {
        let service_id = self.validated_unregister_id(&request)?;
        let success = self.discovery.deregister(&service_id).await;

        if success {
            self.publish(LifecycleEvent::ModuleUnregistered(ModuleUnregistered {
                service_id: service_id.clone(),
                module_name: request.service_name.clone(),
                timestamp: Utc::now().timestamp_millis(),
            }));
        }

        Ok(UnregisterResponse {
            message: if success {
                format!("Module {} unregistered", service_id)
            } else {
                format!("Failed to unregister module {}", service_id)
            },
            success,
            timestamp: Utc::now(),
        })
    }

    fn validated_unregister_id(&self, request: &UnregisterRequest) -> Result<String, HubError> {
        if request.service_name.trim().is_empty()
            || request.host.trim().is_empty()
            || request.port <= 0
        {
            return Err(HubError::invalid_argument(
                "service name, host and a positive port are required",
            ));
        }
        Ok(ids::service_id(
            &request.service_name,
            &request.host,
            request.port,
        ))
    }

    async fn fetch_module_metadata(
        &self,
        module_name: &str,
    ) -> Result<registry_hub_core::requests::ServiceRegistrationMetadata, HubError> {
        let stub = self.stubs.open_stub(module_name).await?;
        stub.get_service_registration().await
    }

    async fn compensate_deregister(&self, service_id: &str) {
        if !self.discovery.deregister(service_id).await {
            warn!(
                service_id,
                "Best-effort deregistration failed during compensation"
            );
        }
    }

    fn publish(&self, event: LifecycleEvent) {
        let emitter = Arc::clone(&self.emitter);
        tokio::spawn(async move {
            emitter.emit(event).await;
        });
    }
}
