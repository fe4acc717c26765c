//! Layered schema lookup.
//!
//! A module's configuration schema is looked up in order of authority:
//! the store first, then the artifact registry, then the module itself over
//! a dynamic stub (synthesising the default schema when the module reports
//! none). Only when every layer fails does the lookup miss.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use registry_hub_core::requests::{ModuleSchemaRequest, ModuleSchemaResponse};
use registry_hub_core::schema::default_config_schema;
use registry_hub_core::{ids, HubError};

use crate::apicurio::ArtifactRegistryClient;
use crate::db::config_schema::ConfigSchema;
use crate::db::store::RegistryStore;
use crate::orchestrator::module_stub::ModuleStubFactory;

/// Resolves module configuration schemas across the three authorities.
pub struct SchemaLookupService {
    store: Arc<dyn RegistryStore>,
    artifacts: Arc<dyn ArtifactRegistryClient>,
    stubs: Arc<dyn ModuleStubFactory>,
}

impl SchemaLookupService {
    pub fn new(
        store: Arc<dyn RegistryStore>,
        artifacts: Arc<dyn ArtifactRegistryClient>,
        stubs: Arc<dyn ModuleStubFactory>,
    ) -> Self {
        Self {
            store,
            artifacts,
            stubs,
        }
    }

    pub async fn get_module_schema(
        &self,
        request: ModuleSchemaRequest,
    ) -> Result<ModuleSchemaResponse, HubError> {
        let name = request.module_name.trim();
        if name.is_empty() {
            return Err(HubError::invalid_argument("module_name is required"));
        }
        let version = request.version.as_deref().filter(|v| !v.trim().is_empty());

        match self.lookup_store(name, version).await {
            Ok(Some(response)) => return Ok(response),
            Ok(None) => debug!(module_name = name, "Schema not in store"),
            Err(e) => warn!(module_name = name, "Store schema lookup failed: {}", e),
        }

        match self.lookup_registry(name, version).await {
            Ok(response) => return Ok(response),
            Err(e) => debug!(
                module_name = name,
                "Artifact registry lookup failed, asking the module: {}", e
            ),
        }

        match self.lookup_module_direct(name, version).await {
            Ok(response) => Ok(response),
            Err(e) => {
                warn!(module_name = name, "Direct module schema call failed: {}", e);
                Err(HubError::not_found(format!(
                    "Module schema not found: {}",
                    name
                )))
            }
        }
    }

    async fn lookup_store(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<Option<ModuleSchemaResponse>, HubError> {
        let row = match version {
            Some(version) => {
                self.store
                    .find_schema_by_id(&ids::schema_id(name, version))
                    .await?
            }
            None => self.store.find_latest_schema_by_service_name(name).await?,
        };
        Ok(row.map(|row| store_row_to_response(name, row)))
    }

    async fn lookup_registry(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<ModuleSchemaResponse, HubError> {
        let resolve_version = version.unwrap_or("latest");
        let schema_json = self.artifacts.get_schema(name, resolve_version).await?;

        // Artifact metadata is best-effort decoration.
        let artifact_id = match self.artifacts.get_artifact_metadata(name).await {
            Ok(Some(metadata)) => Some(metadata.artifact_id),
            Ok(None) => Some(ids::artifact_id(name, version.unwrap_or(""))),
            Err(e) => {
                debug!(module_name = name, "Artifact metadata unavailable: {}", e);
                Some(ids::artifact_id(name, version.unwrap_or("")))
            }
        };

        Ok(ModuleSchemaResponse {
            module_name: name.to_string(),
            schema_json,
            schema_version: resolve_version.to_string(),
            artifact_id,
            metadata: HashMap::from([("source".to_string(), "apicurio".to_string())]),
            updated_at: Utc::now(),
        })
    }

    async fn lookup_module_direct(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<ModuleSchemaResponse, HubError> {
        let stub = self.stubs.open_stub(name).await?;
        let metadata = stub.get_service_registration().await?;

        let schema_json = metadata
            .json_config_schema
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_config_schema(name));

        Ok(ModuleSchemaResponse {
            module_name: name.to_string(),
            schema_json,
            schema_version: version.unwrap_or("1.0.0").to_string(),
            artifact_id: None,
            metadata: HashMap::from([("source".to_string(), "module-direct".to_string())]),
            updated_at: Utc::now(),
        })
    }
}

fn store_row_to_response(name: &str, row: ConfigSchema) -> ModuleSchemaResponse {
    ModuleSchemaResponse {
        module_name: name.to_string(),
        schema_json: row.json_schema,
        schema_version: row.schema_version,
        artifact_id: row.artifact_id,
        metadata: HashMap::from([("sync_status".to_string(), row.sync_status)]),
        updated_at: row.last_sync_attempt.unwrap_or(row.created_at),
    }
}
