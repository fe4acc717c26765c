//! Request and response shapes of the hub's RPC surface.
//!
//! These are the method shapes of the external interface; the transport
//! binding lives outside this workspace. Streamed methods return
//! [`crate::events::RegistrationEvent`] elements.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request to register a plain service instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRegistrationRequest {
    pub service_name: String,
    pub host: String,
    pub port: i32,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl ServiceRegistrationRequest {
    /// The validation gate of the registration state machine.
    pub fn is_valid(&self) -> bool {
        !self.service_name.trim().is_empty() && !self.host.trim().is_empty() && self.port > 0
    }
}

/// Descriptive metadata a module reports about itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceRegistrationMetadata {
    #[serde(default)]
    pub json_config_schema: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub documentation_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Request to register a pipeline module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleRegistrationRequest {
    pub module_name: String,
    pub host: String,
    pub port: i32,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub registration_metadata: Option<ServiceRegistrationMetadata>,
}

/// Unary unregistration request; the id is derived from the coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnregisterRequest {
    pub service_name: String,
    pub host: String,
    pub port: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnregisterResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// One healthy service instance as seen through the discovery agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDetails {
    pub service_id: String,
    pub service_name: String,
    pub host: String,
    pub port: i32,
    pub version: Option<String>,
    pub tags: Vec<String>,
    pub capabilities: Vec<String>,
    pub metadata: HashMap<String, String>,
}

/// One healthy module instance; modules are services carrying the
/// `module` tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDetails {
    pub service_id: String,
    pub module_name: String,
    pub host: String,
    pub port: i32,
    pub version: Option<String>,
    pub tags: Vec<String>,
    pub capabilities: Vec<String>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceListResponse {
    pub services: Vec<ServiceDetails>,
    pub as_of: DateTime<Utc>,
    pub total_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleListResponse {
    pub modules: Vec<ModuleDetails>,
    pub as_of: DateTime<Utc>,
    pub total_count: usize,
}

/// Lookup by name or by derived id; exactly one field is expected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceLookupRequest {
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub service_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceResolveRequest {
    pub service_name: String,
    #[serde(default)]
    pub prefer_local: bool,
    #[serde(default)]
    pub required_tags: Vec<String>,
    #[serde(default)]
    pub required_capabilities: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceResolveResponse {
    pub found: bool,
    pub host: Option<String>,
    pub port: Option<i32>,
    pub service_id: Option<String>,
    pub version: Option<String>,
    pub metadata: HashMap<String, String>,
    pub tags: Vec<String>,
    pub capabilities: Vec<String>,
    pub total_instances: usize,
    pub healthy_instances: usize,
    pub selection_reason: String,
    pub resolved_at: DateTime<Utc>,
}

impl ServiceResolveResponse {
    /// A miss with instance counts and the reason nothing matched.
    pub fn not_found(
        total_instances: usize,
        healthy_instances: usize,
        selection_reason: impl Into<String>,
    ) -> Self {
        Self {
            found: false,
            host: None,
            port: None,
            service_id: None,
            version: None,
            metadata: HashMap::new(),
            tags: Vec::new(),
            capabilities: Vec::new(),
            total_instances,
            healthy_instances,
            selection_reason: selection_reason.into(),
            resolved_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSchemaRequest {
    pub module_name: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSchemaResponse {
    pub module_name: String,
    pub schema_json: String,
    pub schema_version: String,
    pub artifact_id: Option<String>,
    pub metadata: HashMap<String, String>,
    pub updated_at: DateTime<Utc>,
}
