use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use registry_hub_core::{ids, ServiceStatus};

use crate::db::schema::modules;

/// Heartbeats older than this mark an instance as no longer healthy.
pub const HEARTBEAT_STALE_SECONDS: i64 = 30;

/// Registered module row, the system-of-record view of one instance.
#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = modules)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ServiceModule {
    pub service_id: String,
    pub service_name: String,
    pub host: String,
    pub port: i32,
    pub version: String,
    pub config_schema_id: Option<String>,
    pub metadata: serde_json::Value,
    pub registered_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub status: String,
}

impl ServiceModule {
    /// Whether the instance heartbeated within the staleness window.
    pub fn is_healthy(&self) -> bool {
        Utc::now() - self.last_heartbeat < Duration::seconds(HEARTBEAT_STALE_SECONDS)
    }
}

/// Module creation model
#[derive(Insertable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = modules)]
pub struct NewServiceModule {
    pub service_id: String,
    pub service_name: String,
    pub host: String,
    pub port: i32,
    pub version: String,
    pub config_schema_id: Option<String>,
    pub metadata: serde_json::Value,
    pub registered_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub status: String,
}

/// Module update model
#[derive(AsChangeset, Serialize, Deserialize, Debug, Default)]
#[diesel(table_name = modules)]
pub struct UpdateServiceModule {
    pub version: Option<String>,
    pub config_schema_id: Option<Option<String>>,
    pub metadata: Option<serde_json::Value>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub status: Option<String>,
}

impl NewServiceModule {
    pub fn new(service_name: String, host: String, port: i32, version: String) -> Self {
        let now = Utc::now();
        Self {
            service_id: ids::service_id(&service_name, &host, port),
            service_name,
            host,
            port,
            version,
            config_schema_id: None,
            metadata: serde_json::json!({}),
            registered_at: now,
            last_heartbeat: now,
            status: ServiceStatus::Active.as_str().to_string(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_config_schema(mut self, schema_id: Option<String>) -> Self {
        self.config_schema_id = schema_id;
        self
    }
}

impl UpdateServiceModule {
    /// Refresh the heartbeat and reactivate, the idempotent re-registration
    /// baseline.
    pub fn heartbeat() -> Self {
        Self {
            last_heartbeat: Some(Utc::now()),
            status: Some(ServiceStatus::Active.as_str().to_string()),
            ..Default::default()
        }
    }

    pub fn set_status(status: ServiceStatus) -> Self {
        Self {
            status: Some(status.as_str().to_string()),
            ..Default::default()
        }
    }
}
