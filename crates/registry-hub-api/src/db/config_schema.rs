use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use registry_hub_core::{ids, SyncStatus};

use crate::db::schema::config_schemas;

/// Versioned configuration schema row owned by a service.
#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = config_schemas)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ConfigSchema {
    pub schema_id: String,
    pub service_name: String,
    pub schema_version: String,
    pub json_schema: String,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub artifact_id: Option<String>,
    pub artifact_global_id: Option<i64>,
    pub sync_status: String,
    pub last_sync_attempt: Option<DateTime<Utc>>,
    pub sync_error: Option<String>,
}

impl ConfigSchema {
    pub fn sync_status(&self) -> Option<SyncStatus> {
        SyncStatus::parse(&self.sync_status).ok()
    }
}

/// Schema creation model
#[derive(Insertable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = config_schemas)]
pub struct NewConfigSchema {
    pub schema_id: String,
    pub service_name: String,
    pub schema_version: String,
    pub json_schema: String,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub artifact_id: Option<String>,
    pub artifact_global_id: Option<i64>,
    pub sync_status: String,
    pub last_sync_attempt: Option<DateTime<Utc>>,
    pub sync_error: Option<String>,
}

/// Sync-state update model
#[derive(AsChangeset, Serialize, Deserialize, Debug, Default)]
#[diesel(table_name = config_schemas)]
pub struct UpdateConfigSchema {
    pub json_schema: Option<String>,
    pub artifact_id: Option<Option<String>>,
    pub artifact_global_id: Option<Option<i64>>,
    pub sync_status: Option<String>,
    pub last_sync_attempt: Option<Option<DateTime<Utc>>>,
    pub sync_error: Option<Option<String>>,
}

impl NewConfigSchema {
    pub fn new(service_name: String, schema_version: String, json_schema: String) -> Self {
        Self {
            schema_id: ids::schema_id(&service_name, &schema_version),
            service_name,
            schema_version,
            json_schema,
            created_at: Utc::now(),
            created_by: None,
            artifact_id: None,
            artifact_global_id: None,
            sync_status: SyncStatus::Pending.as_str().to_string(),
            last_sync_attempt: None,
            sync_error: None,
        }
    }

    pub fn with_created_by(mut self, created_by: Option<String>) -> Self {
        self.created_by = created_by;
        self
    }
}

impl UpdateConfigSchema {
    /// Record a successful mirror into the artifact registry.
    pub fn synced(artifact_id: String, artifact_global_id: i64) -> Self {
        Self {
            artifact_id: Some(Some(artifact_id)),
            artifact_global_id: Some(Some(artifact_global_id)),
            sync_status: Some(SyncStatus::Synced.as_str().to_string()),
            last_sync_attempt: Some(Some(Utc::now())),
            sync_error: Some(None),
            ..Default::default()
        }
    }

    /// Record a failed mirror attempt without touching the local copy.
    pub fn sync_failed(error: String) -> Self {
        Self {
            sync_status: Some(SyncStatus::Failed.as_str().to_string()),
            last_sync_attempt: Some(Some(Utc::now())),
            sync_error: Some(Some(error)),
            ..Default::default()
        }
    }
}
