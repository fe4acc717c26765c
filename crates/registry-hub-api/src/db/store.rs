//! Durable registry store over PostgreSQL.
//!
//! The store exclusively owns writes to the `modules` and `config_schemas`
//! tables. Mutations run inside explicit transactions on the blocking worker
//! pool; the checked-out connection stays inside one closure for the whole
//! transaction so the session keeps thread affinity.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use registry_hub_core::{ids, HubError, ServiceStatus, SyncStatus};

use crate::apicurio::{ArtifactRef, ArtifactRegistryClient};
use crate::db::config_schema::{ConfigSchema, NewConfigSchema, UpdateConfigSchema};
use crate::db::module::{
    NewServiceModule, ServiceModule, UpdateServiceModule, HEARTBEAT_STALE_SECONDS,
};
use crate::db::schema::{config_schemas, modules};
use crate::db::session::DbPool;

/// Registry store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("Module not found: {service_id}")]
    ModuleNotFound { service_id: String },

    #[error("Schema not found: {schema_id}")]
    SchemaNotFound { schema_id: String },
}

impl From<StoreError> for HubError {
    fn from(err: StoreError) -> Self {
        HubError::Store {
            message: err.to_string(),
        }
    }
}

/// Input to the idempotent module upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleRegistration {
    pub service_name: String,
    pub host: String,
    pub port: i32,
    pub version: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub json_schema: Option<String>,
}

/// Core store operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Upsert a module (and, when a schema is supplied, its `ConfigSchema`)
    /// in one transaction. Re-registration refreshes the heartbeat, sets the
    /// status back to ACTIVE and updates mutable fields only when changed.
    async fn register_module(
        &self,
        registration: ModuleRegistration,
    ) -> Result<ServiceModule, StoreError>;

    /// Insert a schema and attempt the artifact-registry mirror. A failed
    /// mirror marks the row FAILED with the error text; the insert is never
    /// rolled back.
    async fn save_schema(
        &self,
        service_name: &str,
        version: &str,
        json_schema: &str,
    ) -> Result<ConfigSchema, StoreError>;

    async fn update_heartbeat(&self, service_id: &str) -> Result<(), StoreError>;
    async fn mark_unhealthy(&self, service_id: &str) -> Result<(), StoreError>;

    /// Administrative row deletion; `false` when the row was absent.
    async fn unregister_module(&self, service_id: &str) -> Result<bool, StoreError>;

    async fn get_active_services(&self) -> Result<Vec<ServiceModule>, StoreError>;
    async fn get_all_services(&self) -> Result<Vec<ServiceModule>, StoreError>;

    /// ACTIVE modules whose heartbeat fell outside the staleness window.
    async fn find_stale_services(&self) -> Result<Vec<ServiceModule>, StoreError>;

    async fn find_by_id(&self, service_id: &str) -> Result<Option<ServiceModule>, StoreError>;
    async fn find_schema_by_id(&self, schema_id: &str)
        -> Result<Option<ConfigSchema>, StoreError>;
    async fn find_latest_schema_by_service_name(
        &self,
        service_name: &str,
    ) -> Result<Option<ConfigSchema>, StoreError>;

    /// Schemas whose mirror state needs the reconciler: PENDING, FAILED or
    /// OUT_OF_SYNC.
    async fn find_schemas_needing_sync(&self) -> Result<Vec<ConfigSchema>, StoreError>;

    async fn mark_schema_synced(
        &self,
        schema_id: &str,
        artifact: &ArtifactRef,
    ) -> Result<(), StoreError>;
    async fn mark_schema_sync_failed(
        &self,
        schema_id: &str,
        error: &str,
    ) -> Result<(), StoreError>;

    async fn count_services_by_status(&self) -> Result<HashMap<String, i64>, StoreError>;
}

/// PostgreSQL implementation of [`RegistryStore`].
pub struct PostgresRegistryStore {
    pool: DbPool,
    artifacts: Arc<dyn ArtifactRegistryClient>,
}

impl PostgresRegistryStore {
    pub fn new(pool: DbPool, artifacts: Arc<dyn ArtifactRegistryClient>) -> Self {
        Self { pool, artifacts }
    }
}

fn join_error(err: tokio::task::JoinError) -> StoreError {
    warn!("Store worker task failed: {}", err);
    StoreError::Database(diesel::result::Error::RollbackTransaction)
}

fn metadata_to_json(metadata: &HashMap<String, String>) -> serde_json::Value {
    serde_json::Value::Object(
        metadata
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect(),
    )
}

/// Upsert a `ConfigSchema` by its deterministic id inside an open
/// transaction.
fn upsert_schema(
    conn: &mut PgConnection,
    service_name: &str,
    version: &str,
    json_schema: &str,
) -> Result<ConfigSchema, diesel::result::Error> {
    let schema_id = ids::schema_id(service_name, version);

    let existing: Option<ConfigSchema> = config_schemas::table
        .find(&schema_id)
        .first(conn)
        .optional()?;

    match existing {
        Some(row) if row.json_schema == json_schema => Ok(row),
        Some(row) => {
            // A changed local copy of a mirrored schema is out of sync until
            // the reconciler re-mirrors it.
            let mut update = UpdateConfigSchema {
                json_schema: Some(json_schema.to_string()),
                ..Default::default()
            };
            if row.sync_status() == Some(SyncStatus::Synced) {
                update.sync_status = Some(SyncStatus::OutOfSync.as_str().to_string());
            }
            diesel::update(config_schemas::table.find(&schema_id))
                .set(&update)
                .returning(ConfigSchema::as_returning())
                .get_result(conn)
        }
        None => {
            let new_schema = NewConfigSchema::new(
                service_name.to_string(),
                version.to_string(),
                json_schema.to_string(),
            );
            diesel::insert_into(config_schemas::table)
                .values(&new_schema)
                .returning(ConfigSchema::as_returning())
                .get_result(conn)
        }
    }
}

/// Upsert a `ServiceModule` by its deterministic id inside an open
/// transaction.
fn upsert_module(
    conn: &mut PgConnection,
    registration: &ModuleRegistration,
    config_schema_id: Option<String>,
) -> Result<ServiceModule, diesel::result::Error> {
    let service_id = ids::service_id(
        &registration.service_name,
        &registration.host,
        registration.port,
    );
    let metadata = metadata_to_json(&registration.metadata);

    let existing: Option<ServiceModule> =
        modules::table.find(&service_id).first(conn).optional()?;

    match existing {
        Some(module) => {
            let mut update = UpdateServiceModule::heartbeat();
            if module.version != registration.version {
                update.version = Some(registration.version.clone());
            }
            if module.metadata != metadata {
                update.metadata = Some(metadata);
            }
            if config_schema_id.is_some() && module.config_schema_id != config_schema_id {
                update.config_schema_id = Some(config_schema_id);
            }
            diesel::update(modules::table.find(&service_id))
                .set(&update)
                .returning(ServiceModule::as_returning())
                .get_result(conn)
        }
        None => {
            let new_module = NewServiceModule::new(
                registration.service_name.clone(),
                registration.host.clone(),
                registration.port,
                registration.version.clone(),
            )
            .with_metadata(metadata)
            .with_config_schema(config_schema_id);

            diesel::insert_into(modules::table)
                .values(&new_module)
                .returning(ServiceModule::as_returning())
                .get_result(conn)
        }
    }
}

enum SyncApply {
    Applied,
    SkippedInvalid { current: String },
    Missing,
}

fn apply_sync_transition(
    conn: &mut PgConnection,
    schema_id: &str,
    next: SyncStatus,
    update: UpdateConfigSchema,
) -> Result<SyncApply, diesel::result::Error> {
    let row: Option<ConfigSchema> = config_schemas::table
        .find(schema_id)
        .first(conn)
        .optional()?;

    let Some(row) = row else {
        return Ok(SyncApply::Missing);
    };

    let allowed = match row.sync_status() {
        Some(current) => current == next || current.can_transition_to(next),
        // An unreadable status is repaired by whatever the caller recorded.
        None => true,
    };
    if !allowed {
        return Ok(SyncApply::SkippedInvalid {
            current: row.sync_status,
        });
    }

    diesel::update(config_schemas::table.find(schema_id))
        .set(&update)
        .execute(conn)?;
    Ok(SyncApply::Applied)
}

impl PostgresRegistryStore {
    async fn record_sync_outcome(
        &self,
        schema_id: &str,
        next: SyncStatus,
        update: UpdateConfigSchema,
    ) -> Result<(), StoreError> {
        let mut conn = self.pool.get()?;
        let schema_id_owned = schema_id.to_string();

        let outcome = tokio::task::spawn_blocking(move || {
            apply_sync_transition(&mut conn, &schema_id_owned, next, update)
        })
        .await
        .map_err(join_error)??;

        match outcome {
            SyncApply::Applied => Ok(()),
            SyncApply::SkippedInvalid { current } => {
                warn!(
                    schema_id,
                    current = %current,
                    next = next.as_str(),
                    "Refusing sync-state transition outside the state machine"
                );
                Ok(())
            }
            SyncApply::Missing => Err(StoreError::SchemaNotFound {
                schema_id: schema_id.to_string(),
            }),
        }
    }
}

#[async_trait]
impl RegistryStore for PostgresRegistryStore {
    async fn register_module(
        &self,
        registration: ModuleRegistration,
    ) -> Result<ServiceModule, StoreError> {
        let mut conn = self.pool.get()?;

        let module = tokio::task::spawn_blocking(move || {
            conn.transaction::<ServiceModule, diesel::result::Error, _>(|conn| {
                let schema_id = match registration
                    .json_schema
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
                {
                    Some(json) => Some(
                        upsert_schema(conn, &registration.service_name, &registration.version, json)?
                            .schema_id,
                    ),
                    None => None,
                };
                upsert_module(conn, &registration, schema_id)
            })
        })
        .await
        .map_err(join_error)??;

        Ok(module)
    }

    async fn save_schema(
        &self,
        service_name: &str,
        version: &str,
        json_schema: &str,
    ) -> Result<ConfigSchema, StoreError> {
        let mut conn = self.pool.get()?;
        let name = service_name.to_string();
        let ver = version.to_string();
        let json = json_schema.to_string();

        let row = tokio::task::spawn_blocking(move || {
            conn.transaction::<ConfigSchema, diesel::result::Error, _>(|conn| {
                upsert_schema(conn, &name, &ver, &json)
            })
        })
        .await
        .map_err(join_error)??;

        match self
            .artifacts
            .create_or_update(service_name, version, json_schema)
            .await
        {
            Ok(artifact) => {
                self.mark_schema_synced(&row.schema_id, &artifact).await?;
            }
            Err(e) => {
                warn!(
                    schema_id = %row.schema_id,
                    "Artifact registry mirror failed, schema kept locally: {}", e
                );
                self.mark_schema_sync_failed(&row.schema_id, &e.to_string())
                    .await?;
            }
        }

        self.find_schema_by_id(&row.schema_id)
            .await?
            .ok_or(StoreError::SchemaNotFound {
                schema_id: row.schema_id,
            })
    }

    async fn update_heartbeat(&self, service_id: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.get()?;
        let id = service_id.to_string();

        let updated = tokio::task::spawn_blocking(move || {
            diesel::update(modules::table.find(&id))
                .set(&UpdateServiceModule::heartbeat())
                .execute(&mut conn)
        })
        .await
        .map_err(join_error)??;

        if updated == 0 {
            return Err(StoreError::ModuleNotFound {
                service_id: service_id.to_string(),
            });
        }
        Ok(())
    }

    async fn mark_unhealthy(&self, service_id: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.get()?;
        let id = service_id.to_string();

        let updated = tokio::task::spawn_blocking(move || {
            diesel::update(modules::table.find(&id))
                .set(&UpdateServiceModule::set_status(ServiceStatus::Unhealthy))
                .execute(&mut conn)
        })
        .await
        .map_err(join_error)??;

        if updated == 0 {
            return Err(StoreError::ModuleNotFound {
                service_id: service_id.to_string(),
            });
        }
        Ok(())
    }

    async fn unregister_module(&self, service_id: &str) -> Result<bool, StoreError> {
        let mut conn = self.pool.get()?;
        let id = service_id.to_string();

        let deleted = tokio::task::spawn_blocking(move || {
            conn.transaction::<usize, diesel::result::Error, _>(|conn| {
                diesel::delete(modules::table.find(&id)).execute(conn)
            })
        })
        .await
        .map_err(join_error)??;

        if deleted > 0 {
            info!(service_id, "Deleted module row");
        }
        Ok(deleted > 0)
    }

    async fn get_active_services(&self) -> Result<Vec<ServiceModule>, StoreError> {
        use crate::db::schema::modules::dsl;

        let mut conn = self.pool.get()?;
        let services = tokio::task::spawn_blocking(move || {
            dsl::modules
                .filter(dsl::status.eq(ServiceStatus::Active.as_str()))
                .order(dsl::last_heartbeat.desc())
                .load::<ServiceModule>(&mut conn)
        })
        .await
        .map_err(join_error)??;

        Ok(services)
    }

    async fn get_all_services(&self) -> Result<Vec<ServiceModule>, StoreError> {
        use crate::db::schema::modules::dsl;

        let mut conn = self.pool.get()?;
        let services = tokio::task::spawn_blocking(move || {
            dsl::modules
                .order(dsl::service_name.asc())
                .load::<ServiceModule>(&mut conn)
        })
        .await
        .map_err(join_error)??;

        Ok(services)
    }

    async fn find_stale_services(&self) -> Result<Vec<ServiceModule>, StoreError> {
        use crate::db::schema::modules::dsl;

        let cutoff = Utc::now() - Duration::seconds(HEARTBEAT_STALE_SECONDS);
        let mut conn = self.pool.get()?;

        let services = tokio::task::spawn_blocking(move || {
            dsl::modules
                .filter(
                    dsl::status
                        .eq(ServiceStatus::Active.as_str())
                        .and(dsl::last_heartbeat.lt(cutoff)),
                )
                .load::<ServiceModule>(&mut conn)
        })
        .await
        .map_err(join_error)??;

        Ok(services)
    }

    async fn find_by_id(&self, service_id: &str) -> Result<Option<ServiceModule>, StoreError> {
        let mut conn = self.pool.get()?;
        let id = service_id.to_string();

        let module = tokio::task::spawn_blocking(move || {
            modules::table.find(&id).first(&mut conn).optional()
        })
        .await
        .map_err(join_error)??;

        Ok(module)
    }

    async fn find_schema_by_id(
        &self,
        schema_id: &str,
    ) -> Result<Option<ConfigSchema>, StoreError> {
        let mut conn = self.pool.get()?;
        let id = schema_id.to_string();

        let schema = tokio::task::spawn_blocking(move || {
            config_schemas::table.find(&id).first(&mut conn).optional()
        })
        .await
        .map_err(join_error)??;

        Ok(schema)
    }

    async fn find_latest_schema_by_service_name(
        &self,
        service_name: &str,
    ) -> Result<Option<ConfigSchema>, StoreError> {
        use crate::db::schema::config_schemas::dsl;

        let mut conn = self.pool.get()?;
        let name = service_name.to_string();

        let schema = tokio::task::spawn_blocking(move || {
            dsl::config_schemas
                .filter(dsl::service_name.eq(name))
                .order(dsl::created_at.desc())
                .first(&mut conn)
                .optional()
        })
        .await
        .map_err(join_error)??;

        Ok(schema)
    }

    async fn find_schemas_needing_sync(&self) -> Result<Vec<ConfigSchema>, StoreError> {
        use crate::db::schema::config_schemas::dsl;

        let mut conn = self.pool.get()?;
        let pending = [
            SyncStatus::Pending.as_str(),
            SyncStatus::Failed.as_str(),
            SyncStatus::OutOfSync.as_str(),
        ];

        let schemas = tokio::task::spawn_blocking(move || {
            dsl::config_schemas
                .filter(dsl::sync_status.eq_any(pending))
                .order(dsl::created_at.asc())
                .load::<ConfigSchema>(&mut conn)
        })
        .await
        .map_err(join_error)??;

        Ok(schemas)
    }

    async fn mark_schema_synced(
        &self,
        schema_id: &str,
        artifact: &ArtifactRef,
    ) -> Result<(), StoreError> {
        self.record_sync_outcome(
            schema_id,
            SyncStatus::Synced,
            UpdateConfigSchema::synced(artifact.artifact_id.clone(), artifact.global_id),
        )
        .await
    }

    async fn mark_schema_sync_failed(
        &self,
        schema_id: &str,
        error: &str,
    ) -> Result<(), StoreError> {
        self.record_sync_outcome(
            schema_id,
            SyncStatus::Failed,
            UpdateConfigSchema::sync_failed(error.to_string()),
        )
        .await
    }

    async fn count_services_by_status(&self) -> Result<HashMap<String, i64>, StoreError> {
        use crate::db::schema::modules::dsl;

        let mut conn = self.pool.get()?;
        let counts: Vec<(String, i64)> = tokio::task::spawn_blocking(move || {
            dsl::modules
                .group_by(dsl::status)
                .select((dsl::status, diesel::dsl::count_star()))
                .load(&mut conn)
        })
        .await
        .map_err(join_error)??;

        Ok(counts.into_iter().collect())
    }
}
