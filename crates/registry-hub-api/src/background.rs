//! Background maintenance loops.
//!
//! Two periodic tasks keep the registry converged with the outside world:
//! the stale scan marks ACTIVE modules whose heartbeat lapsed as UNHEALTHY,
//! and the sync replay re-mirrors schemas stuck in PENDING, FAILED or
//! OUT_OF_SYNC into the artifact registry.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info};

use crate::apicurio::ArtifactRegistryClient;
use crate::db::store::{RegistryStore, StoreError};

/// Background task configuration
#[derive(Debug, Clone)]
pub struct BackgroundTaskConfig {
    /// How often to run the stale scan (in seconds)
    pub stale_scan_interval_seconds: u64,
    /// How often to replay pending schema syncs (in seconds)
    pub sync_replay_interval_seconds: u64,
}

impl Default for BackgroundTaskConfig {
    fn default() -> Self {
        Self {
            stale_scan_interval_seconds: 60,
            sync_replay_interval_seconds: 120,
        }
    }
}

/// Maintenance task runner for the registry.
pub struct HubBackgroundTasks {
    store: Arc<dyn RegistryStore>,
    artifacts: Arc<dyn ArtifactRegistryClient>,
    config: BackgroundTaskConfig,
}

impl HubBackgroundTasks {
    pub fn new(
        store: Arc<dyn RegistryStore>,
        artifacts: Arc<dyn ArtifactRegistryClient>,
        config: BackgroundTaskConfig,
    ) -> Self {
        Self {
            store,
            artifacts,
            config,
        }
    }

    /// Start both maintenance loops.
    pub fn start(&self) {
        self.start_stale_scan();
        self.start_sync_replay();
    }

    fn start_stale_scan(&self) {
        let store = Arc::clone(&self.store);
        let interval = self.config.stale_scan_interval_seconds;

        tokio::spawn(async move {
            loop {
                match run_stale_scan_once(store.as_ref()).await {
                    Ok(count) if count > 0 => {
                        info!("Marked {} stale modules as unhealthy", count);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("Stale scan failed: {}", e);
                    }
                }
                sleep(Duration::from_secs(interval)).await;
            }
        });

        info!(
            "Started stale scan task (interval: {}s)",
            self.config.stale_scan_interval_seconds
        );
    }

    fn start_sync_replay(&self) {
        let store = Arc::clone(&self.store);
        let artifacts = Arc::clone(&self.artifacts);
        let interval = self.config.sync_replay_interval_seconds;

        tokio::spawn(async move {
            loop {
                match run_sync_replay_once(store.as_ref(), artifacts.as_ref()).await {
                    Ok(count) if count > 0 => {
                        info!("Re-mirrored {} configuration schemas", count);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("Schema sync replay failed: {}", e);
                    }
                }
                sleep(Duration::from_secs(interval)).await;
            }
        });

        info!(
            "Started schema sync replay task (interval: {}s)",
            self.config.sync_replay_interval_seconds
        );
    }

    /// Run the stale scan once (for testing or manual trigger).
    pub async fn run_stale_scan_once(&self) -> Result<usize, StoreError> {
        run_stale_scan_once(self.store.as_ref()).await
    }

    /// Run the sync replay once (for testing or manual trigger).
    pub async fn run_sync_replay_once(&self) -> Result<usize, StoreError> {
        run_sync_replay_once(self.store.as_ref(), self.artifacts.as_ref()).await
    }
}

async fn run_stale_scan_once(store: &dyn RegistryStore) -> Result<usize, StoreError> {
    let stale = store.find_stale_services().await?;
    let mut marked = 0;

    for module in &stale {
        match store.mark_unhealthy(&module.service_id).await {
            Ok(()) => marked += 1,
            Err(e) => {
                error!(
                    service_id = %module.service_id,
                    "Failed to mark stale module unhealthy: {}", e
                );
            }
        }
    }
    Ok(marked)
}

async fn run_sync_replay_once(
    store: &dyn RegistryStore,
    artifacts: &dyn ArtifactRegistryClient,
) -> Result<usize, StoreError> {
    let pending = store.find_schemas_needing_sync().await?;
    let mut synced = 0;

    for schema in &pending {
        match artifacts
            .create_or_update(&schema.service_name, &schema.schema_version, &schema.json_schema)
            .await
        {
            Ok(artifact) => {
                store.mark_schema_synced(&schema.schema_id, &artifact).await?;
                synced += 1;
            }
            Err(e) => {
                store
                    .mark_schema_sync_failed(&schema.schema_id, &e.to_string())
                    .await?;
            }
        }
    }
    Ok(synced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::apicurio::client::MockArtifactRegistryClient;
    use crate::apicurio::{ArtifactError, ArtifactRef};
    use crate::db::config_schema::ConfigSchema;
    use crate::db::module::ServiceModule;
    use crate::db::store::MockRegistryStore;

    fn stale_module(service_id: &str) -> ServiceModule {
        ServiceModule {
            service_id: service_id.to_string(),
            service_name: "orders".to_string(),
            host: "10.0.0.4".to_string(),
            port: 9090,
            version: "1.2.0".to_string(),
            config_schema_id: None,
            metadata: serde_json::json!({}),
            registered_at: Utc::now(),
            last_heartbeat: Utc::now() - chrono::Duration::seconds(120),
            status: "ACTIVE".to_string(),
        }
    }

    fn pending_schema(schema_id: &str) -> ConfigSchema {
        ConfigSchema {
            schema_id: schema_id.to_string(),
            service_name: "splitter".to_string(),
            schema_version: "1.0.0".to_string(),
            json_schema: "{}".to_string(),
            created_at: Utc::now(),
            created_by: None,
            artifact_id: None,
            artifact_global_id: None,
            sync_status: "PENDING".to_string(),
            last_sync_attempt: None,
            sync_error: None,
        }
    }

    #[test]
    fn test_default_config() {
        let config = BackgroundTaskConfig::default();
        assert_eq!(config.stale_scan_interval_seconds, 60);
        assert_eq!(config.sync_replay_interval_seconds, 120);
    }

    #[tokio::test]
    async fn test_stale_scan_marks_each_stale_module() {
        let mut store = MockRegistryStore::new();
        store.expect_find_stale_services().returning(|| {
            Ok(vec![
                stale_module("orders-10-0-0-4-9090"),
                stale_module("orders-10-0-0-5-9090"),
            ])
        });
        store.expect_mark_unhealthy().times(2).returning(|_| Ok(()));

        let tasks = HubBackgroundTasks::new(
            Arc::new(store),
            Arc::new(MockArtifactRegistryClient::new()),
            BackgroundTaskConfig::default(),
        );
        assert_eq!(tasks.run_stale_scan_once().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_sync_replay_advances_each_pending_schema() {
        let mut store = MockRegistryStore::new();
        store
            .expect_find_schemas_needing_sync()
            .returning(|| Ok(vec![pending_schema("splitter-v1_0_0")]));
        store
            .expect_mark_schema_synced()
            .times(1)
            .returning(|_, _| Ok(()));
        store.expect_mark_schema_sync_failed().never();

        let mut artifacts = MockArtifactRegistryClient::new();
        artifacts.expect_create_or_update().returning(|_, _, _| {
            Ok(ArtifactRef {
                artifact_id: "splitter-config-v1_0_0".to_string(),
                global_id: 9,
                version: "1.0.0".to_string(),
            })
        });

        let tasks = HubBackgroundTasks::new(
            Arc::new(store),
            Arc::new(artifacts),
            BackgroundTaskConfig::default(),
        );
        assert_eq!(tasks.run_sync_replay_once().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sync_replay_records_failures() {
        let mut store = MockRegistryStore::new();
        store
            .expect_find_schemas_needing_sync()
            .returning(|| Ok(vec![pending_schema("splitter-v1_0_0")]));
        store
            .expect_mark_schema_sync_failed()
            .times(1)
            .returning(|_, _| Ok(()));
        store.expect_mark_schema_synced().never();

        let mut artifacts = MockArtifactRegistryClient::new();
        artifacts.expect_create_or_update().returning(|_, _, _| {
            Err(ArtifactError::UnexpectedStatus {
                status: 503,
                body: "unavailable".to_string(),
            })
        });

        let tasks = HubBackgroundTasks::new(
            Arc::new(store),
            Arc::new(artifacts),
            BackgroundTaskConfig::default(),
        );
        assert_eq!(tasks.run_sync_replay_once().await.unwrap(), 0);
    }
}
