//! Aggregate readiness over the hub's three backends.
//!
//! Each probe gets a 2 s deadline; the hub is UP only when the store, the
//! discovery agent and the artifact registry all answer in time.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use diesel::RunQueryDsl;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::apicurio::ArtifactRegistryClient;
use crate::db::session::DbPool;
use crate::discovery::client::DiscoveryClient;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

const STATUS_UP: &str = "UP";
const STATUS_DOWN: &str = "DOWN";

/// One backend's probe outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub status: String,
    pub error: Option<String>,
}

impl ComponentStatus {
    fn up() -> Self {
        Self {
            status: STATUS_UP.to_string(),
            error: None,
        }
    }

    fn down(error: impl Into<String>) -> Self {
        Self {
            status: STATUS_DOWN.to_string(),
            error: Some(error.into()),
        }
    }

    pub fn is_up(&self) -> bool {
        self.status == STATUS_UP
    }
}

/// Aggregate readiness report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessReport {
    pub status: String,
    pub components: HashMap<String, ComponentStatus>,
}

impl ReadinessReport {
    pub fn is_up(&self) -> bool {
        self.status == STATUS_UP
    }
}

/// Probes the store pool, the discovery agent and the artifact registry.
pub struct ReadinessService {
    pool: DbPool,
    discovery: Arc<dyn DiscoveryClient>,
    artifacts: Arc<dyn ArtifactRegistryClient>,
}

impl ReadinessService {
    pub fn new(
        pool: DbPool,
        discovery: Arc<dyn DiscoveryClient>,
        artifacts: Arc<dyn ArtifactRegistryClient>,
    ) -> Self {
        Self {
            pool,
            discovery,
            artifacts,
        }
    }

    pub async fn check(&self) -> ReadinessReport {
        let (database, discovery, artifacts) = tokio::join!(
            self.check_database(),
            self.check_discovery(),
            self.check_artifacts()
        );

        let all_up = database.is_up() && discovery.is_up() && artifacts.is_up();
        ReadinessReport {
            status: if all_up { STATUS_UP } else { STATUS_DOWN }.to_string(),
            components: HashMap::from([
                ("database".to_string(), database),
                ("consul".to_string(), discovery),
                ("apicurio".to_string(), artifacts),
            ]),
        }
    }

    async fn check_database(&self) -> ComponentStatus {
        let pool = self.pool.clone();
        let probe = timeout(
            PROBE_TIMEOUT,
            tokio::task::spawn_blocking(move || {
                let mut conn = pool.get().map_err(|e| e.to_string())?;
                diesel::sql_query("SELECT 1")
                    .execute(&mut conn)
                    .map_err(|e| e.to_string())?;
                Ok::<(), String>(())
            }),
        )
        .await;

        match probe {
            Ok(Ok(Ok(()))) => ComponentStatus::up(),
            Ok(Ok(Err(e))) => ComponentStatus::down(e),
            Ok(Err(e)) => ComponentStatus::down(format!("probe worker failed: {}", e)),
            Err(_) => ComponentStatus::down("probe timed out"),
        }
    }

    async fn check_discovery(&self) -> ComponentStatus {
        match timeout(PROBE_TIMEOUT, self.discovery.agent_info()).await {
            Ok(Ok(())) => ComponentStatus::up(),
            Ok(Err(e)) => ComponentStatus::down(e.to_string()),
            Err(_) => ComponentStatus::down("probe timed out"),
        }
    }

    async fn check_artifacts(&self) -> ComponentStatus {
        match timeout(PROBE_TIMEOUT, self.artifacts.is_healthy()).await {
            Ok(true) => ComponentStatus::up(),
            Ok(false) => ComponentStatus::down("artifact registry reported unhealthy"),
            Err(_) => ComponentStatus::down("probe timed out"),
        }
    }
}
