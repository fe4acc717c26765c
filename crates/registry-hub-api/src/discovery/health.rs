//! Health convergence after discovery registration.
//!
//! A freshly registered instance is only useful once the agent's gRPC health
//! check reports it passing. The converger polls the agent until the new
//! instance shows up healthy or the attempt budget runs out.

use std::cmp::min;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use registry_hub_core::ids;

use crate::discovery::client::DiscoveryClient;

const MAX_ATTEMPTS: u32 = 10;
const BASE_DELAY_SECONDS: u64 = 3;
const MAX_DELAY_SECONDS: u64 = 10;

/// Polls the discovery agent until an instance converges to healthy.
pub struct HealthConverger {
    discovery: Arc<dyn DiscoveryClient>,
}

impl HealthConverger {
    pub fn new(discovery: Arc<dyn DiscoveryClient>) -> Self {
        Self { discovery }
    }

    /// Wait for `service_id` to be reported healthy.
    ///
    /// Query errors count as not-yet-healthy and the loop continues; the
    /// sleep between attempts grows linearly from 3 s and caps at 10 s.
    /// Returns `false` once the attempt budget is exhausted, or immediately
    /// for a malformed id.
    pub async fn wait_for_healthy(&self, service_id: &str) -> bool {
        let service_name = match ids::service_name_from_id(service_id) {
            Ok(name) => name,
            Err(e) => {
                error!(service_id, "Cannot wait for health: {}", e);
                return false;
            }
        };

        for attempt in 0..MAX_ATTEMPTS {
            match self.discovery.healthy_nodes(&service_name).await {
                Ok(nodes) => {
                    if nodes.iter().any(|n| n.service_id == service_id) {
                        info!(service_id, attempt, "Instance reported healthy");
                        return true;
                    }
                    debug!(
                        service_id,
                        attempt, "Instance not yet healthy, will retry"
                    );
                }
                Err(e) => {
                    debug!(
                        service_id,
                        attempt, "Health query failed, treating as not yet healthy: {}", e
                    );
                }
            }

            let delay = min(BASE_DELAY_SECONDS + u64::from(attempt), MAX_DELAY_SECONDS);
            tokio::time::sleep(Duration::from_secs(delay)).await;
        }

        error!(
            service_id,
            "Instance never converged to healthy after {} attempts", MAX_ATTEMPTS
        );
        false
    }
}
