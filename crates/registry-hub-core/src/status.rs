//! Lifecycle status enums for the two persisted entities.

use serde::{Deserialize, Serialize};

use crate::error::HubError;

/// Lifecycle status of a registered service module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceStatus {
    Active,
    Inactive,
    Unhealthy,
    Maintenance,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Active => "ACTIVE",
            ServiceStatus::Inactive => "INACTIVE",
            ServiceStatus::Unhealthy => "UNHEALTHY",
            ServiceStatus::Maintenance => "MAINTENANCE",
        }
    }

    pub fn parse(value: &str) -> Result<Self, HubError> {
        match value {
            "ACTIVE" => Ok(ServiceStatus::Active),
            "INACTIVE" => Ok(ServiceStatus::Inactive),
            "UNHEALTHY" => Ok(ServiceStatus::Unhealthy),
            "MAINTENANCE" => Ok(ServiceStatus::Maintenance),
            other => Err(HubError::invalid_argument(format!(
                "Unknown service status: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mirror state of a configuration schema against the artifact registry.
///
/// The hub itself only drives `Pending -> Synced/Failed` and the reconciler's
/// `Failed/OutOfSync -> Synced/Failed`; `OutOfSync` is set externally when a
/// local copy is edited without re-mirroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Pending,
    Synced,
    Failed,
    OutOfSync,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "PENDING",
            SyncStatus::Synced => "SYNCED",
            SyncStatus::Failed => "FAILED",
            SyncStatus::OutOfSync => "OUT_OF_SYNC",
        }
    }

    pub fn parse(value: &str) -> Result<Self, HubError> {
        match value {
            "PENDING" => Ok(SyncStatus::Pending),
            "SYNCED" => Ok(SyncStatus::Synced),
            "FAILED" => Ok(SyncStatus::Failed),
            "OUT_OF_SYNC" => Ok(SyncStatus::OutOfSync),
            other => Err(HubError::invalid_argument(format!(
                "Unknown sync status: {}",
                other
            ))),
        }
    }

    /// Whether moving to `next` follows the sync-state machine.
    pub fn can_transition_to(&self, next: SyncStatus) -> bool {
        matches!(
            (self, next),
            (SyncStatus::Pending, SyncStatus::Synced)
                | (SyncStatus::Pending, SyncStatus::Failed)
                | (SyncStatus::Synced, SyncStatus::OutOfSync)
                | (SyncStatus::OutOfSync, SyncStatus::Synced)
                | (SyncStatus::OutOfSync, SyncStatus::Failed)
                | (SyncStatus::Failed, SyncStatus::Synced)
                | (SyncStatus::Failed, SyncStatus::Failed)
        )
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_status_round_trip() {
        for status in [
            ServiceStatus::Active,
            ServiceStatus::Inactive,
            ServiceStatus::Unhealthy,
            ServiceStatus::Maintenance,
        ] {
            assert_eq!(ServiceStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(ServiceStatus::parse("RETIRED").is_err());
    }

    #[test]
    fn test_sync_transitions_are_monotone() {
        use SyncStatus::*;

        assert!(Pending.can_transition_to(Synced));
        assert!(Pending.can_transition_to(Failed));
        assert!(Synced.can_transition_to(OutOfSync));
        assert!(OutOfSync.can_transition_to(Synced));
        assert!(OutOfSync.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Synced));
        assert!(Failed.can_transition_to(Failed));

        // No path ever leads back to PENDING, and SYNCED never degrades
        // straight to FAILED.
        assert!(!Synced.can_transition_to(Pending));
        assert!(!Synced.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Pending));
        assert!(!OutOfSync.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(OutOfSync));
    }
}
