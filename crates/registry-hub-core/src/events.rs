//! Registration lifecycle events streamed back to callers.
//!
//! Every stage of a registration emits one event into the caller's stream;
//! failures are delivered as a terminal [`RegistrationEventType::Failed`]
//! event followed by stream completion, never as a transport error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stage markers of the registration state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationEventType {
    Started,
    Validated,
    ConsulRegistered,
    HealthCheckConfigured,
    ConsulHealthy,
    MetadataRetrieved,
    SchemaValidated,
    DatabaseSaved,
    ApicurioRegistered,
    Completed,
    Failed,
}

/// One element of a registration event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationEvent {
    pub event_type: RegistrationEventType,
    pub service_id: Option<String>,
    pub message: String,
    pub error_detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl RegistrationEvent {
    /// A successful stage marker.
    pub fn progress(
        event_type: RegistrationEventType,
        service_id: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            service_id,
            message: message.into(),
            error_detail: None,
            timestamp: Utc::now(),
        }
    }

    /// The terminal failure marker.
    pub fn failed(
        service_id: Option<String>,
        message: impl Into<String>,
        error_detail: impl Into<String>,
    ) -> Self {
        Self {
            event_type: RegistrationEventType::Failed,
            service_id,
            message: message.into(),
            error_detail: Some(error_detail.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.event_type,
            RegistrationEventType::Completed | RegistrationEventType::Failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_event_has_no_error_detail() {
        let event = RegistrationEvent::progress(
            RegistrationEventType::ConsulRegistered,
            Some("orders-10-0-0-4-9090".to_string()),
            "Registered with discovery agent",
        );
        assert_eq!(event.event_type, RegistrationEventType::ConsulRegistered);
        assert!(event.error_detail.is_none());
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_failed_event_is_terminal() {
        let event = RegistrationEvent::failed(
            None,
            "Invalid service registration request",
            "port must be positive",
        );
        assert!(event.is_terminal());
        assert_eq!(
            event.error_detail.as_deref(),
            Some("port must be positive")
        );
    }

    #[test]
    fn test_event_type_serialises_screaming_snake() {
        let json = serde_json::to_string(&RegistrationEventType::ConsulHealthy).unwrap();
        assert_eq!(json, "\"CONSUL_HEALTHY\"");
    }
}
