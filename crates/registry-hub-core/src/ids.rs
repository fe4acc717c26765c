//! Deterministic identifier derivation.
//!
//! All three authorities are keyed by pure functions of the registration
//! coordinates, so re-registering the same `(name, host, port)` or
//! `(name, version)` always lands on the same row, catalog entry and
//! artifact:
//!
//! - service id: `{name}-{host with '.' -> '-'}-{port}`
//! - schema id: `{name}-v{version with '.' -> '_'}`
//! - artifact id: `{name}-config-v{version with '.' -> '_'}`, version `1`
//!   when blank

use crate::error::HubError;

/// Fixed artifact group under which all configuration schemas are registered.
pub const ARTIFACT_GROUP: &str = "ai.pipestream.schemas";

/// Derive the discovery/store identifier for a service instance.
pub fn service_id(service_name: &str, host: &str, port: i32) -> String {
    format!("{}-{}-{}", service_name, host.replace('.', "-"), port)
}

/// Derive the store identifier for a configuration schema.
pub fn schema_id(service_name: &str, version: &str) -> String {
    format!("{}-v{}", service_name, version.replace('.', "_"))
}

/// Derive the artifact-registry identifier for a configuration schema.
///
/// A blank version collapses to `1`, matching the registry's default first
/// version.
pub fn artifact_id(service_name: &str, version: &str) -> String {
    let version = if version.trim().is_empty() {
        "1".to_string()
    } else {
        version.replace('.', "_")
    };
    format!("{}-config-v{}", service_name, version)
}

/// Extract the service name back out of a service id by splitting on the
/// last two `-` boundaries (the port and the final host token).
///
/// Ids with fewer than two `-` separators are rejected.
pub fn service_name_from_id(service_id: &str) -> Result<String, HubError> {
    let mut parts = service_id.rsplitn(3, '-');
    let port = parts.next();
    let host_tail = parts.next();
    let name = parts.next();

    match (name, host_tail, port) {
        (Some(name), Some(_), Some(_)) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(HubError::invalid_argument(format!(
            "Invalid service ID format: {}",
            service_id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_id_replaces_dots() {
        assert_eq!(service_id("orders", "10.0.0.4", 9090), "orders-10-0-0-4-9090");
        assert_eq!(service_id("splitter", "localhost", 7000), "splitter-localhost-7000");
    }

    #[test]
    fn test_service_id_is_stable() {
        let a = service_id("orders", "10.0.0.4", 9090);
        let b = service_id("orders", "10.0.0.4", 9090);
        assert_eq!(a, b);
    }

    #[test]
    fn test_schema_id_replaces_dots_with_underscores() {
        assert_eq!(schema_id("splitter", "1.0.0"), "splitter-v1_0_0");
        assert_eq!(schema_id("orders", "2"), "orders-v2");
    }

    #[test]
    fn test_artifact_id_defaults_blank_version() {
        assert_eq!(artifact_id("orders", ""), "orders-config-v1");
        assert_eq!(artifact_id("orders", "  "), "orders-config-v1");
        assert_eq!(artifact_id("orders", "1.2.0"), "orders-config-v1_2_0");
    }

    #[test]
    fn test_service_name_extraction() {
        assert_eq!(
            service_name_from_id("splitter-localhost-7000").unwrap(),
            "splitter"
        );
        // Dotted hosts leave their dash-encoded tail on the name; the
        // extraction contract is fixed at the last two separators.
        assert_eq!(
            service_name_from_id("orders-10-0-0-4-9090").unwrap(),
            "orders-10-0-0"
        );
    }

    #[test]
    fn test_malformed_service_id_rejected() {
        let err = service_name_from_id("bad-id").unwrap_err();
        assert!(err.to_string().contains("Invalid service ID format: bad-id"));
        assert!(service_name_from_id("noseparators").is_err());
        assert!(service_name_from_id("").is_err());
    }
}
