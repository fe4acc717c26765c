//! Wire payloads of the lifecycle events.
//!
//! Records are protobuf-encoded; field numbers are part of the downstream
//! contract and must not be reordered. Timestamps are milliseconds since the
//! Unix epoch.

/// Emitted once per successfully completed service registration.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServiceRegistered {
    #[prost(string, tag = "1")]
    pub service_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub service_name: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub host: ::prost::alloc::string::String,
    #[prost(int32, tag = "4")]
    pub port: i32,
    #[prost(string, tag = "5")]
    pub version: ::prost::alloc::string::String,
    #[prost(int64, tag = "6")]
    pub timestamp: i64,
}

/// Emitted once per successful service unregistration.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServiceUnregistered {
    #[prost(string, tag = "1")]
    pub service_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub service_name: ::prost::alloc::string::String,
    #[prost(int64, tag = "3")]
    pub timestamp: i64,
}

/// Emitted once per successfully completed module registration.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModuleRegistered {
    #[prost(string, tag = "1")]
    pub service_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub module_name: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub host: ::prost::alloc::string::String,
    #[prost(int32, tag = "4")]
    pub port: i32,
    #[prost(string, tag = "5")]
    pub version: ::prost::alloc::string::String,
    #[prost(string, tag = "6")]
    pub schema_id: ::prost::alloc::string::String,
    #[prost(string, tag = "7")]
    pub artifact_id: ::prost::alloc::string::String,
    #[prost(int64, tag = "8")]
    pub timestamp: i64,
}

/// Emitted once per successful module unregistration.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModuleUnregistered {
    #[prost(string, tag = "1")]
    pub service_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub module_name: ::prost::alloc::string::String,
    #[prost(int64, tag = "3")]
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_service_registered_round_trip() {
        let event = ServiceRegistered {
            service_id: "orders-10-0-0-4-9090".to_string(),
            service_name: "orders".to_string(),
            host: "10.0.0.4".to_string(),
            port: 9090,
            version: "1.2.0".to_string(),
            timestamp: 1_700_000_000_000,
        };

        let bytes = event.encode_to_vec();
        assert!(!bytes.is_empty());

        let decoded = ServiceRegistered::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_module_registered_allows_empty_artifact_id() {
        let event = ModuleRegistered {
            service_id: "splitter-localhost-7000".to_string(),
            module_name: "splitter".to_string(),
            host: "localhost".to_string(),
            port: 7000,
            version: "1.0.0".to_string(),
            schema_id: "splitter-v1_0_0".to_string(),
            artifact_id: String::new(),
            timestamp: 1_700_000_000_000,
        };

        let decoded = ModuleRegistered::decode(event.encode_to_vec().as_slice()).unwrap();
        assert!(decoded.artifact_id.is_empty());
        assert_eq!(decoded.schema_id, "splitter-v1_0_0");
    }
}
