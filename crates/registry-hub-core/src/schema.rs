//! Synthesis of the default configuration schema.
//!
//! Modules that do not publish their own JSON configuration schema get a
//! permissive OpenAPI 3.1 key-value schema so that every registered module
//! always owns a `ConfigSchema` row.

use serde_json::json;

/// Build the default key-value configuration schema for a module.
pub fn default_config_schema(service_name: &str) -> String {
    let schema = json!({
        "openapi": "3.1.0",
        "info": {
            "title": format!("{} Configuration", service_name),
            "version": "1.0.0"
        },
        "components": {
            "schemas": {
                "Config": {
                    "type": "object",
                    "additionalProperties": { "type": "string" },
                    "description": format!("Key-value configuration for {}", service_name)
                }
            }
        }
    });
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
