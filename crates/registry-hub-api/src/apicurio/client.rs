//! Client for the external artifact registry.
//!
//! The registry transport is blocking, so every call is pushed onto the
//! blocking worker pool; nothing here may run on the reactive I/O threads.
//! Creates use `ifExists=FIND_OR_CREATE_VERSION`, which makes them
//! idempotent: identical content for the same `(artifactId, version)` lands
//! on the existing version, new content creates a new version under the same
//! artifact id.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use registry_hub_core::{ids, HubError};

/// Errors from the artifact registry.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Artifact registry request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Artifact registry returned {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Artifact not found: {artifact_id}")]
    ArtifactNotFound { artifact_id: String },

    #[error("Artifact registry response could not be decoded: {message}")]
    Decode { message: String },

    #[error("Artifact registry worker failed: {message}")]
    Worker { message: String },
}

impl From<ArtifactError> for HubError {
    fn from(err: ArtifactError) -> Self {
        HubError::Artifact {
            message: err.to_string(),
        }
    }
}

/// Coordinates of a mirrored artifact version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub artifact_id: String,
    pub global_id: i64,
    pub version: String,
}

/// Artifact-level metadata as reported by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    #[serde(rename = "artifactId")]
    pub artifact_id: String,
    #[serde(rename = "artifactType", default)]
    pub artifact_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "createdOn", default)]
    pub created_on: Option<String>,
    #[serde(rename = "modifiedOn", default)]
    pub modified_on: Option<String>,
}

/// Operations against the artifact registry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactRegistryClient: Send + Sync {
    /// Create or update the configuration artifact for a service version.
    async fn create_or_update(
        &self,
        service_name: &str,
        version: &str,
        json_schema: &str,
    ) -> Result<ArtifactRef, ArtifactError>;

    /// Fetch the schema content; version `"latest"` resolves the highest
    /// version.
    async fn get_schema(&self, service_name: &str, version: &str) -> Result<String, ArtifactError>;

    /// Artifact-level metadata, `None` when the artifact does not exist.
    async fn get_artifact_metadata(
        &self,
        service_name: &str,
    ) -> Result<Option<ArtifactMetadata>, ArtifactError>;

    /// Enumerate artifact ids in the configuration group, for
    /// reconciliation.
    async fn list_artifacts(&self) -> Result<Vec<String>, ArtifactError>;

    /// Delete the configuration artifact; `false` when it was absent.
    async fn delete_artifact(&self, service_name: &str) -> Result<bool, ArtifactError>;

    /// Readiness probe; any failure reads as unhealthy.
    async fn is_healthy(&self) -> bool;
}

/// Blocking-transport Apicurio client.
#[derive(Clone)]
pub struct ApicurioClient {
    base_url: String,
    http: Arc<reqwest::blocking::Client>,
}

impl ApicurioClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Arc::new(reqwest::blocking::Client::new()),
        }
    }

    fn group_url(&self) -> String {
        format!("{}/groups/{}", self.base_url, ids::ARTIFACT_GROUP)
    }

    async fn run_blocking<T, F>(&self, operation: F) -> Result<T, ArtifactError>
    where
        T: Send + 'static,
        F: FnOnce(Arc<reqwest::blocking::Client>, String) -> Result<T, ArtifactError>
            + Send
            + 'static,
    {
        let http = Arc::clone(&self.http);
        let group_url = self.group_url();
        tokio::task::spawn_blocking(move || operation(http, group_url))
            .await
            .map_err(|e| ArtifactError::Worker {
                message: e.to_string(),
            })?
    }
}

fn effective_version(version: &str) -> String {
    if version.trim().is_empty() {
        "1".to_string()
    } else {
        version.to_string()
    }
}

#[async_trait]
impl ArtifactRegistryClient for ApicurioClient {
    async fn create_or_update(
        &self,
        service_name: &str,
        version: &str,
        json_schema: &str,
    ) -> Result<ArtifactRef, ArtifactError> {
        let artifact_id = ids::artifact_id(service_name, version);
        let artifact_version = effective_version(version);
        let content = json_schema.to_string();

        let result = self
            .run_blocking(move |http, group_url| {
                let body = json!({
                    "artifactId": artifact_id.clone(),
                    "artifactType": "JSON",
                    "firstVersion": {
                        "content": {
                            "content": content,
                            "contentType": "application/json"
                        },
                        "version": artifact_version
                    }
                });

                let response = http
                    .post(format!("{}/artifacts", group_url))
                    .query(&[("ifExists", "FIND_OR_CREATE_VERSION")])
                    .json(&body)
                    .send()?;

                let status = response.status();
                if !status.is_success() {
                    return Err(ArtifactError::UnexpectedStatus {
                        status: status.as_u16(),
                        body: response.text().unwrap_or_default(),
                    });
                }

                let payload: serde_json::Value = response.json()?;
                let version_info = payload.get("version").unwrap_or(&serde_json::Value::Null);
                let global_id = version_info
                    .get("globalId")
                    .and_then(|v| v.as_i64())
                    .ok_or_else(|| ArtifactError::Decode {
                        message: "missing version.globalId in create response".to_string(),
                    })?;
                let created_version = version_info
                    .get("version")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();

                Ok(ArtifactRef {
                    artifact_id,
                    global_id,
                    version: created_version,
                })
            })
            .await?;

        debug!(
            artifact_id = %result.artifact_id,
            global_id = result.global_id,
            "Mirrored configuration schema to artifact registry"
        );
        Ok(result)
    }

    async fn get_schema(&self, service_name: &str, version: &str) -> Result<String, ArtifactError> {
        // Version-less lookups land on the default artifact id and let the
        // registry resolve its highest version.
        let versionless = version.trim().is_empty() || version == "latest";
        let artifact_id = if versionless {
            ids::artifact_id(service_name, "")
        } else {
            ids::artifact_id(service_name, version)
        };
        let resolve_version = if versionless {
            "latest".to_string()
        } else {
            effective_version(version)
        };

        self.run_blocking(move |http, group_url| {
            let response = http
                .get(format!(
                    "{}/artifacts/{}/versions/{}/content",
                    group_url, artifact_id, resolve_version
                ))
                .send()?;

            let status = response.status();
            if status.as_u16() == 404 {
                return Err(ArtifactError::ArtifactNotFound { artifact_id });
            }
            if !status.is_success() {
                return Err(ArtifactError::UnexpectedStatus {
                    status: status.as_u16(),
                    body: response.text().unwrap_or_default(),
                });
            }

            Ok(response.text()?)
        })
        .await
    }

    async fn get_artifact_metadata(
        &self,
        service_name: &str,
    ) -> Result<Option<ArtifactMetadata>, ArtifactError> {
        let artifact_id = ids::artifact_id(service_name, "");

        self.run_blocking(move |http, group_url| {
            let response = http
                .get(format!("{}/artifacts/{}", group_url, artifact_id))
                .send()?;

            let status = response.status();
            if status.as_u16() == 404 {
                return Ok(None);
            }
            if !status.is_success() {
                return Err(ArtifactError::UnexpectedStatus {
                    status: status.as_u16(),
                    body: response.text().unwrap_or_default(),
                });
            }

            let metadata: ArtifactMetadata =
                response.json().map_err(|e| ArtifactError::Decode {
                    message: e.to_string(),
                })?;
            Ok(Some(metadata))
        })
        .await
    }

    async fn list_artifacts(&self) -> Result<Vec<String>, ArtifactError> {
        self.run_blocking(move |http, group_url| {
            let response = http
                .get(format!("{}/artifacts", group_url))
                .query(&[("limit", "500")])
                .send()?;

            let status = response.status();
            if !status.is_success() {
                return Err(ArtifactError::UnexpectedStatus {
                    status: status.as_u16(),
                    body: response.text().unwrap_or_default(),
                });
            }

            let payload: serde_json::Value = response.json()?;
            let ids = payload
                .get("artifacts")
                .and_then(|a| a.as_array())
                .map(|entries| {
                    entries
                        .iter()
                        .filter_map(|e| e.get("artifactId").and_then(|v| v.as_str()))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            Ok(ids)
        })
        .await
    }

    async fn delete_artifact(&self, service_name: &str) -> Result<bool, ArtifactError> {
        let artifact_id = ids::artifact_id(service_name, "");

        self.run_blocking(move |http, group_url| {
            let response = http
                .delete(format!("{}/artifacts/{}", group_url, artifact_id))
                .send()?;

            let status = response.status();
            if status.as_u16() == 404 {
                return Ok(false);
            }
            if !status.is_success() {
                return Err(ArtifactError::UnexpectedStatus {
                    status: status.as_u16(),
                    body: response.text().unwrap_or_default(),
                });
            }
            Ok(true)
        })
        .await
    }

    async fn is_healthy(&self) -> bool {
        let http = Arc::clone(&self.http);
        let url = format!("{}/system/info", self.base_url);

        let probe = tokio::task::spawn_blocking(move || {
            http.get(url)
                .send()
                .map(|response| response.status().is_success())
        })
        .await;

        match probe {
            Ok(Ok(healthy)) => healthy,
            Ok(Err(e)) => {
                warn!("Artifact registry health probe failed: {}", e);
                false
            }
            Err(e) => {
                warn!("Artifact registry health probe worker failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_version_defaults_blank() {
        assert_eq!(effective_version(""), "1");
        assert_eq!(effective_version("   "), "1");
        assert_eq!(effective_version("1.2.0"), "1.2.0");
    }

    #[test]
    fn test_group_url_uses_fixed_group() {
        let client = ApicurioClient::new("http://apicurio:8080/apis/registry/v3/");
        assert_eq!(
            client.group_url(),
            "http://apicurio:8080/apis/registry/v3/groups/ai.pipestream.schemas"
        );
    }
}
