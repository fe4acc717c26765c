//! Dynamic stub to call back into a registering module.
//!
//! The orchestrator only needs one operation from a module: fetching its
//! self-reported registration metadata. The stub factory is a collaborator
//! seam; the default implementation resolves the module through the
//! discovery agent and queries it over HTTP.

use std::sync::Arc;

use async_trait::async_trait;

use registry_hub_core::requests::ServiceRegistrationMetadata;
use registry_hub_core::HubError;

use crate::discovery::client::DiscoveryClient;

/// A live connection to one module instance.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModuleStub: Send + Sync {
    async fn get_service_registration(&self) -> Result<ServiceRegistrationMetadata, HubError>;
}

/// Opens stubs by module name.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModuleStubFactory: Send + Sync {
    async fn open_stub(&self, module_name: &str) -> Result<Box<dyn ModuleStub>, HubError>;
}

/// Default factory: resolve the module through the discovery agent and talk
/// to the first healthy instance.
pub struct HttpModuleStubFactory {
    discovery: Arc<dyn DiscoveryClient>,
    http: reqwest::Client,
}

impl HttpModuleStubFactory {
    pub fn new(discovery: Arc<dyn DiscoveryClient>) -> Self {
        Self {
            discovery,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ModuleStubFactory for HttpModuleStubFactory {
    async fn open_stub(&self, module_name: &str) -> Result<Box<dyn ModuleStub>, HubError> {
        let nodes = self.discovery.healthy_nodes(module_name).await?;
        let entry = nodes.into_iter().next().ok_or_else(|| {
            HubError::module_call(format!(
                "No healthy instance of module {} to query",
                module_name
            ))
        })?;

        Ok(Box::new(HttpModuleStub {
            endpoint: format!("http://{}:{}", entry.address, entry.port),
            http: self.http.clone(),
        }))
    }
}

struct HttpModuleStub {
    endpoint: String,
    http: reqwest::Client,
}

#[async_trait]
impl ModuleStub for HttpModuleStub {
    async fn get_service_registration(&self) -> Result<ServiceRegistrationMetadata, HubError> {
        let response = self
            .http
            .get(format!("{}/service-registration", self.endpoint))
            .send()
            .await
            .map_err(|e| HubError::module_call(format!("Module call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HubError::module_call(format!(
                "Module returned {} from {}",
                status, self.endpoint
            )));
        }

        response
            .json()
            .await
            .map_err(|e| HubError::module_call(format!("Module metadata malformed: {}", e)))
    }
}
