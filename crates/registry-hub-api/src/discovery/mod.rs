//! Discovery-agent integration: the Consul client, the post-registration
//! health convergence loop and the listing/resolution/watch surface.

pub mod client;
pub mod health;
pub mod surface;

pub use client::{AgentServiceRegistration, CatalogEntry, ConsulDiscoveryClient, DiscoveryClient, DiscoveryError};
pub use health::HealthConverger;
pub use surface::DiscoveryQueryService;
