//! # PipeStream Registration Hub
//!
//! Long-running registration and discovery service mediating between three
//! authorities:
//!
//! - a PostgreSQL registry (system of record) for registered modules and
//!   their configuration schemas
//! - a Consul agent performing liveness probing over gRPC health checks
//! - an Apicurio registry mirroring configuration schemas as versioned
//!   artifacts
//!
//! while streaming lifecycle events to Kafka for downstream indexing.
//!
//! ## Core Components
//!
//! - **Orchestrator**: the multi-stage registration state machine with
//!   streamed progress events and explicit compensation
//! - **Discovery**: the Consul client, health convergence loop and the
//!   listing/resolution/watch query surface
//! - **Store**: transactional repository for `ServiceModule` and
//!   `ConfigSchema` rows
//! - **Events**: fire-and-forget lifecycle emission to Kafka
//! - **Schemas**: layered schema retrieval with a synthesised fallback
//! - **Readiness**: aggregate backend probes

pub mod apicurio;
pub mod background;
pub mod config;
pub mod db;
pub mod discovery;
pub mod events;
pub mod orchestrator;
pub mod readiness;
pub mod schemas;
pub mod service;

pub use service::RegistrationHubService;

/// Current version of the hub.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
