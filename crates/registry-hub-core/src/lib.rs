//! Domain primitives for the PipeStream registration hub.
//!
//! This crate carries everything the service layers share without doing any
//! I/O of its own:
//!
//! - [`error::HubError`] - the top-level error vocabulary of the hub
//! - [`ids`] - deterministic derivation of service, schema and artifact ids
//! - [`status`] - module lifecycle and schema sync-state enums
//! - [`events`] - the registration lifecycle events streamed to callers
//! - [`requests`] - request/response shapes of the RPC surface
//! - [`schema`] - synthesis of the default key-value configuration schema

pub mod error;
pub mod events;
pub mod ids;
pub mod requests;
pub mod schema;
pub mod status;

pub use error::HubError;
pub use events::{RegistrationEvent, RegistrationEventType};
pub use status::{ServiceStatus, SyncStatus};
