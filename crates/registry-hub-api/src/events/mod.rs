//! Lifecycle event emission to the event bus.

pub mod emitter;
pub mod payloads;

pub use emitter::{EventEmitter, EventError, KafkaEventEmitter, LifecycleEvent};
