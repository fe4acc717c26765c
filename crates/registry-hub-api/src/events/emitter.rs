//! Fire-and-forget lifecycle event emission.
//!
//! Emission never affects the caller: failures are logged and dropped. No
//! events are published for failed registrations, only for completed
//! registrations and unregistrations. Record keys are a fresh random 128-bit
//! identifier per emit to spread partitions.

use std::time::Duration;

use async_trait::async_trait;
use prost::Message;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::events::payloads::{
    ModuleRegistered, ModuleUnregistered, ServiceRegistered, ServiceUnregistered,
};

/// Logical topics of the lifecycle channel.
pub mod topics {
    pub const SERVICE_REGISTERED: &str = "service-registered";
    pub const SERVICE_UNREGISTERED: &str = "service-unregistered";
    pub const MODULE_REGISTERED: &str = "module-registered";
    pub const MODULE_UNREGISTERED: &str = "module-unregistered";
}

/// Event-bus setup errors
#[derive(Error, Debug)]
pub enum EventError {
    #[error("Failed to create event producer: {0}")]
    ProducerCreation(#[from] rdkafka::error::KafkaError),
}

/// One lifecycle event with its topic routing.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    ServiceRegistered(ServiceRegistered),
    ServiceUnregistered(ServiceUnregistered),
    ModuleRegistered(ModuleRegistered),
    ModuleUnregistered(ModuleUnregistered),
}

impl LifecycleEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            LifecycleEvent::ServiceRegistered(_) => topics::SERVICE_REGISTERED,
            LifecycleEvent::ServiceUnregistered(_) => topics::SERVICE_UNREGISTERED,
            LifecycleEvent::ModuleRegistered(_) => topics::MODULE_REGISTERED,
            LifecycleEvent::ModuleUnregistered(_) => topics::MODULE_UNREGISTERED,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            LifecycleEvent::ServiceRegistered(e) => e.encode_to_vec(),
            LifecycleEvent::ServiceUnregistered(e) => e.encode_to_vec(),
            LifecycleEvent::ModuleRegistered(e) => e.encode_to_vec(),
            LifecycleEvent::ModuleUnregistered(e) => e.encode_to_vec(),
        }
    }
}

/// Publishes lifecycle events; implementations must never propagate
/// failures.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventEmitter: Send + Sync {
    async fn emit(&self, event: LifecycleEvent);
}

/// Kafka implementation of [`EventEmitter`].
pub struct KafkaEventEmitter {
    producer: FutureProducer,
}

impl KafkaEventEmitter {
    pub fn new(bootstrap_servers: &str) -> Result<Self, EventError> {
        let producer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("message.timeout.ms", "5000")
            .create()?;
        Ok(Self { producer })
    }
}

#[async_trait]
impl EventEmitter for KafkaEventEmitter {
    async fn emit(&self, event: LifecycleEvent) {
        let topic = event.topic();
        let payload = event.encode();
        let key = Uuid::new_v4();

        let record = FutureRecord::to(topic)
            .key(key.as_bytes().as_slice())
            .payload(&payload);

        match self.producer.send(record, Duration::from_secs(0)).await {
            Ok((partition, offset)) => {
                debug!(topic, partition, offset, "Published lifecycle event");
            }
            Err((e, _)) => {
                warn!(topic, "Lifecycle event dropped: {}", e);
            }
        }
    }
}
