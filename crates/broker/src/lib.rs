//! AMQP plumbing for job dispatch, queue introspection, and cross-process
//! broadcast relay.
//!
//! - [`config`]: broker connection settings and queue names.
//! - [`publisher`]: the [`QueuePublisher`] seam and its AMQP implementation.
//! - [`introspect`]: queue depth via the RabbitMQ management API.
//! - [`relay`]: fanout exchange bridging broadcast events between processes.

pub mod config;
pub mod connection;
pub mod error;
pub mod introspect;
pub mod publisher;
pub mod relay;

#[cfg(feature = "test-support")]
pub mod testing;

pub use config::{BrokerConfig, QueueNames};
pub use error::BrokerError;
pub use introspect::{IntrospectError, QueueIntrospector, QueueTraffic};
pub use publisher::{AmqpPublisher, QueuePublisher};
