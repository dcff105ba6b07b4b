//! Results-queue consumer.
//!
//! [`handler::ResultHandler`] turns one delivery into a [`handler::HandleOutcome`]
//! without touching the transport. [`settle::settle`] maps that outcome to
//! ack, reject, or requeue, and [`consumer`] applies it to the delivery.

pub mod config;
pub mod consumer;
pub mod handler;
pub mod settle;

pub use config::{ConsumerConfig, WorkerConfig};
pub use handler::{HandleOutcome, RejectReason, ResultHandler};
pub use settle::{settle, Attempts, Settlement};
