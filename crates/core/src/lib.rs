//! Courier domain core.
//!
//! Pure logic shared by the API server, the results worker, and the broker
//! plumbing. This crate has no internal dependencies.

pub mod config;
pub mod error;
pub mod job_kind;
pub mod job_status;
pub mod payloads;
pub mod results;
pub mod signing;
pub mod topics;
pub mod types;
