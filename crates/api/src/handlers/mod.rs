//! Request handlers, one submodule per route group.
//!
//! Handlers extract and authenticate input, delegate to [`crate::engine`] or
//! the stores, and map failures through [`crate::error::AppError`].

pub mod jobs;
pub mod queues;
pub mod resources;
pub mod webhooks;
