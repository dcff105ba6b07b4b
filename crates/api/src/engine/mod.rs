//! Job orchestration: dispatch, webhook-driven status changes, and the
//! synchronous ingestion path.
//!
//! Every status change goes through [`transition`], which checks the
//! transition table, applies the compare-and-set, logs, and broadcasts.

pub mod dispatcher;
pub mod ingestion;
pub mod status;
pub mod transition;
