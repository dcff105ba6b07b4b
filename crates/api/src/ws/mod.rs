//! WebSocket subscriptions to broadcast topics.
//!
//! Each connection subscribes to exactly one topic, chosen by the `topic`
//! query parameter at upgrade time.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
