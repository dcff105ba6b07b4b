//! Topic-addressed broadcast fan-out.
//!
//! - [`Broadcaster`]: in-process publish/subscribe hub with one
//!   `tokio::sync::broadcast` channel per topic.
//! - [`BroadcastEvent`]: the events subscribers receive.
//! - [`EventSink`]: the publishing seam, implemented by [`Broadcaster`] and by
//!   the broker relay when events originate in another process.

pub mod broadcaster;
pub mod event;

pub use broadcaster::{Broadcaster, EventSink};
pub use event::{BroadcastEvent, TopicEvent};
