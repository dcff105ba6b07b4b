//! Per-topic fan-out backed by `tokio::sync::broadcast` channels.
//!
//! [`Broadcaster`] is shared via `Arc<Broadcaster>`. Publishing never blocks
//! and never fails: with no subscribers the event is dropped, and a slow
//! subscriber observes `RecvError::Lagged` instead of holding up publishers.
//! Topics whose receivers are all gone are dropped on the next publish to
//! them, on [`Broadcaster::release`], or when another topic is created.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::broadcast;

use crate::event::BroadcastEvent;

/// Default buffer capacity of each topic channel.
const DEFAULT_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// EventSink
// ---------------------------------------------------------------------------

/// Anything broadcast events can be handed to.
///
/// Implementations must return promptly; callers publish from request
/// handlers and the message consumer.
pub trait EventSink: Send + Sync {
    fn publish(&self, topic: &str, event: BroadcastEvent);
}

// ---------------------------------------------------------------------------
// Broadcaster
// ---------------------------------------------------------------------------

/// In-process topic-addressed publish/subscribe hub.
///
/// ```rust
/// use courier_events::Broadcaster;
///
/// let broadcaster = Broadcaster::default();
/// let _rx = broadcaster.subscribe("conversation_7");
/// assert_eq!(broadcaster.subscriber_count("conversation_7"), 1);
/// ```
pub struct Broadcaster {
    capacity: usize,
    topics: RwLock<HashMap<String, broadcast::Sender<BroadcastEvent>>>,
}

impl Broadcaster {
    /// Create a broadcaster whose topic channels buffer `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// Deliver `event` to every current subscriber of `topic`.
    ///
    /// Returns the number of subscribers the event was handed to.
    pub fn publish(&self, topic: &str, event: BroadcastEvent) -> usize {
        let sent = {
            let topics = self.read();
            match topics.get(topic) {
                Some(sender) => sender.send(event).ok(),
                None => return 0,
            }
        };

        match sent {
            Some(count) => count,
            None => {
                self.prune(topic);
                0
            }
        }
    }

    /// Subscribe to events published on `topic` from now on.
    ///
    /// Creating a new topic also drops every other topic whose receivers are
    /// all gone, so the map is bounded by live subscriptions.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<BroadcastEvent> {
        if let Some(sender) = self.read().get(topic) {
            return sender.subscribe();
        }
        let mut topics = self.write();
        if let Some(sender) = topics.get(topic) {
            return sender.subscribe();
        }
        let before = topics.len();
        topics.retain(|_, sender| sender.receiver_count() > 0);
        if topics.len() < before {
            tracing::trace!(pruned = before - topics.len(), "Pruned topics with no subscribers");
        }
        let (sender, receiver) = broadcast::channel(self.capacity);
        topics.insert(topic.to_string(), sender);
        receiver
    }

    /// Drop `topic` once its last receiver is gone.
    ///
    /// Subscribers call this after dropping their receiver.
    pub fn release(&self, topic: &str) {
        self.prune(topic);
    }

    /// Number of live receivers on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.read()
            .get(topic)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Number of topics currently holding a channel.
    pub fn topic_count(&self) -> usize {
        self.read().len()
    }

    /// Drop `topic` if nobody is listening any more.
    fn prune(&self, topic: &str) {
        let mut topics = self.write();
        if topics
            .get(topic)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            topics.remove(topic);
            tracing::trace!(topic, "Pruned topic with no subscribers");
        }
    }

    // A panic while holding the lock cannot leave the map half-updated, so a
    // poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, broadcast::Sender<BroadcastEvent>>> {
        self.topics.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, broadcast::Sender<BroadcastEvent>>> {
        self.topics.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventSink for Broadcaster {
    fn publish(&self, topic: &str, event: BroadcastEvent) {
        let delivered = Broadcaster::publish(self, topic, event);
        tracing::debug!(topic, delivered, "Broadcast event published");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use courier_core::job_kind::JobKind;
    use courier_core::job_status::JobStatus;
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    use super::*;

    fn event(job_id: i64) -> BroadcastEvent {
        BroadcastEvent::JobStatus {
            job_id,
            job_kind: JobKind::Install,
            status: JobStatus::InProgress,
            derived_resource_id: None,
            error_message: None,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_events_for_their_topic_only() {
        let broadcaster = Broadcaster::default();
        let mut a = broadcaster.subscribe("conversation_1");
        let mut b = broadcaster.subscribe("conversation_2");

        assert_eq!(broadcaster.publish("conversation_1", event(1)), 1);

        let BroadcastEvent::JobStatus { job_id, .. } = a.recv().await.unwrap() else {
            panic!("expected a job status event");
        };
        assert_eq!(job_id, 1);
        assert!(matches!(b.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn every_subscriber_of_a_topic_receives_the_event() {
        let broadcaster = Broadcaster::default();
        let mut first = broadcaster.subscribe("job_status_install");
        let mut second = broadcaster.subscribe("job_status_install");

        assert_eq!(broadcaster.publish("job_status_install", event(3)), 2);

        for rx in [&mut first, &mut second] {
            let BroadcastEvent::JobStatus { job_id, .. } = rx.recv().await.unwrap() else {
                panic!("expected a job status event");
            };
            assert_eq!(job_id, 3);
        }
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let broadcaster = Broadcaster::default();
        assert_eq!(broadcaster.publish("conversation_9", event(1)), 0);
        assert_eq!(broadcaster.topic_count(), 0);
    }

    #[test]
    fn late_subscriber_misses_earlier_events() {
        let broadcaster = Broadcaster::default();
        let _early = broadcaster.subscribe("conversation_1");
        broadcaster.publish("conversation_1", event(1));

        let mut late = broadcaster.subscribe("conversation_1");
        assert!(matches!(late.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn topics_without_receivers_are_pruned() {
        let broadcaster = Broadcaster::default();
        let rx = broadcaster.subscribe("conversation_1");
        assert_eq!(broadcaster.topic_count(), 1);

        drop(rx);
        broadcaster.publish("conversation_1", event(1));
        assert_eq!(broadcaster.topic_count(), 0);
    }

    #[test]
    fn released_topic_is_removed_once_unused() {
        let broadcaster = Broadcaster::default();
        let first = broadcaster.subscribe("conversation_1");
        let second = broadcaster.subscribe("conversation_1");

        drop(first);
        broadcaster.release("conversation_1");
        assert_eq!(broadcaster.topic_count(), 1);

        drop(second);
        broadcaster.release("conversation_1");
        assert_eq!(broadcaster.topic_count(), 0);
    }

    #[test]
    fn abandoned_topics_do_not_accumulate() {
        let broadcaster = Broadcaster::default();
        let _live = broadcaster.subscribe("job_status_install");

        for id in 0..10_000 {
            drop(broadcaster.subscribe(&format!("conversation_{id}")));
        }

        // The live topic plus the most recently abandoned one.
        assert_eq!(broadcaster.topic_count(), 2);
        assert_eq!(broadcaster.subscriber_count("job_status_install"), 1);
    }

    #[tokio::test]
    async fn slow_subscriber_lags_without_blocking_publisher() {
        let broadcaster = Broadcaster::new(2);
        let mut slow = broadcaster.subscribe("conversation_1");

        for id in 0..5 {
            broadcaster.publish("conversation_1", event(id));
        }

        assert!(matches!(slow.recv().await, Err(RecvError::Lagged(3))));
        let BroadcastEvent::JobStatus { job_id, .. } = slow.recv().await.unwrap() else {
            panic!("expected a job status event");
        };
        assert_eq!(job_id, 3);
    }
}
