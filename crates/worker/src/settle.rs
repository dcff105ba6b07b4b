//! Acknowledgement policy.
//!
//! Only the consume loop talks to the broker; it asks [`settle`] what to do
//! with each delivery.

use lapin::types::{AMQPValue, FieldTable};

use crate::handler::{HandleOutcome, RejectReason};

/// Header quorum queues set on redelivered messages.
pub const DELIVERY_COUNT_HEADER: &str = "x-delivery-count";

/// Final disposition of a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Ack,
    /// Reject without requeue. Dead-lettering, if any, is broker configuration.
    Reject,
    Requeue,
}

/// How many times a delivery has been attempted before.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempts {
    /// Never delivered before.
    First,
    /// `x-delivery-count` reported this many prior deliveries.
    Counted(u32),
    /// Redelivered, but the queue does not count deliveries.
    Redelivered,
}

impl Attempts {
    /// Derive the attempt count from delivery headers and the redelivered flag.
    pub fn from_delivery(headers: Option<&FieldTable>, redelivered: bool) -> Self {
        let counted = headers.and_then(|table| {
            table
                .inner()
                .iter()
                .find(|(key, _)| key.as_str() == DELIVERY_COUNT_HEADER)
                .and_then(|(_, value)| amqp_count(value))
        });

        match counted {
            Some(0) if !redelivered => Attempts::First,
            Some(n) => Attempts::Counted(n),
            None if redelivered => Attempts::Redelivered,
            None => Attempts::First,
        }
    }
}

fn amqp_count(value: &AMQPValue) -> Option<u32> {
    let n: i64 = match value {
        AMQPValue::ShortShortInt(v) => i64::from(*v),
        AMQPValue::ShortShortUInt(v) => i64::from(*v),
        AMQPValue::ShortInt(v) => i64::from(*v),
        AMQPValue::ShortUInt(v) => i64::from(*v),
        AMQPValue::LongInt(v) => i64::from(*v),
        AMQPValue::LongUInt(v) => i64::from(*v),
        AMQPValue::LongLongInt(v) => *v,
        _ => return None,
    };
    u32::try_from(n).ok()
}

/// Map a handler outcome to a settlement.
///
/// Transient failures are requeued while fewer than `max_retries` prior
/// deliveries are known. A redelivery on a queue that does not count
/// deliveries has already used its one retry.
pub fn settle(outcome: &HandleOutcome, attempts: Attempts, max_retries: u32) -> Settlement {
    match outcome {
        HandleOutcome::Processed { .. } | HandleOutcome::Duplicate { .. } => Settlement::Ack,
        HandleOutcome::Rejected(RejectReason::Malformed(_))
        | HandleOutcome::Rejected(RejectReason::UnknownConversation(_)) => Settlement::Reject,
        HandleOutcome::Rejected(RejectReason::Transient(_)) => {
            let retry = match attempts {
                Attempts::First => max_retries > 0,
                Attempts::Counted(prior) => prior < max_retries,
                Attempts::Redelivered => false,
            };
            if retry {
                Settlement::Requeue
            } else {
                Settlement::Reject
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transient() -> HandleOutcome {
        HandleOutcome::Rejected(RejectReason::Transient("pool timed out".to_string()))
    }

    fn headers(count: AMQPValue) -> FieldTable {
        let mut table = FieldTable::default();
        table.insert(DELIVERY_COUNT_HEADER.into(), count);
        table
    }

    #[test]
    fn processed_and_duplicate_are_acked() {
        let processed = HandleOutcome::Processed {
            conversation_id: 7,
            message_ids: vec![1],
        };
        let duplicate = HandleOutcome::Duplicate { conversation_id: 7 };
        assert_eq!(settle(&processed, Attempts::First, 3), Settlement::Ack);
        assert_eq!(settle(&duplicate, Attempts::Counted(5), 3), Settlement::Ack);
    }

    #[test]
    fn parse_failures_are_never_acked_or_requeued() {
        let malformed = HandleOutcome::Rejected(RejectReason::Malformed("eof".to_string()));
        let unknown = HandleOutcome::Rejected(RejectReason::UnknownConversation(9));
        for attempts in [Attempts::First, Attempts::Counted(1), Attempts::Redelivered] {
            assert_eq!(settle(&malformed, attempts, 3), Settlement::Reject);
            assert_eq!(settle(&unknown, attempts, 3), Settlement::Reject);
        }
    }

    #[test]
    fn transient_failures_retry_up_to_the_limit() {
        assert_eq!(settle(&transient(), Attempts::First, 3), Settlement::Requeue);
        assert_eq!(settle(&transient(), Attempts::Counted(2), 3), Settlement::Requeue);
        assert_eq!(settle(&transient(), Attempts::Counted(3), 3), Settlement::Reject);
        assert_eq!(settle(&transient(), Attempts::First, 0), Settlement::Reject);
    }

    #[test]
    fn uncounted_redelivery_is_not_requeued_again() {
        assert_eq!(settle(&transient(), Attempts::Redelivered, 3), Settlement::Reject);
    }

    #[test]
    fn attempts_read_delivery_count_header() {
        let table = headers(AMQPValue::LongLongInt(2));
        assert_eq!(Attempts::from_delivery(Some(&table), true), Attempts::Counted(2));

        let table = headers(AMQPValue::LongUInt(1));
        assert_eq!(Attempts::from_delivery(Some(&table), false), Attempts::Counted(1));
    }

    #[test]
    fn attempts_fall_back_to_redelivered_flag() {
        assert_eq!(Attempts::from_delivery(None, false), Attempts::First);
        assert_eq!(Attempts::from_delivery(None, true), Attempts::Redelivered);

        let junk = headers(AMQPValue::Boolean(true));
        assert_eq!(Attempts::from_delivery(Some(&junk), true), Attempts::Redelivered);
    }
}
