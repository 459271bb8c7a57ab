//! In-memory event bus backed by unbounded std channels.

use std::sync::{Mutex, mpsc};

use thiserror::Error;
use tracing::debug;

use crate::bus::{EventBus, Subscription};

#[derive(Debug, Error)]
pub enum InMemoryBusError {
    /// Publish failed due to internal lock poisoning.
    #[error("event bus lock poisoned")]
    Poisoned,
}

/// In-memory pub/sub bus.
///
/// - No IO, no async: `publish` is a channel send per subscriber
/// - Lossless for live subscribers (channels are unbounded)
/// - Subscribers that dropped their receiver are pruned during publish
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    subscribers: Mutex<Vec<mpsc::Sender<M>>>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of subscriptions still registered (dead ones linger until the next publish).
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<usize, Self::Error> {
        let mut subs = self.subscribers.lock().map_err(|_| InMemoryBusError::Poisoned)?;

        let before = subs.len();
        subs.retain(|tx| tx.send(message.clone()).is_ok());
        if subs.len() != before {
            debug!(pruned = before - subs.len(), "dropped closed bus subscriptions");
        }

        Ok(subs.len())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();

        // A poisoned registry still hands out a subscription; it simply never
        // receives anything.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_sees_messages_in_publish_order() {
        let bus: InMemoryEventBus<u64> = InMemoryEventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        for n in 1..=5 {
            assert_eq!(bus.publish(n).unwrap(), 2);
        }

        assert_eq!(a.drain(), vec![1, 2, 3, 4, 5]);
        assert_eq!(b.drain(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn dropped_subscriptions_are_pruned_on_publish() {
        let bus: InMemoryEventBus<&'static str> = InMemoryEventBus::new();
        let keep = bus.subscribe();
        let gone = bus.subscribe();
        drop(gone);

        assert_eq!(bus.subscriber_count(), 2);
        assert_eq!(bus.publish("x").unwrap(), 1);
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(keep.try_recv().unwrap(), "x");
    }

    #[test]
    fn late_subscribers_do_not_get_replay() {
        let bus: InMemoryEventBus<u8> = InMemoryEventBus::new();
        assert_eq!(bus.publish(1).unwrap(), 0);
        let late = bus.subscribe();
        bus.publish(2).unwrap();
        assert_eq!(late.drain(), vec![2]);
    }
}
