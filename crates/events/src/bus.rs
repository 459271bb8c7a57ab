//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus distributes committed history envelopes from the reservation engine
//! to background consumers (the trend projection). It is a distribution
//! mechanism, not storage: the history log stays the source of truth and a
//! consumer that falls behind can always be rebuilt from it.
//!
//! Guarantees expected from implementations:
//!
//! - **Broadcast**: every live subscription receives every message published
//!   after it subscribed.
//! - **Publish order per subscription**: messages arrive in the order
//!   `publish` was called. Callers that need a total order (history ids)
//!   serialize their own `publish` calls.
//! - **Non-blocking publish**: `publish` must not wait on consumers, so a slow
//!   projection never stalls a stock commit.
//! - **At-least-once tolerant consumers**: consumers must be idempotent.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// A subscription to an event stream.
///
/// ```ignore
/// let sub = bus.subscribe();
/// loop {
///     match sub.recv_timeout(Duration::from_millis(250)) {
///         Ok(envelope) => projection.apply_envelope(&envelope)?,
///         Err(RecvTimeoutError::Timeout) => continue,  // check for shutdown
///         Err(RecvTimeoutError::Disconnected) => break, // bus dropped
///     }
/// }
/// ```
///
/// Subscriptions are consumed by a single thread. Dropping the subscription is
/// the unsubscribe; the bus prunes the dead sender on its next publish.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently queued without blocking.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Transport-agnostic pub/sub contract.
///
/// ```text
/// ReservationEngine ── append ──> HistoryLog
///        │
///        └── publish ──> EventBus ──> TrendWorker ──> TrendProjection
/// ```
///
/// `publish` reports how many live subscriptions received the message so
/// callers can log when nobody is listening.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<usize, Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<usize, Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
