use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};

use chrono::Utc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::Stream;
use tracing::{debug, warn};

use super::event::{NotificationDraft, NotificationEvent};

/// Identifier of one live subscription.
pub type SubscriberId = u64;

#[derive(Debug, Default)]
struct HubState {
    next_sequence: u64,
    next_subscriber: SubscriberId,
    subscribers: BTreeMap<SubscriberId, mpsc::Sender<NotificationEvent>>,
}

#[derive(Debug)]
struct HubInner {
    buffer: usize,
    state: Mutex<HubState>,
}

impl HubInner {
    fn unsubscribe(&self, id: SubscriberId) {
        if let Ok(mut state) = self.state.lock() {
            if state.subscribers.remove(&id).is_some() {
                debug!(subscriber = id, remaining = state.subscribers.len(), "subscriber removed");
            }
        }
    }
}

/// Live notification fan-out.
///
/// Cloning the hub is cheap; all clones share the same subscriber set and
/// sequence counter.
#[derive(Debug, Clone)]
pub struct NotificationHub {
    inner: Arc<HubInner>,
}

impl NotificationHub {
    /// Create a hub whose subscribers each buffer up to `buffer` undelivered events.
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                buffer: buffer.max(1),
                state: Mutex::new(HubState::default()),
            }),
        }
    }

    /// Register a new subscriber. Only events published after this call are delivered.
    pub fn subscribe(&self) -> HubSubscription {
        let (tx, rx) = mpsc::channel(self.inner.buffer);
        let id = match self.inner.state.lock() {
            Ok(mut state) => {
                state.next_subscriber += 1;
                let id = state.next_subscriber;
                state.subscribers.insert(id, tx);
                id
            }
            // Poisoned registry: the subscription is valid but never receives.
            Err(_) => 0,
        };
        debug!(subscriber = id, "subscriber registered");

        HubSubscription {
            id,
            rx,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Publish a notification to every live subscriber.
    ///
    /// Never waits: sequence assignment and per-subscriber hand-off happen
    /// under one short critical section, which is what keeps every
    /// subscriber's stream in sequence order. A subscriber whose buffer is
    /// full misses this event; a closed subscriber is removed.
    pub fn publish(&self, draft: NotificationDraft) -> NotificationEvent {
        let mut state = match self.inner.state.lock() {
            Ok(s) => s,
            Err(poisoned) => poisoned.into_inner(),
        };

        state.next_sequence += 1;
        let event = NotificationEvent {
            sequence: state.next_sequence,
            kind: draft.kind,
            message: draft.message,
            payload: draft.payload,
            published_at: Utc::now(),
        };

        let mut closed = Vec::new();
        for (id, tx) in state.subscribers.iter() {
            match tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(subscriber = *id, sequence = event.sequence, "subscriber buffer full; event dropped");
                }
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }
        for id in closed {
            state.subscribers.remove(&id);
            debug!(subscriber = id, "closed subscriber pruned during publish");
        }

        event
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().map(|s| s.subscribers.len()).unwrap_or(0)
    }

    /// Sequence number of the most recently published event (0 if none).
    pub fn last_sequence(&self) -> u64 {
        self.inner.state.lock().map(|s| s.next_sequence).unwrap_or(0)
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(64)
    }
}

/// One subscriber's live channel.
///
/// Dropping it unregisters the subscriber from the hub, so an abrupt client
/// disconnect leaves no publish target behind.
#[derive(Debug)]
pub struct HubSubscription {
    id: SubscriberId,
    rx: mpsc::Receiver<NotificationEvent>,
    hub: Weak<HubInner>,
}

impl HubSubscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next event. `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<NotificationEvent> {
        self.rx.recv().await
    }

    /// Take the next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<NotificationEvent> {
        self.rx.try_recv().ok()
    }
}

impl Stream for HubSubscription {
    type Item = NotificationEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for HubSubscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }
}
