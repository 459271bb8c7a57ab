use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

use super::event::NotificationEvent;
use super::hub::HubSubscription;

/// Subscriber-local view of recent notifications.
///
/// Keeps at most `capacity` events, ordered by sequence number, and forgets
/// events once they are older than `ttl` measured from when this subscriber
/// received them. Duplicate deliveries (same sequence) are ignored.
#[derive(Debug, Clone)]
pub struct RecentNotifications {
    capacity: usize,
    ttl: Duration,
    entries: VecDeque<(DateTime<Utc>, NotificationEvent)>,
}

impl Default for RecentNotifications {
    fn default() -> Self {
        Self::new(5, Duration::seconds(5))
    }
}

impl RecentNotifications {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            entries: VecDeque::new(),
        }
    }

    /// Record a delivered event. Returns `false` for duplicates and for events
    /// older than everything retained in a full view.
    pub fn push(&mut self, event: NotificationEvent, received_at: DateTime<Utc>) -> bool {
        let seq = event.sequence;
        if self.entries.iter().any(|(_, e)| e.sequence == seq) {
            return false;
        }

        let pos = self
            .entries
            .iter()
            .position(|(_, e)| e.sequence > seq)
            .unwrap_or(self.entries.len());

        if self.entries.len() >= self.capacity && pos == 0 {
            return false;
        }

        self.entries.insert(pos, (received_at, event));
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        true
    }

    /// Drop entries older than the TTL.
    pub fn expire(&mut self, now: DateTime<Utc>) {
        let ttl = self.ttl;
        self.entries.retain(|(received_at, _)| now - *received_at <= ttl);
    }

    /// Events still visible at `now`, oldest sequence first.
    pub fn visible(&mut self, now: DateTime<Utc>) -> Vec<NotificationEvent> {
        self.expire(now);
        self.entries.iter().map(|(_, e)| e.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A live subscription paired with its local recent-events view.
#[derive(Debug)]
pub struct SubscriberSession {
    subscription: HubSubscription,
    recent: RecentNotifications,
}

impl SubscriberSession {
    pub fn new(subscription: HubSubscription) -> Self {
        Self::with_view(subscription, RecentNotifications::default())
    }

    pub fn with_view(subscription: HubSubscription, recent: RecentNotifications) -> Self {
        Self {
            subscription,
            recent,
        }
    }

    pub fn subscriber_id(&self) -> u64 {
        self.subscription.id()
    }

    /// Wait for the next event and record it in the local view.
    pub async fn next(&mut self) -> Option<NotificationEvent> {
        let event = self.subscription.recv().await?;
        self.recent.push(event.clone(), Utc::now());
        Some(event)
    }

    /// Record everything already buffered without waiting.
    pub fn poll_buffered(&mut self, received_at: DateTime<Utc>) -> usize {
        let mut n = 0;
        while let Some(event) = self.subscription.try_recv() {
            self.recent.push(event, received_at);
            n += 1;
        }
        n
    }

    pub fn visible(&mut self, now: DateTime<Utc>) -> Vec<NotificationEvent> {
        self.recent.visible(now)
    }
}
