//! Event plumbing for stockroom.
//!
//! Two delivery paths live here:
//! - [`EventBus`] / [`InMemoryEventBus`]: lossless, ordered stream of committed
//!   history envelopes consumed by background projections.
//! - [`notify`]: the live notification fan-out to dashboard subscribers
//!   (sequence-numbered, bounded per subscriber, no replay).

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod notify;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use notify::{
    HubSubscription, NotificationDraft, NotificationEvent, NotificationHub, NotificationKind,
    RecentNotifications, SubscriberSession,
};
