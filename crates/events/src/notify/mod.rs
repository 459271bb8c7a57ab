//! Notification fan-out service.
//!
//! The hub pushes live notifications to every connected dashboard session.
//! It owns no durable state, only the set of live subscriber channels:
//!
//! - `NotificationHub::publish` assigns a server-side sequence number and hands
//!   the event to every subscriber without waiting (bounded per-subscriber
//!   buffers; a full buffer drops the event for that subscriber only).
//! - Each subscriber receives events in sequence order.
//! - Nothing is replayed on reconnect.
//! - Dropping a [`HubSubscription`] unregisters it immediately.
//!
//! [`RecentNotifications`] is the subscriber-side presentation policy (last 5
//! events, 5 second expiry). It is local to a session and independent of the
//! hub's ordering guarantee.

mod event;
mod hub;
mod session;

pub use event::{NotificationDraft, NotificationEvent, NotificationKind};
pub use hub::{HubSubscription, NotificationHub, SubscriberId};
pub use session::{RecentNotifications, SubscriberSession};
