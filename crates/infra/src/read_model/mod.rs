//! Key/value storage abstraction for directory-style read models.

pub mod store;

pub use store::{InMemoryStore, KeyValueStore};
