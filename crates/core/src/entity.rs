//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Materials keep their identifier while quantity and thresholds change; the
/// ledger keys its rows by `Entity::id`.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + Ord + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
