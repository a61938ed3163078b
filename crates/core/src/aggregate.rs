//! Aggregate root trait for the owned records that change over time.

/// Aggregate root marker + minimal interface.
///
/// A stock balance is an aggregate root: a stable id plus a version that
/// increases by one on every committed change, so two snapshots of the same
/// balance can be told apart.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Monotonically increasing version of the aggregate's state.
    fn version(&self) -> u64;
}
