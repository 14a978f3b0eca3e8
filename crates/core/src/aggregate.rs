//! Aggregate traits for the event-sourced product, cart and order models.

use crate::error::{DomainError, DomainResult};

/// Aggregate root: identity plus a version that counts applied events.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Number of events applied so far. Equals the stream revision the state was
    /// rebuilt from, which is what conditional appends are checked against.
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for a stream append.
///
/// Every stock mutation is written with `Exact(v)` where `v` is the version the
/// decision was made against. If another writer appended in between, the write is
/// refused and the decision has to be made again on fresh state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking.
    Any,
    /// Require the stream to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "stream moved on (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

/// Decide/evolve split for an aggregate.
///
/// - `handle(&self, cmd)` decides which events happen. It never mutates.
/// - `apply(&mut self, event)` evolves state and bumps the version by one.
///
/// Neither side performs IO.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    fn apply(&mut self, event: &Self::Event);

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_version_only_matches_itself() {
        assert!(ExpectedVersion::Exact(3).matches(3));
        assert!(!ExpectedVersion::Exact(3).matches(4));
        assert!(ExpectedVersion::Any.matches(42));
    }

    #[test]
    fn check_reports_conflict_on_mismatch() {
        let err = ExpectedVersion::Exact(1).check(2).unwrap_err();
        match err {
            DomainError::Conflict(_) => {}
            _ => panic!("Expected Conflict error"),
        }
    }
}
