//! Aggregate contract for the event-sourced storefront records.

use crate::error::{DomainError, DomainResult};

/// Identity and stream position of an aggregate.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Number of events applied so far. Equals the sequence number of the last
    /// event in the aggregate's stream.
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation used when appending to a stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Append regardless of the current stream version.
    Any,
    /// The stream must currently be at exactly this version.
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
                "record was modified concurrently (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

/// Decide/evolve semantics.
///
/// `handle` inspects the current state and returns the events a command produces
/// (possibly none, when the command is already satisfied). `apply` folds one event
/// into the state and bumps the version by one. Neither may perform IO.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    fn apply(&mut self, event: &Self::Event);

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    /// Fold a sequence of historical events into the aggregate.
    fn replay<'a, I>(&mut self, events: I)
    where
        I: IntoIterator<Item = &'a Self::Event>,
        Self::Event: 'a,
    {
        for event in events {
            self.apply(event);
        }
    }
}
