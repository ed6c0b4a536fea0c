//! Per-stream checkpoints shared by the projections.
//!
//! A cursor records the last sequence number applied for one aggregate stream.
//! Envelopes at or below the cursor are duplicates and are skipped; anything
//! other than `cursor + 1` is a gap and is rejected.

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use spicecart_core::AggregateId;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize {aggregate_type} event: {message}")]
    Deserialize { aggregate_type: String, message: String },

    #[error("event does not belong to stream {0}")]
    StreamMismatch(AggregateId),

    #[error("non-monotonic sequence number for {aggregate_id} (last={last}, found={found})")]
    NonMonotonicSequence { aggregate_id: AggregateId, last: u64, found: u64 },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Position {
    /// Next in line; apply it.
    Next,
    /// Already applied.
    Duplicate,
}

#[derive(Debug, Default)]
pub struct StreamCursors {
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self, aggregate_id: AggregateId) -> u64 {
        match self.cursors.read() {
            Ok(cursors) => cursors.get(&aggregate_id).copied().unwrap_or(0),
            Err(_) => 0,
        }
    }

    pub fn position(
        &self,
        aggregate_id: AggregateId,
        sequence_number: u64,
    ) -> Result<Position, ProjectionError> {
        let last = self.last(aggregate_id);
        if sequence_number == 0 || sequence_number > last + 1 {
            return Err(ProjectionError::NonMonotonicSequence {
                aggregate_id,
                last,
                found: sequence_number,
            });
        }
        if sequence_number <= last {
            return Ok(Position::Duplicate);
        }
        Ok(Position::Next)
    }

    pub fn advance(&self, aggregate_id: AggregateId, sequence_number: u64) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert(aggregate_id, sequence_number);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }
    }
}
