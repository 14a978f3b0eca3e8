use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use storefront_core::AggregateId;

/// Where an incoming sequence number sits relative to what was already applied.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Position {
    /// At or below the cursor: delivered before, skip.
    Duplicate,
    /// Exactly one past the cursor: apply, then advance.
    Next,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("sequence gap on {aggregate_id} (last={last}, found={found})")]
pub struct SequenceGap {
    pub aggregate_id: AggregateId,
    pub last: u64,
    pub found: u64,
}

/// Last applied sequence number per aggregate stream.
#[derive(Debug, Default)]
pub struct SequenceCursors {
    inner: RwLock<HashMap<AggregateId, u64>>,
}

impl SequenceCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self, aggregate_id: AggregateId) -> u64 {
        match self.inner.read() {
            Ok(map) => map.get(&aggregate_id).copied().unwrap_or(0),
            Err(_) => 0,
        }
    }

    pub fn position(&self, aggregate_id: AggregateId, found: u64) -> Result<Position, SequenceGap> {
        let last = self.last(aggregate_id);
        if found != 0 && found <= last {
            return Ok(Position::Duplicate);
        }
        if found == last + 1 {
            return Ok(Position::Next);
        }
        Err(SequenceGap {
            aggregate_id,
            last,
            found,
        })
    }

    pub fn advance(&self, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(aggregate_id, seq);
        }
    }
}
