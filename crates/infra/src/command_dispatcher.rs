//! Command execution pipeline for event-sourced aggregates.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the aggregate's stream
//!   ↓
//! 2. Rehydrate (apply history in sequence order)
//!   ↓
//! 3. Handle (pure decision, produces events)
//!   ↓
//! 4. Conditional append at the version the decision was made against
//!   ↓
//! 5. Publish committed events to the bus
//! ```
//!
//! Step 4 is where oversell is prevented: two writers deciding against the same
//! product version cannot both commit. The loser gets
//! [`DispatchError::Concurrency`] and, through
//! [`CommandDispatcher::dispatch_with_retry`], re-decides against fresh state.
//!
//! Once step 4 succeeds the command has happened. A failure in step 5 is
//! reported on [`Committed::publish_error`], never as an `Err`, so callers do
//! not undo or repeat a write that is already in the store.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use storefront_core::{Aggregate, AggregateId, DomainError, ExpectedVersion};
use storefront_events::{Event, EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The aggregate refused the command. Passed through unchanged.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Another writer committed to the stream first.
    #[error("concurrent modification: {0}")]
    Concurrency(String),

    /// Stored payload no longer matches the aggregate's event type.
    #[error("failed to decode stored event: {0}")]
    Deserialize(String),

    #[error(transparent)]
    Store(EventStoreError),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

/// Result of a successful dispatch: the aggregate after the new events were
/// applied, plus what was committed. `events` is empty for a no-op command.
#[derive(Debug)]
pub struct Committed<A> {
    pub state: A,
    pub events: Vec<StoredEvent>,
    /// Set when the append landed but the bus refused an event. Subscribers
    /// have to be refreshed from the store.
    pub publish_error: Option<String>,
}

impl<A> Committed<A> {
    pub fn is_published(&self) -> bool {
        self.publish_error.is_none()
    }
}

#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Rehydrate an aggregate without handling anything. A stream that was
    /// never written yields the `make_aggregate` instance untouched.
    pub fn load<A>(
        &self,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history(&mut aggregate, &history)?;
        Ok(aggregate)
    }

    /// Run one command through the full pipeline, once.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: &A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Committed<A>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: Event + Serialize + DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history(&mut aggregate, &history)?;

        let decided = aggregate.handle(command)?;
        if decided.is_empty() {
            return Ok(Committed {
                state: aggregate,
                events: Vec::new(),
                publish_error: None,
            });
        }

        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(aggregate_id, aggregate_type, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;

        for ev in &decided {
            aggregate.apply(ev);
        }

        let mut publish_error = None;
        for stored in &committed {
            if let Err(e) = self.bus.publish(stored.to_envelope()) {
                warn!(
                    aggregate_id = %aggregate_id,
                    aggregate_type,
                    sequence_number = stored.sequence_number,
                    error = ?e,
                    "event committed but not published"
                );
                publish_error = Some(format!("{e:?}"));
                break;
            }
        }

        Ok(Committed {
            state: aggregate,
            events: committed,
            publish_error,
        })
    }

    /// [`dispatch`](Self::dispatch), re-run from a fresh load on each
    /// concurrency conflict, at most `max_retries` extra times.
    pub fn dispatch_with_retry<A>(
        &self,
        max_retries: u32,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: &A::Command,
        make_aggregate: impl Fn(AggregateId) -> A,
    ) -> Result<Committed<A>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: Event + Serialize + DeserializeOwned,
    {
        let mut attempt = 0u32;
        loop {
            match self.dispatch(aggregate_id, aggregate_type, command, &make_aggregate) {
                Err(DispatchError::Concurrency(msg)) if attempt < max_retries => {
                    attempt += 1;
                    warn!(
                        aggregate_id = %aggregate_id,
                        aggregate_type,
                        attempt,
                        conflict = %msg,
                        "retrying command after concurrent write"
                    );
                }
                other => {
                    if attempt > 0 {
                        debug!(aggregate_id = %aggregate_id, attempt, "command settled after retry");
                    }
                    return other;
                }
            }
        }
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(StoredEvent::stream_version).unwrap_or(0)
}

fn validate_loaded_stream(
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            ))));
        }
        if e.sequence_number != last + 1 {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "gap in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }
    Ok(())
}
