//! Streaming query surfaces over the journal.
//!
//! Queries come on two axes: one entity's event history vs the set of all
//! known identifiers, and "current" (bounded snapshot, terminates) vs
//! "live" (keeps delivering until the consumer drops the stream). All four
//! surfaces are demand-driven `Stream`s: nothing is read from the store
//! ahead of consumer demand beyond one page.

mod events_by_id;
mod persistence_ids;
mod state;

use driftlog_db::RedisPool;
use driftlog_types::EventEnvelope;
use futures::StreamExt;
use futures::stream::BoxStream;

use crate::error::JournalError;

/// Result stream of event envelopes for one entity.
pub type EventStream = BoxStream<'static, Result<EventEnvelope, JournalError>>;

/// Result stream of persistence identifiers.
pub type IdStream = BoxStream<'static, Result<String, JournalError>>;

/// Read-side facade over one journal keyspace.
///
/// Streams returned here own their resources: each live stream holds its
/// own notification subscription, torn down when the stream is dropped.
/// Errors fail only the stream that observed them.
#[derive(Clone)]
pub struct ReadJournal {
    pool: RedisPool,
}

impl ReadJournal {
    /// Create a read journal over the given connection.
    pub const fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    /// Live stream of one entity's events with sequence numbers in
    /// `[from_sequence_nr, to_sequence_nr]`.
    ///
    /// Delivers in non-decreasing sequence order, waking on the entity's
    /// notification channel rather than busy-polling. Runs until the
    /// consumer drops it; once the upper bound is drained the stream stays
    /// open but delivers nothing further.
    pub fn events_by_persistence_id(
        &self,
        persistence_id: &str,
        from_sequence_nr: u64,
        to_sequence_nr: u64,
    ) -> EventStream {
        events_by_id::events_stream(
            self.pool.clone(),
            persistence_id.to_owned(),
            from_sequence_nr,
            to_sequence_nr,
            true,
        )
        .boxed()
    }

    /// Bounded snapshot of one entity's events with sequence numbers in
    /// `[from_sequence_nr, to_sequence_nr]`.
    ///
    /// Completes once the data available at poll time is delivered and
    /// issues no further store reads.
    pub fn current_events_by_persistence_id(
        &self,
        persistence_id: &str,
        from_sequence_nr: u64,
        to_sequence_nr: u64,
    ) -> EventStream {
        events_by_id::events_stream(
            self.pool.clone(),
            persistence_id.to_owned(),
            from_sequence_nr,
            to_sequence_nr,
            false,
        )
        .boxed()
    }

    /// Live stream of persistence identifiers: the currently known set,
    /// then each newly registered identifier as it is announced.
    ///
    /// Identifiers may appear several times; deduplication is the
    /// consumer's concern.
    pub fn persistence_ids(&self) -> IdStream {
        persistence_ids::live_ids_stream(self.pool.clone()).boxed()
    }

    /// Stream of the currently known persistence identifiers. Terminates
    /// once the set is enumerated, even when it is empty.
    pub fn current_persistence_ids(&self) -> IdStream {
        persistence_ids::current_ids_stream(self.pool.clone()).boxed()
    }
}
