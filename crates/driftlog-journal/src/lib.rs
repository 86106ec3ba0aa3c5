//! Append-only, per-entity event journal on a Redis-compatible store.
//!
//! Events are appended in atomic batches, one entity per batch, and read
//! back either as a plain bounded replay or as a streaming query. Streaming
//! queries come in two flavors: "current" delivers a bounded snapshot and
//! terminates; "live" keeps delivering new data as it arrives, woken by
//! pub/sub signals instead of busy-polling.
//!
//! # Architecture
//!
//! ```text
//! Writer
//!     |
//!     +-- write_batch (MULTI/EXEC) --> entity journal (sorted set)
//!         |                           tag indexes (lists)
//!         |                           highest-sequence marker (string)
//!         |                           identifier registry (set)
//!         +-- post-commit wake-ups --> per-entity / tag / identifier channels
//!
//! Readers
//!     |-- Journal::replay            bounded range read
//!     |-- ReadJournal::events_by_..  polling + wake-up state machine
//!     +-- ReadJournal::..._ids       cursor scan + identifier channel
//! ```
//!
//! # Modules
//!
//! - [`journal`] -- write path, replay reader, truncation
//! - [`query`] -- live/current streaming queries
//! - [`snapshot`] -- snapshot store (plain read-modify-write, no streaming)
//! - [`error`] -- shared error types

pub mod error;
pub mod journal;
pub mod query;
pub mod snapshot;

// Re-export primary types for convenience.
pub use error::JournalError;
pub use journal::Journal;
pub use query::ReadJournal;
pub use snapshot::SnapshotStore;
