//! Shared type definitions for the driftlog event journal.
//!
//! This crate is the single source of truth for the types that flow between
//! the write path, the replay reader, and the query engines. Records are
//! opaque to the journal: payloads are raw bytes tagged with a manifest
//! string, and domain (de)serialization is the caller's concern.
//!
//! # Modules
//!
//! - [`event`] -- persisted event records, delivery envelopes, tag entries
//! - [`snapshot`] -- snapshot entries and selection criteria

pub mod event;
pub mod snapshot;

// Re-export all public types at crate root for convenience.
pub use event::{EventEnvelope, JournalEvent, TagEntry, TagEntryParseError, generate_writer_id};
pub use snapshot::{SnapshotEntry, SnapshotSelection};
