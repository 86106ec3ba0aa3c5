//! Persisted event records and the envelopes delivered to query consumers.
//!
//! A [`JournalEvent`] is what the write path stores: one immutable record in
//! one entity's journal, keyed by its sequence number. An [`EventEnvelope`]
//! is what streaming queries deliver downstream. A [`TagEntry`] is the
//! reference appended to a per-tag index list for every tagged record.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single persisted event belonging to one entity's journal.
///
/// Immutable once written. Sequence numbers for one `persistence_id` form a
/// gap-free increasing sequence starting at 1, enforced by the writer; the
/// journal itself never renumbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEvent {
    /// The entity this event belongs to.
    pub persistence_id: String,
    /// Position of this event in the entity's journal (>= 1).
    pub sequence_nr: u64,
    /// Opaque serialized payload. The journal never inspects these bytes.
    pub payload: Vec<u8>,
    /// Hint for the caller's payload deserializer.
    #[serde(default)]
    pub manifest: String,
    /// Identity of the writer incarnation that produced this record.
    #[serde(default)]
    pub writer_id: String,
    /// Soft-deletion marker. Deleted records are skipped during replay and
    /// streaming but still occupy their sequence number.
    #[serde(default)]
    pub deleted: bool,
    /// Labels indexed at write time for cross-entity lookup.
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl JournalEvent {
    /// Create a record with an empty manifest, no writer id, and no tags.
    pub fn new(persistence_id: impl Into<String>, sequence_nr: u64, payload: Vec<u8>) -> Self {
        Self {
            persistence_id: persistence_id.into(),
            sequence_nr,
            payload,
            manifest: String::new(),
            writer_id: String::new(),
            deleted: false,
            tags: BTreeSet::new(),
        }
    }

    /// Set the payload manifest.
    #[must_use]
    pub fn with_manifest(mut self, manifest: impl Into<String>) -> Self {
        self.manifest = manifest.into();
        self
    }

    /// Set the writer identity.
    #[must_use]
    pub fn with_writer_id(mut self, writer_id: impl Into<String>) -> Self {
        self.writer_id = writer_id.into();
        self
    }

    /// Attach tags to be indexed at write time.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Generate a fresh writer identity (UUID v7, time-ordered).
pub fn generate_writer_id() -> String {
    Uuid::now_v7().to_string()
}

/// An event as delivered to a streaming query consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Stream offset. For per-entity streams this equals `sequence_nr`.
    pub offset: u64,
    /// The entity the event belongs to.
    pub persistence_id: String,
    /// Position of the event in the entity's journal.
    pub sequence_nr: u64,
    /// Opaque serialized payload.
    pub payload: Vec<u8>,
    /// Hint for the caller's payload deserializer.
    pub manifest: String,
}

impl From<&JournalEvent> for EventEnvelope {
    fn from(event: &JournalEvent) -> Self {
        Self {
            offset: event.sequence_nr,
            persistence_id: event.persistence_id.clone(),
            sequence_nr: event.sequence_nr,
            payload: event.payload.clone(),
            manifest: event.manifest.clone(),
        }
    }
}

/// A `(sequence_nr, persistence_id)` reference stored in a per-tag index
/// list.
///
/// Encoded as `"{sequence_nr}:{persistence_id}"`. Persistence ids may
/// themselves contain `:`; only the first separator is structural.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEntry {
    /// Sequence number of the tagged record.
    pub sequence_nr: u64,
    /// Entity the tagged record belongs to.
    pub persistence_id: String,
}

/// Error returned when a tag index entry does not match the expected
/// `"{sequence_nr}:{persistence_id}"` shape.
#[derive(Debug, thiserror::Error)]
#[error("malformed tag entry: {0:?}")]
pub struct TagEntryParseError(pub String);

impl TagEntry {
    /// Create a tag entry reference.
    pub fn new(sequence_nr: u64, persistence_id: impl Into<String>) -> Self {
        Self {
            sequence_nr,
            persistence_id: persistence_id.into(),
        }
    }

    /// Encode for storage in a tag index list.
    pub fn encode(&self) -> String {
        format!("{}:{}", self.sequence_nr, self.persistence_id)
    }

    /// Parse an entry previously produced by [`TagEntry::encode`].
    ///
    /// # Errors
    ///
    /// Returns [`TagEntryParseError`] if the separator is missing or the
    /// sequence number is not a valid integer.
    pub fn parse(raw: &str) -> Result<Self, TagEntryParseError> {
        let (seq, id) = raw
            .split_once(':')
            .ok_or_else(|| TagEntryParseError(raw.to_owned()))?;
        let sequence_nr = seq
            .parse::<u64>()
            .map_err(|_| TagEntryParseError(raw.to_owned()))?;
        Ok(Self {
            sequence_nr,
            persistence_id: id.to_owned(),
        })
    }
}
