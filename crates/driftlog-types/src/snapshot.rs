//! Snapshot entries and the criteria used to select one during recovery.
//!
//! Snapshots are a plain read-modify-write surface beside the journal: one
//! entry per (entity, sequence number), no streaming and no notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored snapshot of one entity's state at a given sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// The journal position this snapshot covers (events up to and
    /// including this sequence number are folded into it).
    pub sequence_nr: u64,
    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,
    /// Opaque serialized state.
    pub payload: Vec<u8>,
}

impl SnapshotEntry {
    /// Create a snapshot entry stamped with the current time.
    pub fn new(sequence_nr: u64, payload: Vec<u8>) -> Self {
        Self {
            sequence_nr,
            created_at: Utc::now(),
            payload,
        }
    }
}

/// Criteria for picking a snapshot during recovery.
///
/// The newest entry satisfying both bounds wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotSelection {
    /// Upper bound (inclusive) on the snapshot's sequence number.
    pub max_sequence_nr: u64,
    /// Optional upper bound (inclusive) on the snapshot's timestamp.
    pub max_timestamp: Option<DateTime<Utc>>,
}

impl SnapshotSelection {
    /// Select the newest snapshot regardless of position or age.
    pub const fn latest() -> Self {
        Self {
            max_sequence_nr: u64::MAX,
            max_timestamp: None,
        }
    }

    /// Select the newest snapshot at or below the given sequence number.
    pub const fn up_to(max_sequence_nr: u64) -> Self {
        Self {
            max_sequence_nr,
            max_timestamp: None,
        }
    }

    /// Whether the given entry satisfies both bounds.
    pub fn matches(&self, entry: &SnapshotEntry) -> bool {
        entry.sequence_nr <= self.max_sequence_nr
            && self.max_timestamp.is_none_or(|bound| entry.created_at <= bound)
    }
}

impl Default for SnapshotSelection {
    fn default() -> Self {
        Self::latest()
    }
}
