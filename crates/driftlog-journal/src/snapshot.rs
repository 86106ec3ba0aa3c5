//! Snapshot persistence beside the journal.
//!
//! Snapshots are a plain key/value surface: one sorted set per entity,
//! scored by sequence number, each member a JSON snapshot entry. There is
//! no streaming and no notification; recovery reads the newest entry
//! matching its selection criteria and replays the journal from there.

use driftlog_db::{DbError, RedisPool, keys};
use driftlog_types::{SnapshotEntry, SnapshotSelection};

use crate::error::JournalError;

/// Save, load, and delete operations on entity snapshots.
#[derive(Clone)]
pub struct SnapshotStore {
    pool: RedisPool,
}

impl SnapshotStore {
    /// Create a snapshot store over the given connection.
    pub const fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    /// Store a snapshot entry for an entity. Saving again at the same
    /// sequence number replaces the earlier entry's score slot.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Db`] if serialization or the write fails.
    pub async fn save(
        &self,
        persistence_id: &str,
        entry: &SnapshotEntry,
    ) -> Result<(), JournalError> {
        let key = keys::snapshot_key(self.pool.key_prefix(), persistence_id);
        let member = serde_json::to_string(entry).map_err(DbError::from)?;
        self.pool
            .sorted_insert(&key, entry.sequence_nr, &member)
            .await?;
        tracing::debug!(
            persistence_id,
            sequence_nr = entry.sequence_nr,
            "Saved snapshot"
        );
        Ok(())
    }

    /// Load the newest snapshot satisfying the selection criteria, walking
    /// entries newest-first.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Db`] if a read fails or a stored entry is
    /// malformed.
    pub async fn load(
        &self,
        persistence_id: &str,
        selection: SnapshotSelection,
    ) -> Result<Option<SnapshotEntry>, JournalError> {
        let key = keys::snapshot_key(self.pool.key_prefix(), persistence_id);
        let members = self
            .pool
            .rev_range_by_score(&key, selection.max_sequence_nr)
            .await?;
        for raw in &members {
            let entry: SnapshotEntry = serde_json::from_str(raw).map_err(DbError::from)?;
            if selection.matches(&entry) {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Delete the snapshot stored at exactly the given sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Db`] if the removal fails.
    pub async fn delete(
        &self,
        persistence_id: &str,
        sequence_nr: u64,
    ) -> Result<(), JournalError> {
        let key = keys::snapshot_key(self.pool.key_prefix(), persistence_id);
        let _ = self.pool.remove_score(&key, sequence_nr).await?;
        Ok(())
    }

    /// Delete all snapshots with `sequence_nr <= to_sequence_nr`.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Db`] if the removal fails.
    pub async fn delete_to(
        &self,
        persistence_id: &str,
        to_sequence_nr: u64,
    ) -> Result<(), JournalError> {
        let key = keys::snapshot_key(self.pool.key_prefix(), persistence_id);
        let removed = self.pool.remove_range_by_score(&key, to_sequence_nr).await?;
        tracing::debug!(persistence_id, to_sequence_nr, removed, "Deleted snapshots");
        Ok(())
    }
}
