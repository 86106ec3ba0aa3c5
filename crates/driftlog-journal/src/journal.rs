//! Write path, replay reader, and truncation for entity journals.
//!
//! A batch of events for one entity is appended in a single MULTI/EXEC
//! transaction: the records themselves, their tag index entries, the
//! highest-sequence marker (once, after all records), and the identifier
//! registration either all land or none do. Wake-up signals are published
//! only after the transaction is visible.
//!
//! Batches for different entities are independent; serializing batches for
//! the *same* entity is the caller's contract (at most one in-flight writer
//! per entity).

use std::collections::BTreeSet;

use driftlog_db::{DbError, RedisPool, keys, sequence_score};
use driftlog_types::{JournalEvent, TagEntry};
use fred::prelude::*;

use crate::error::JournalError;

/// Write and replay operations on entity journals.
#[derive(Clone)]
pub struct Journal {
    pool: RedisPool,
}

impl Journal {
    /// Create a journal over the given connection.
    pub const fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    /// Return the underlying connection handle.
    pub const fn pool(&self) -> &RedisPool {
        &self.pool
    }

    /// Atomically append a batch of events for one entity.
    ///
    /// Appends every record to the entity's journal, inserts a tag index
    /// entry for every tag on every record, updates the highest-sequence
    /// marker to the batch's final sequence number, and registers the
    /// entity in the identifier set. After the transaction commits, one
    /// wake-up is published per affected channel: the per-entity channel
    /// once per record, the tag channel once per distinct tag touched, and
    /// the identifier channel only when the entity was previously unknown.
    ///
    /// An empty batch is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Rejected`] if the transaction did not
    /// commit; no partial effects are visible. Returns
    /// [`JournalError::Protocol`] if the batch mixes entities.
    pub async fn write_batch(&self, events: &[JournalEvent]) -> Result<(), JournalError> {
        let (Some(first), Some(last)) = (events.first(), events.last()) else {
            return Ok(());
        };
        let persistence_id = first.persistence_id.as_str();
        let highest = last.sequence_nr;

        let prefix = self.pool.key_prefix();
        let journal_key = keys::journal_key(prefix, persistence_id);
        let marker_key = keys::highest_sequence_nr_key(prefix, persistence_id);
        let identifiers_key = keys::identifiers_key(prefix);

        let tx = self.pool.client().multi();
        let mut tags_touched: BTreeSet<&str> = BTreeSet::new();
        for event in events {
            if event.persistence_id != persistence_id {
                return Err(JournalError::Protocol(format!(
                    "batch mixes entities '{persistence_id}' and '{}'",
                    event.persistence_id
                )));
            }
            let member = serde_json::to_string(event).map_err(DbError::from)?;
            let _: () = tx
                .zadd(
                    journal_key.as_str(),
                    None,
                    None,
                    false,
                    false,
                    (sequence_score(event.sequence_nr), member.as_str()),
                )
                .await
                .map_err(DbError::from)?;

            for tag in &event.tags {
                let entry = TagEntry::new(event.sequence_nr, persistence_id).encode();
                let _: () = tx
                    .rpush(keys::tag_key(prefix, tag).as_str(), entry.as_str())
                    .await
                    .map_err(DbError::from)?;
                tags_touched.insert(tag);
            }
        }
        let _: () = tx
            .set(
                marker_key.as_str(),
                highest.to_string().as_str(),
                None,
                None,
                false,
            )
            .await
            .map_err(DbError::from)?;
        let _: () = tx
            .sadd(identifiers_key.as_str(), persistence_id)
            .await
            .map_err(DbError::from)?;

        let results: Vec<Value> =
            tx.exec(true)
                .await
                .map_err(|source| JournalError::Rejected {
                    persistence_id: persistence_id.to_owned(),
                    source,
                })?;

        // The SADD reply is the last result; 1 marks a first-time
        // registration and gates the identifier announcement.
        let newly_registered = results.last().and_then(Value::as_i64) == Some(1);

        // The batch is durable from here on. Wake-ups are best-effort
        // signals; a publish failure must not report the write as failed.
        if let Err(error) = self
            .publish_wakeups(events, persistence_id, &tags_touched, newly_registered)
            .await
        {
            tracing::warn!(
                persistence_id,
                %error,
                "Batch committed but wake-up publishing failed"
            );
        }

        tracing::debug!(
            persistence_id,
            count = events.len(),
            highest,
            "Appended batch"
        );
        Ok(())
    }

    async fn publish_wakeups(
        &self,
        events: &[JournalEvent],
        persistence_id: &str,
        tags_touched: &BTreeSet<&str>,
        newly_registered: bool,
    ) -> Result<(), DbError> {
        let prefix = self.pool.key_prefix();
        let entity_channel = keys::journal_channel(prefix, persistence_id);
        for event in events {
            self.pool
                .publish(&entity_channel, &event.sequence_nr.to_string())
                .await?;
        }

        if !tags_touched.is_empty() {
            let tags_channel = keys::tags_channel(prefix);
            for tag in tags_touched {
                self.pool.publish(&tags_channel, tag).await?;
            }
        }

        if newly_registered {
            self.pool
                .publish(&keys::identifiers_channel(prefix), persistence_id)
                .await?;
        }
        Ok(())
    }

    /// Read the ordered sub-range of an entity's events with
    /// `from_sequence_nr <= seq <= to_sequence_nr`, up to `max` records.
    ///
    /// Soft-deleted records are filtered out before counting toward the
    /// result. Read-only, no side effects.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Db`] if a read fails or a stored record is
    /// malformed.
    pub async fn replay(
        &self,
        persistence_id: &str,
        from_sequence_nr: u64,
        to_sequence_nr: u64,
        max: usize,
    ) -> Result<Vec<JournalEvent>, JournalError> {
        let key = keys::journal_key(self.pool.key_prefix(), persistence_id);
        let mut recovered = Vec::new();
        let mut cursor = from_sequence_nr;

        while recovered.len() < max && cursor <= to_sequence_nr {
            let page = self
                .pool
                .range_by_score(&key, cursor, to_sequence_nr, self.pool.page_size())
                .await?;
            if page.is_empty() {
                break;
            }
            for raw in &page {
                let event: JournalEvent = serde_json::from_str(raw).map_err(DbError::from)?;
                cursor = event.sequence_nr.saturating_add(1);
                if event.deleted {
                    continue;
                }
                recovered.push(event);
                if recovered.len() >= max {
                    break;
                }
            }
        }

        tracing::debug!(
            persistence_id,
            from_sequence_nr,
            to_sequence_nr,
            recovered = recovered.len(),
            "Replayed journal range"
        );
        Ok(recovered)
    }

    /// Read the highest sequence number ever assigned to an entity, `0`
    /// when the entity is unknown. Survives truncation.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Db`] if the read fails or the marker is
    /// malformed.
    pub async fn highest_sequence_nr(&self, persistence_id: &str) -> Result<u64, JournalError> {
        let key = keys::highest_sequence_nr_key(self.pool.key_prefix(), persistence_id);
        Ok(self.pool.get_counter(&key).await?.unwrap_or(0))
    }

    /// Remove all of an entity's records with `seq <= to_sequence_nr`.
    ///
    /// Truncation works from the low end only and never creates gaps in
    /// the middle. The highest-sequence marker and the identifier
    /// registration are left intact. Tag index entries are not pruned;
    /// truncated entities may leave dangling tag references.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Db`] if the removal fails.
    pub async fn delete_to(
        &self,
        persistence_id: &str,
        to_sequence_nr: u64,
    ) -> Result<u64, JournalError> {
        let key = keys::journal_key(self.pool.key_prefix(), persistence_id);
        let removed = self.pool.remove_range_by_score(&key, to_sequence_nr).await?;
        tracing::debug!(persistence_id, to_sequence_nr, removed, "Truncated journal");
        Ok(removed)
    }
}
