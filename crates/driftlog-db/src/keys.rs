//! Key and channel naming for the journal keyspace.
//!
//! Every name is parameterized by a configurable prefix so that several
//! journals can share one logical database. The scheme is:
//!
//! | Name | Kind | Holds |
//! |------|------|-------|
//! | `{p}journal:persisted:{id}` | sorted set | entity journal, score = sequence nr |
//! | `{p}journal:persisted:{id}:highestSequenceNr` | string | highest sequence marker |
//! | `{p}journal:persistenceIds` | set | all known persistence ids |
//! | `{p}journal:tag:{tag}` | list | tag index entries |
//! | `{p}snapshot:{id}` | sorted set | snapshot entries, score = sequence nr |
//! | `{p}journal:channel:persisted:{id}` | channel | per-entity event wake-ups |
//! | `{p}journal:channel:tags` | channel | tag activity wake-ups |
//! | `{p}journal:channel:ids` | channel | new-identifier wake-ups |

/// Sorted-set key holding one entity's journal.
pub fn journal_key(prefix: &str, persistence_id: &str) -> String {
    format!("{prefix}journal:persisted:{persistence_id}")
}

/// String key holding the highest sequence number ever assigned to an
/// entity. Survives journal truncation.
pub fn highest_sequence_nr_key(prefix: &str, persistence_id: &str) -> String {
    format!("{prefix}journal:persisted:{persistence_id}:highestSequenceNr")
}

/// Set key holding every persistence id that has received at least one
/// write.
pub fn identifiers_key(prefix: &str) -> String {
    format!("{prefix}journal:persistenceIds")
}

/// List key holding the index entries for one tag.
pub fn tag_key(prefix: &str, tag: &str) -> String {
    format!("{prefix}journal:tag:{tag}")
}

/// Sorted-set key holding one entity's snapshots.
pub fn snapshot_key(prefix: &str, persistence_id: &str) -> String {
    format!("{prefix}snapshot:{persistence_id}")
}

/// Channel announcing new events for one entity.
pub fn journal_channel(prefix: &str, persistence_id: &str) -> String {
    format!("{prefix}journal:channel:persisted:{persistence_id}")
}

/// Channel announcing activity on any tag.
pub fn tags_channel(prefix: &str) -> String {
    format!("{prefix}journal:channel:tags")
}

/// Channel announcing first-time identifier registrations.
pub fn identifiers_channel(prefix: &str) -> String {
    format!("{prefix}journal:channel:ids")
}
