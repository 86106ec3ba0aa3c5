//! Integration tests for the journal and its query streams.
//!
//! These tests require a live Redis-compatible instance. Run with:
//!
//! ```bash
//! docker run --rm -d -p 6379:6379 --name driftlog-redis redis:7
//! cargo test -p driftlog-journal -- --ignored
//! docker stop driftlog-redis
//! ```
//!
//! All tests are marked `#[ignore]` so they are skipped during normal
//! `cargo test` runs. Each test works in its own key prefix, so the suite
//! is safe to run in parallel against a shared instance without flushing.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::too_many_lines
)]

use std::time::Duration;

use driftlog_db::{RedisPool, StoreConfig, keys};
use driftlog_journal::{Journal, JournalError, ReadJournal, SnapshotStore};
use driftlog_types::{JournalEvent, SnapshotEntry, SnapshotSelection, generate_writer_id};
use futures::StreamExt;
use tokio::time::timeout;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Redis connection URL for the local instance.
const REDIS_URL: &str = "redis://localhost:6379";

/// How long to wait for a delivery that must happen.
const DELIVERY: Duration = Duration::from_secs(5);

/// How long to wait before concluding a delivery must not happen.
const SILENCE: Duration = Duration::from_millis(400);

fn unique_prefix() -> String {
    format!("test:{}:", Uuid::now_v7().simple())
}

async fn connect(prefix: &str) -> RedisPool {
    // Idempotent; only the first test in the process wins.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();

    let config = StoreConfig {
        redis_url: REDIS_URL.to_owned(),
        database: None,
        key_prefix: prefix.to_owned(),
        page_size: 100,
    };
    RedisPool::connect(&config)
        .await
        .expect("Failed to connect to Redis -- is it running?")
}

fn event(persistence_id: &str, sequence_nr: u64, payload: &[u8]) -> JournalEvent {
    JournalEvent::new(persistence_id, sequence_nr, payload.to_vec())
        .with_writer_id(generate_writer_id())
}

// =============================================================================
// Write path and replay
// =============================================================================

#[tokio::test]
#[ignore = "requires live Redis instance"]
async fn write_batch_then_replay_returns_records_in_order() {
    let pool = connect(&unique_prefix()).await;
    let journal = Journal::new(pool);

    let batch = vec![
        event("a", 1, b"one"),
        event("a", 2, b"two"),
        event("a", 3, b"three"),
    ];
    journal.write_batch(&batch).await.expect("write failed");

    let recovered = journal.replay("a", 1, 3, 10).await.expect("replay failed");
    assert_eq!(recovered.len(), 3);
    let sequences: Vec<u64> = recovered.iter().map(|e| e.sequence_nr).collect();
    assert_eq!(sequences, vec![1, 2, 3]);
    let payloads: Vec<&[u8]> = recovered.iter().map(|e| e.payload.as_slice()).collect();
    assert_eq!(payloads, vec![b"one".as_slice(), b"two", b"three"]);

    let highest = journal
        .highest_sequence_nr("a")
        .await
        .expect("marker read failed");
    assert_eq!(highest, 3);
}

#[tokio::test]
#[ignore = "requires live Redis instance"]
async fn replay_respects_bounds_and_max() {
    let pool = connect(&unique_prefix()).await;
    let journal = Journal::new(pool);

    let batch: Vec<JournalEvent> = (1..=10).map(|n| event("b", n, b"x")).collect();
    journal.write_batch(&batch).await.expect("write failed");

    let middle = journal.replay("b", 3, 7, 100).await.expect("replay failed");
    let sequences: Vec<u64> = middle.iter().map(|e| e.sequence_nr).collect();
    assert_eq!(sequences, vec![3, 4, 5, 6, 7]);

    let capped = journal.replay("b", 1, 10, 4).await.expect("replay failed");
    let sequences: Vec<u64> = capped.iter().map(|e| e.sequence_nr).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4]);
}

#[tokio::test]
#[ignore = "requires live Redis instance"]
async fn replay_filters_deleted_records_before_counting() {
    let pool = connect(&unique_prefix()).await;
    let journal = Journal::new(pool);

    let mut second = event("c", 2, b"gone");
    second.deleted = true;
    let batch = vec![
        event("c", 1, b"one"),
        second,
        event("c", 3, b"three"),
        event("c", 4, b"four"),
    ];
    journal.write_batch(&batch).await.expect("write failed");

    // The deleted record must not count toward the max: asking for two
    // records from sequence 1 yields 1 and 3, not 1 alone.
    let recovered = journal.replay("c", 1, 4, 2).await.expect("replay failed");
    let sequences: Vec<u64> = recovered.iter().map(|e| e.sequence_nr).collect();
    assert_eq!(sequences, vec![1, 3]);
}

#[tokio::test]
#[ignore = "requires live Redis instance"]
async fn empty_batch_is_a_noop() {
    let pool = connect(&unique_prefix()).await;
    let journal = Journal::new(pool);

    journal.write_batch(&[]).await.expect("empty batch failed");
    assert_eq!(journal.highest_sequence_nr("nobody").await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires live Redis instance"]
async fn mixed_entity_batch_is_rejected() {
    let pool = connect(&unique_prefix()).await;
    let journal = Journal::new(pool);

    let batch = vec![event("left", 1, b"x"), event("right", 1, b"y")];
    let result = journal.write_batch(&batch).await;
    assert!(matches!(result, Err(JournalError::Protocol(_))));
}

#[tokio::test]
#[ignore = "requires live Redis instance"]
async fn truncation_keeps_upper_range_and_marker() {
    let pool = connect(&unique_prefix()).await;
    let journal = Journal::new(pool);

    let batch: Vec<JournalEvent> = (1..=6).map(|n| event("t", n, b"x")).collect();
    journal.write_batch(&batch).await.expect("write failed");

    let removed = journal.delete_to("t", 4).await.expect("truncate failed");
    assert_eq!(removed, 4);

    let remaining = journal.replay("t", 1, 6, 100).await.expect("replay failed");
    let sequences: Vec<u64> = remaining.iter().map(|e| e.sequence_nr).collect();
    assert_eq!(sequences, vec![5, 6]);

    // Recovery still knows where the journal left off.
    assert_eq!(journal.highest_sequence_nr("t").await.unwrap(), 6);
}

#[tokio::test]
#[ignore = "requires live Redis instance"]
async fn tag_index_entries_are_recorded() {
    let prefix = unique_prefix();
    let pool = connect(&prefix).await;
    let journal = Journal::new(pool.clone());

    let tagged = event("device-1", 1, b"up").with_tags(["green", "audit"]);
    journal.write_batch(&[tagged]).await.expect("write failed");

    let entries = pool
        .list_entries(&keys::tag_key(&prefix, "green"))
        .await
        .expect("tag read failed");
    assert_eq!(entries, vec!["1:device-1".to_owned()]);

    let entries = pool
        .list_entries(&keys::tag_key(&prefix, "audit"))
        .await
        .expect("tag read failed");
    assert_eq!(entries, vec!["1:device-1".to_owned()]);
}

// =============================================================================
// Event streams
// =============================================================================

#[tokio::test]
#[ignore = "requires live Redis instance"]
async fn current_stream_drains_and_completes() {
    let pool = connect(&unique_prefix()).await;
    let journal = Journal::new(pool.clone());
    let read = ReadJournal::new(pool);

    let batch: Vec<JournalEvent> = (1..=5).map(|n| event("e", n, b"x")).collect();
    journal.write_batch(&batch).await.expect("write failed");

    let mut stream = read.current_events_by_persistence_id("e", 1, u64::MAX);
    let mut sequences = Vec::new();
    while let Some(item) = stream.next().await {
        sequences.push(item.expect("stream failed").sequence_nr);
    }
    assert_eq!(sequences, vec![1, 2, 3, 4, 5]);

    // Once complete the stream stays complete, even after new writes.
    journal
        .write_batch(&[event("e", 6, b"late")])
        .await
        .expect("write failed");
    assert!(stream.next().await.is_none());
}

#[tokio::test]
#[ignore = "requires live Redis instance"]
async fn current_stream_respects_upper_bound() {
    let pool = connect(&unique_prefix()).await;
    let journal = Journal::new(pool.clone());
    let read = ReadJournal::new(pool);

    let batch: Vec<JournalEvent> = (1..=5).map(|n| event("f", n, b"x")).collect();
    journal.write_batch(&batch).await.expect("write failed");

    let mut stream = read.current_events_by_persistence_id("f", 2, 4);
    let mut sequences = Vec::new();
    while let Some(item) = stream.next().await {
        sequences.push(item.expect("stream failed").sequence_nr);
    }
    assert_eq!(sequences, vec![2, 3, 4]);
}

#[tokio::test]
#[ignore = "requires live Redis instance"]
async fn current_stream_skips_deleted_records() {
    let pool = connect(&unique_prefix()).await;
    let journal = Journal::new(pool.clone());
    let read = ReadJournal::new(pool);

    let mut second = event("g", 2, b"gone");
    second.deleted = true;
    journal
        .write_batch(&[event("g", 1, b"one"), second, event("g", 3, b"three")])
        .await
        .expect("write failed");

    let mut stream = read.current_events_by_persistence_id("g", 1, u64::MAX);
    let mut sequences = Vec::new();
    while let Some(item) = stream.next().await {
        sequences.push(item.expect("stream failed").sequence_nr);
    }
    assert_eq!(sequences, vec![1, 3]);
}

#[tokio::test]
#[ignore = "requires live Redis instance"]
async fn live_stream_delivers_event_written_after_start() {
    let pool = connect(&unique_prefix()).await;
    let journal = Journal::new(pool.clone());
    let read = ReadJournal::new(pool);

    // Entity "d" has no history. Start the stream first.
    let mut stream = read.events_by_persistence_id("d", 1, u64::MAX);

    // Drive the stream once: it subscribes, polls, finds nothing, parks.
    assert!(
        timeout(SILENCE, stream.next()).await.is_err(),
        "stream must block while the journal is empty"
    );

    journal
        .write_batch(&[event("d", 1, b"first")])
        .await
        .expect("write failed");

    // The wake-up alone must resume delivery; no new request is issued.
    let envelope = timeout(DELIVERY, stream.next())
        .await
        .expect("delivery timed out")
        .expect("stream ended")
        .expect("stream failed");
    assert_eq!(envelope.sequence_nr, 1);
    assert_eq!(envelope.persistence_id, "d");
    assert_eq!(envelope.payload, b"first".to_vec());

    // Exactly one event was delivered; the stream blocks again until the
    // next write.
    assert!(timeout(SILENCE, stream.next()).await.is_err());
}

#[tokio::test]
#[ignore = "requires live Redis instance"]
async fn live_stream_delivers_history_then_tail() {
    let pool = connect(&unique_prefix()).await;
    let journal = Journal::new(pool.clone());
    let read = ReadJournal::new(pool);

    journal
        .write_batch(&[event("h", 1, b"old-1"), event("h", 2, b"old-2")])
        .await
        .expect("write failed");

    let mut stream = read.events_by_persistence_id("h", 1, u64::MAX);
    for expected in [1, 2] {
        let envelope = timeout(DELIVERY, stream.next())
            .await
            .expect("delivery timed out")
            .expect("stream ended")
            .expect("stream failed");
        assert_eq!(envelope.sequence_nr, expected);
    }

    journal
        .write_batch(&[event("h", 3, b"new-3")])
        .await
        .expect("write failed");
    let envelope = timeout(DELIVERY, stream.next())
        .await
        .expect("delivery timed out")
        .expect("stream ended")
        .expect("stream failed");
    assert_eq!(envelope.sequence_nr, 3);
}

#[tokio::test]
#[ignore = "requires live Redis instance"]
async fn live_stream_stays_open_at_upper_bound() {
    let pool = connect(&unique_prefix()).await;
    let journal = Journal::new(pool.clone());
    let read = ReadJournal::new(pool);

    journal
        .write_batch(&[event("i", 1, b"x"), event("i", 2, b"y")])
        .await
        .expect("write failed");

    let mut stream = read.events_by_persistence_id("i", 1, 2);
    for expected in [1, 2] {
        let envelope = timeout(DELIVERY, stream.next())
            .await
            .expect("delivery timed out")
            .expect("stream ended")
            .expect("stream failed");
        assert_eq!(envelope.sequence_nr, expected);
    }

    // The bound is drained but the stream is live: it stays open and
    // silent, even across further writes, until the consumer drops it.
    journal
        .write_batch(&[event("i", 3, b"z")])
        .await
        .expect("write failed");
    assert!(timeout(SILENCE, stream.next()).await.is_err());
}

// =============================================================================
// Identifier streams
// =============================================================================

#[tokio::test]
#[ignore = "requires live Redis instance"]
async fn current_ids_terminates_on_empty_set() {
    let pool = connect(&unique_prefix()).await;
    let read = ReadJournal::new(pool);

    let mut stream = read.current_persistence_ids();
    assert!(stream.next().await.is_none());
}

#[tokio::test]
#[ignore = "requires live Redis instance"]
async fn current_ids_returns_each_identifier_exactly_once() {
    let pool = connect(&unique_prefix()).await;
    let journal = Journal::new(pool.clone());
    let read = ReadJournal::new(pool);

    for id in ["alpha", "beta", "gamma"] {
        journal
            .write_batch(&[event(id, 1, b"x")])
            .await
            .expect("write failed");
    }

    let mut stream = read.current_persistence_ids();
    let mut ids = Vec::new();
    while let Some(item) = stream.next().await {
        ids.push(item.expect("stream failed"));
    }
    ids.sort_unstable();
    assert_eq!(ids, vec!["alpha", "beta", "gamma"]);
}

#[tokio::test]
#[ignore = "requires live Redis instance"]
async fn live_ids_announces_new_identifiers_once() {
    let pool = connect(&unique_prefix()).await;
    let journal = Journal::new(pool.clone());
    let read = ReadJournal::new(pool);

    journal
        .write_batch(&[event("seeded", 1, b"x")])
        .await
        .expect("write failed");

    let mut stream = read.persistence_ids();

    // Seed phase: the known set.
    let seeded = timeout(DELIVERY, stream.next())
        .await
        .expect("seed timed out")
        .expect("stream ended")
        .expect("stream failed");
    assert_eq!(seeded, "seeded");
    assert!(timeout(SILENCE, stream.next()).await.is_err());

    // A first write for a new entity announces its identifier.
    journal
        .write_batch(&[event("fresh", 1, b"x")])
        .await
        .expect("write failed");
    let announced = timeout(DELIVERY, stream.next())
        .await
        .expect("announcement timed out")
        .expect("stream ended")
        .expect("stream failed");
    assert_eq!(announced, "fresh");

    // A second write to the same entity must not announce again.
    journal
        .write_batch(&[event("fresh", 2, b"y")])
        .await
        .expect("write failed");
    assert!(timeout(SILENCE, stream.next()).await.is_err());
}

// =============================================================================
// Snapshot store
// =============================================================================

#[tokio::test]
#[ignore = "requires live Redis instance"]
async fn snapshot_save_load_and_delete() {
    let pool = connect(&unique_prefix()).await;
    let store = SnapshotStore::new(pool);

    for sequence_nr in [10, 20, 30] {
        store
            .save("s", &SnapshotEntry::new(sequence_nr, vec![1]))
            .await
            .expect("save failed");
    }

    let latest = store
        .load("s", SnapshotSelection::latest())
        .await
        .expect("load failed")
        .expect("no snapshot found");
    assert_eq!(latest.sequence_nr, 30);

    let bounded = store
        .load("s", SnapshotSelection::up_to(25))
        .await
        .expect("load failed")
        .expect("no snapshot found");
    assert_eq!(bounded.sequence_nr, 20);

    store.delete("s", 30).await.expect("delete failed");
    let after_delete = store
        .load("s", SnapshotSelection::latest())
        .await
        .expect("load failed")
        .expect("no snapshot found");
    assert_eq!(after_delete.sequence_nr, 20);

    store.delete_to("s", 20).await.expect("delete_to failed");
    assert!(
        store
            .load("s", SnapshotSelection::latest())
            .await
            .expect("load failed")
            .is_none()
    );
}
