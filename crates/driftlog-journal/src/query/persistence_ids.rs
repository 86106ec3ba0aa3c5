//! Enumeration of the known persistence identifiers.
//!
//! The "current" stream walks the identifier set with a resumable cursor
//! scan and terminates when the cursor wraps back to its start sentinel.
//! The "live" stream seeds itself with a full scan and then delivers each
//! new-identifier wake-up payload directly; the payload *is* the new
//! identifier, so no re-scan is needed.

use async_stream::try_stream;
use driftlog_db::{DbError, RedisPool, SCAN_CURSOR_START, Wakeup, keys};
use futures::Stream;

use crate::error::JournalError;

/// Stream every identifier currently in the set, then terminate.
///
/// Each page is read on demand: the next scan step is issued only when the
/// previous page is drained and the cursor has not wrapped. Terminates even
/// with zero identifiers present.
pub(crate) fn current_ids_stream(
    pool: RedisPool,
) -> impl Stream<Item = Result<String, JournalError>> {
    try_stream! {
        let key = keys::identifiers_key(pool.key_prefix());
        let mut cursor = SCAN_CURSOR_START.to_owned();
        loop {
            let (next, members) = pool.scan_set_page(&key, &cursor).await?;
            for id in members {
                yield id;
            }
            if next == SCAN_CURSOR_START {
                break;
            }
            cursor = next;
        }
        tracing::debug!("Identifier enumeration completed");
    }
}

/// Stream the known identifiers, then keep delivering new ones as they are
/// registered, until the consumer drops the stream.
///
/// Identifiers may appear several times: once from the seed scan and again
/// from the live phase, or repeatedly per the scan contract. Deduplication
/// is the consumer's concern.
pub(crate) fn live_ids_stream(
    pool: RedisPool,
) -> impl Stream<Item = Result<String, JournalError>> {
    try_stream! {
        // Subscribe before seeding so an identifier registered mid-scan is
        // not missed; the consumer tolerates the resulting duplicates.
        let channel = keys::identifiers_channel(pool.key_prefix());
        let mut subscription = pool.subscribe(&channel).await?;

        let key = keys::identifiers_key(pool.key_prefix());
        let mut cursor = SCAN_CURSOR_START.to_owned();
        loop {
            let (next, members) = pool.scan_set_page(&key, &cursor).await?;
            for id in members {
                yield id;
            }
            if next == SCAN_CURSOR_START {
                break;
            }
            cursor = next;
        }

        loop {
            let id = identifier_from(subscription.recv().await?)?;
            yield id;
        }
    }
}

/// A live identifier stream cannot survive a subscription gap: the dropped
/// payloads were the identifiers themselves, and only a fresh seed scan
/// (a restarted stream) can recover them.
fn identifier_from(wakeup: Wakeup) -> Result<String, JournalError> {
    match wakeup {
        Wakeup::Message(id) => Ok(id),
        Wakeup::Lagged(skipped) => Err(DbError::SubscriptionLagged(skipped).into()),
    }
}
