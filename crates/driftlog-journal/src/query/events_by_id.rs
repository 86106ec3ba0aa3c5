//! Live and current event streams over one entity's journal.
//!
//! The stream polls the journal in bounded pages and, in live mode, parks on
//! the entity's notification channel between polls. Wake-ups arriving while
//! a read is in flight are folded into the state machine concurrently with
//! the read, so a write landing mid-poll is never lost (see
//! [`super::state`]).

use async_stream::try_stream;
use driftlog_db::{DbError, RedisPool, Subscription, keys};
use driftlog_types::{EventEnvelope, JournalEvent};
use futures::Stream;

use crate::error::JournalError;
use crate::query::state::{EmptyReadAction, SourceState, WakeAction};

/// Stream the events of `persistence_id` with sequence numbers in
/// `[from_sequence_nr, to_sequence_nr]`, in non-decreasing order.
///
/// With `live` set, the stream keeps delivering new events as they are
/// appended, and stays open (silently, once the upper bound is drained)
/// until the consumer drops it; otherwise it terminates once the data
/// available at poll time is delivered.
pub(crate) fn events_stream(
    pool: RedisPool,
    persistence_id: String,
    from_sequence_nr: u64,
    to_sequence_nr: u64,
    live: bool,
) -> impl Stream<Item = Result<EventEnvelope, JournalError>> {
    try_stream! {
        let journal_key = keys::journal_key(pool.key_prefix(), &persistence_id);
        let page_size = pool.page_size().max(1);
        let page_span = u64::try_from(page_size).unwrap_or(u64::MAX).saturating_sub(1);

        // Live streams subscribe once, up front; the subscription lives
        // exactly as long as the stream and is torn down on drop whatever
        // state the machine is in.
        let mut subscription = if live {
            let channel = keys::journal_channel(pool.key_prefix(), &persistence_id);
            Some(pool.subscribe(&channel).await?)
        } else {
            None
        };

        let mut state = SourceState::Idle;
        let mut current = from_sequence_nr;

        'stream: loop {
            if current > to_sequence_nr {
                if !live {
                    break 'stream;
                }
                // A live stream holds its position at the upper bound:
                // nothing further can qualify, but the stream stays open
                // until the consumer drops it. Wake-ups while idle carry
                // no outstanding demand and are ignored.
                idle_until_dropped(subscription.as_mut(), &mut state).await?;
            }
            state.begin_query()?;
            let upper = current.saturating_add(page_span).min(to_sequence_nr);

            let page = 'poll: loop {
                let raw = read_page(
                    &pool,
                    subscription.as_mut(),
                    &mut state,
                    &journal_key,
                    current,
                    upper,
                    page_size,
                )
                .await?;
                if !raw.is_empty() {
                    break 'poll raw;
                }
                match state.empty_read(live)? {
                    EmptyReadAction::Requery => continue 'poll,
                    EmptyReadAction::Complete => break 'stream,
                    EmptyReadAction::AwaitWakeup => {
                        await_wakeup(subscription.as_mut(), &mut state).await?;
                        state.begin_query()?;
                        continue 'poll;
                    }
                }
            };

            state.events_ready()?;
            for raw in &page {
                let event: JournalEvent =
                    serde_json::from_str(raw).map_err(DbError::from)?;
                // Advance past every observed record, including skipped
                // ones, so no record is ever re-processed.
                let sequence_nr = event.sequence_nr;
                current = sequence_nr.saturating_add(1);
                if event.deleted || sequence_nr > to_sequence_nr {
                    continue;
                }
                yield EventEnvelope::from(&event);
            }
            // A page of only skipped records falls through and re-queries.
        }

        tracing::debug!(
            persistence_id = %persistence_id,
            live,
            "Event stream completed"
        );
    }
}

/// Run one bounded range read while concurrently folding wake-ups into the
/// state machine. Exactly one read is in flight at a time per stream.
async fn read_page(
    pool: &RedisPool,
    subscription: Option<&mut Subscription>,
    state: &mut SourceState,
    journal_key: &str,
    from: u64,
    to: u64,
    limit: usize,
) -> Result<Vec<String>, JournalError> {
    let read = pool.range_by_score(journal_key, from, to, limit);
    match subscription {
        None => Ok(read.await?),
        Some(sub) => {
            tokio::pin!(read);
            loop {
                tokio::select! {
                    result = &mut read => return Ok(result?),
                    wakeup = sub.recv() => {
                        // A lag gap also means "something may have
                        // changed"; both fold into the wake transition.
                        let _ = wakeup?;
                        let _ = state.wakeup();
                    }
                }
            }
        }
    }
}

/// Hold a drained live stream open without polling. Every wake-up is
/// applied to the machine and, from `Idle`, ignored; only a subscription
/// failure (or the consumer dropping the stream) ends the wait.
async fn idle_until_dropped(
    subscription: Option<&mut Subscription>,
    state: &mut SourceState,
) -> Result<(), JournalError> {
    let Some(sub) = subscription else {
        return Err(JournalError::Protocol(
            "idling on wake-ups without an active subscription".to_owned(),
        ));
    };
    loop {
        let _ = sub.recv().await?;
        let _ = state.wakeup();
    }
}

/// Park until a wake-up moves the machine out of `WaitingForNotification`.
async fn await_wakeup(
    subscription: Option<&mut Subscription>,
    state: &mut SourceState,
) -> Result<(), JournalError> {
    let Some(sub) = subscription else {
        return Err(JournalError::Protocol(
            "waiting for a wake-up without an active subscription".to_owned(),
        ));
    };
    loop {
        let _ = sub.recv().await?;
        if state.wakeup() == WakeAction::Requery {
            return Ok(());
        }
    }
}
