//! State machine for the per-entity event stream source.
//!
//! The stream reconciles three asynchronous facts without locks: a consumer
//! pulling at its own pace, a writer appending concurrently, and a
//! best-effort wake-up channel that can race with an in-flight read. The
//! `NotifiedWhenQuerying` state closes the race window between "read came
//! back empty" and "a wake-up for a write that landed during the read was
//! dropped": without it, a live stream could stall forever after a write
//! that lands between issuing and completing a poll.
//!
//! Transitions are pure; the stream owns its state exclusively, so no two
//! transitions are ever evaluated concurrently.

use crate::error::JournalError;

/// States of an event stream source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SourceState {
    /// No read in flight and no wake-up pending.
    Idle,
    /// A bounded range read is outstanding.
    Querying,
    /// A wake-up arrived while a read was outstanding. If that read comes
    /// back empty, re-query immediately instead of waiting.
    NotifiedWhenQuerying,
    /// A read returned nothing and the stream is live: wait for a wake-up
    /// before polling again. Only valid with an empty buffer.
    WaitingForNotification,
}

/// What the stream should do after a wake-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WakeAction {
    /// No outstanding demand; nothing to do.
    Ignore,
    /// A read is outstanding; the flag is recorded for when it completes.
    Noted,
    /// The stream was waiting on this wake-up; query again now.
    Requery,
}

/// What the stream should do after a read came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EmptyReadAction {
    /// A wake-up raced the read; a concurrent write may have landed after
    /// the read started. Query again immediately.
    Requery,
    /// Live stream: park until the next wake-up.
    AwaitWakeup,
    /// Current stream: all available data was delivered.
    Complete,
}

impl SourceState {
    /// Issue a bounded read: `Idle` -> `Querying`.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Protocol`] from any other state.
    pub(crate) fn begin_query(&mut self) -> Result<(), JournalError> {
        if *self == Self::Idle {
            *self = Self::Querying;
            Ok(())
        } else {
            Err(JournalError::Protocol(format!(
                "query issued in state {self:?}"
            )))
        }
    }

    /// Apply a wake-up from the entity's notification channel. Total over
    /// all states; a wake-up is never a protocol violation.
    pub(crate) fn wakeup(&mut self) -> WakeAction {
        match self {
            Self::Idle => WakeAction::Ignore,
            Self::Querying => {
                *self = Self::NotifiedWhenQuerying;
                WakeAction::Noted
            }
            Self::NotifiedWhenQuerying => WakeAction::Noted,
            Self::WaitingForNotification => {
                *self = Self::Idle;
                WakeAction::Requery
            }
        }
    }

    /// Apply an empty read completion.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Protocol`] when no read was outstanding.
    pub(crate) fn empty_read(&mut self, live: bool) -> Result<EmptyReadAction, JournalError> {
        match self {
            Self::NotifiedWhenQuerying => {
                *self = Self::Querying;
                Ok(EmptyReadAction::Requery)
            }
            Self::Querying if live => {
                *self = Self::WaitingForNotification;
                Ok(EmptyReadAction::AwaitWakeup)
            }
            Self::Querying => Ok(EmptyReadAction::Complete),
            Self::Idle | Self::WaitingForNotification => Err(JournalError::Protocol(format!(
                "read completed in state {self:?}"
            ))),
        }
    }

    /// Apply a non-empty read completion: back to `Idle`, buffer filled.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Protocol`] when no read was outstanding.
    pub(crate) fn events_ready(&mut self) -> Result<(), JournalError> {
        match self {
            Self::Querying | Self::NotifiedWhenQuerying => {
                *self = Self::Idle;
                Ok(())
            }
            Self::Idle | Self::WaitingForNotification => Err(JournalError::Protocol(format!(
                "read completed in state {self:?}"
            ))),
        }
    }
}
