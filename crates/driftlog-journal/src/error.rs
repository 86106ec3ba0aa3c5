//! Error types for the journal and its query engines.
//!
//! Store errors and internal-consistency violations are reported through
//! distinct variants: the former are environmental and terminal for the
//! affected operation or stream, the latter indicate an implementation bug.

use driftlog_db::DbError;

/// Errors that can occur in the write path, replay, or a query stream.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    /// The backing store failed, or held malformed data.
    #[error("store error: {0}")]
    Db(#[from] DbError),

    /// The write transaction did not commit. None of the batch's effects
    /// are visible; the caller decides whether to retry.
    #[error("write batch for '{persistence_id}' was not committed: {source}")]
    Rejected {
        /// Entity whose batch was rejected.
        persistence_id: String,
        /// The underlying transaction error.
        #[source]
        source: fred::error::Error,
    },

    /// A state machine transition was observed outside its valid source
    /// state. This is an implementation bug, not a transient condition,
    /// and fails the affected stream only.
    #[error("internal consistency violation: {0}")]
    Protocol(String),
}
