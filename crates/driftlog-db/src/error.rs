//! Error types for the store adapter layer.
//!
//! All errors are propagated via [`DbError`] which wraps the underlying
//! [`fred`] and [`serde_json`] errors. Store failures are terminal for the
//! operation or stream that observed them; nothing in this layer retries.

/// Errors that can occur in the store adapter layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A Redis operation or the connection itself failed.
    #[error("redis error: {0}")]
    Redis(#[from] fred::error::Error),

    /// A stored value could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A key held a value of an unexpected shape, typically from external
    /// interference with the keyspace.
    #[error("malformed value at {key}: {message}")]
    Malformed {
        /// The key holding the offending value.
        key: String,
        /// What was wrong with it.
        message: String,
    },

    /// A configuration value was invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// A notification subscription fell behind and dropped messages.
    #[error("subscription lagged, {0} messages dropped")]
    SubscriptionLagged(u64),

    /// A notification subscription's connection closed.
    #[error("subscription closed")]
    SubscriptionClosed,
}
