//! Redis connection handle and typed store primitives.
//!
//! [`RedisPool`] wraps a [`fred::prelude::Client`] and exposes exactly the
//! primitives the journal is built from: sorted-set insert/range/remove,
//! string counters, set membership, cursor-paged set scans, list reads, and
//! channel publishing. The write path additionally builds MULTI/EXEC
//! transactions directly on the underlying [`Client`] via [`RedisPool::client`].

use fred::prelude::*;
use fred::types::CustomCommand;

use crate::config::StoreConfig;
use crate::error::DbError;
use crate::subscription::Subscription;

/// Cursor value that both starts a set scan and, when returned by a
/// non-initial step, marks it complete.
pub const SCAN_CURSOR_START: &str = "0";

/// Members requested per scan step.
const SCAN_PAGE_SIZE: u32 = 100;

/// Sorted-set score for a sequence number.
///
/// Sequence numbers stay far below 2^53, where `f64` is exact.
#[allow(clippy::cast_precision_loss)]
pub fn sequence_score(sequence_nr: u64) -> f64 {
    sequence_nr as f64
}

/// Connection handle to a Redis-compatible instance.
///
/// Cheap to clone; all clones share one multiplexed connection. Notification
/// subscriptions use their own connections, created per stream via
/// [`RedisPool::subscribe`].
#[derive(Clone)]
pub struct RedisPool {
    client: Client,
    config: Config,
    key_prefix: String,
    page_size: usize,
}

impl RedisPool {
    /// Connect using the given store configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL cannot be parsed.
    /// Returns [`DbError::Redis`] if the connection fails.
    pub async fn connect(store: &StoreConfig) -> Result<Self, DbError> {
        let mut config = Config::from_url(&store.redis_url)
            .map_err(|e| DbError::Config(format!("invalid Redis URL: {e}")))?;
        if let Some(database) = store.database {
            config.database = Some(database);
        }

        let client = Builder::from_config(config.clone()).build()?;
        client.init().await?;

        tracing::info!("Connected to Redis");
        Ok(Self {
            client,
            config,
            key_prefix: store.key_prefix.clone(),
            page_size: store.page_size,
        })
    }

    /// Prefix applied to every key and channel name.
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Configured maximum number of records per polling read.
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Return a reference to the underlying [`Client`].
    pub const fn client(&self) -> &Client {
        &self.client
    }

    // =========================================================================
    // Sorted sets -- journals and snapshots
    // =========================================================================

    /// Insert `member` into the sorted set at `key` with the given score.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Redis`] if the write fails.
    pub async fn sorted_insert(
        &self,
        key: &str,
        score: u64,
        member: &str,
    ) -> Result<(), DbError> {
        let _: () = self
            .client
            .zadd(key, None, None, false, false, (sequence_score(score), member))
            .await?;
        Ok(())
    }

    /// Read members with scores in `[from, to]`, ascending, up to `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Redis`] if the read fails (including a key of the
    /// wrong type, from external interference).
    pub async fn range_by_score(
        &self,
        key: &str,
        from: u64,
        to: u64,
        limit: usize,
    ) -> Result<Vec<String>, DbError> {
        let count = i64::try_from(limit).unwrap_or(i64::MAX);
        let members: Vec<String> = self
            .client
            .zrangebyscore(
                key,
                sequence_score(from),
                sequence_score(to),
                false,
                Some((0, count)),
            )
            .await?;
        Ok(members)
    }

    /// Read all members with scores in `(-inf, to]`, descending.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Redis`] if the read fails.
    pub async fn rev_range_by_score(&self, key: &str, to: u64) -> Result<Vec<String>, DbError> {
        let members: Vec<String> = self
            .client
            .zrevrangebyscore(key, sequence_score(to), f64::NEG_INFINITY, false, None)
            .await?;
        Ok(members)
    }

    /// Remove all members with scores in `(-inf, to]`. Returns the number
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Redis`] if the write fails.
    pub async fn remove_range_by_score(&self, key: &str, to: u64) -> Result<u64, DbError> {
        let removed: i64 = self
            .client
            .zremrangebyscore(key, f64::NEG_INFINITY, sequence_score(to))
            .await?;
        Ok(u64::try_from(removed).unwrap_or(0))
    }

    /// Remove the member with exactly the given score, if present.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Redis`] if the write fails.
    pub async fn remove_score(&self, key: &str, score: u64) -> Result<u64, DbError> {
        let removed: i64 = self
            .client
            .zremrangebyscore(key, sequence_score(score), sequence_score(score))
            .await?;
        Ok(u64::try_from(removed).unwrap_or(0))
    }

    // =========================================================================
    // Strings -- highest-sequence markers
    // =========================================================================

    /// Read an unsigned counter stored as a string, `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Malformed`] if the key holds something that is not
    /// a non-negative integer. Returns [`DbError::Redis`] if the read fails.
    pub async fn get_counter(&self, key: &str) -> Result<Option<u64>, DbError> {
        let value: Option<String> = self.client.get(key).await?;
        match value {
            None => Ok(None),
            Some(raw) => raw.parse::<u64>().map(Some).map_err(|e| DbError::Malformed {
                key: key.to_owned(),
                message: format!("not a sequence number: {e}"),
            }),
        }
    }

    // =========================================================================
    // Sets -- the identifier registry
    // =========================================================================

    /// Add `member` to the set at `key`. Returns `true` when this was a
    /// first-time insertion.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Redis`] if the write fails.
    pub async fn add_to_set(&self, key: &str, member: &str) -> Result<bool, DbError> {
        let added: i64 = self.client.sadd(key, member).await?;
        Ok(added == 1)
    }

    /// Whether `member` is in the set at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Redis`] if the read fails.
    pub async fn set_contains(&self, key: &str, member: &str) -> Result<bool, DbError> {
        let found: bool = self.client.sismember(key, member).await?;
        Ok(found)
    }

    /// Read one page of a cursor-based set scan.
    ///
    /// Start with [`SCAN_CURSOR_START`]; the scan is complete when a
    /// non-initial step hands that cursor back. Members may be returned more
    /// than once across a full scan, per the store's scan contract.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Redis`] if the scan step fails.
    pub async fn scan_set_page(
        &self,
        key: &str,
        cursor: &str,
    ) -> Result<(String, Vec<String>), DbError> {
        let command = CustomCommand::new_static("SSCAN", None::<u16>, false);
        let args: Vec<String> = vec![
            key.to_owned(),
            cursor.to_owned(),
            "MATCH".to_owned(),
            "*".to_owned(),
            "COUNT".to_owned(),
            SCAN_PAGE_SIZE.to_string(),
        ];
        let (next, members): (String, Vec<String>) = self.client.custom(command, args).await?;
        Ok((next, members))
    }

    // =========================================================================
    // Lists -- tag indexes
    // =========================================================================

    /// Read the full list at `key` in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Redis`] if the read fails.
    pub async fn list_entries(&self, key: &str) -> Result<Vec<String>, DbError> {
        let values: Vec<String> = self.client.lrange(key, 0, -1).await?;
        Ok(values)
    }

    // =========================================================================
    // Pub/sub -- wake-up channels
    // =========================================================================

    /// Publish a wake-up payload to a channel.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Redis`] if the publish fails.
    pub async fn publish(&self, channel: &str, payload: &str) -> Result<(), DbError> {
        let _: i64 = self.client.publish(channel, payload).await?;
        Ok(())
    }

    /// Open a dedicated subscriber connection bound to one channel.
    ///
    /// The subscription owns its connection; dropping it tears the
    /// subscription down without disturbing other streams.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Redis`] if connecting or subscribing fails.
    pub async fn subscribe(&self, channel: &str) -> Result<Subscription, DbError> {
        let subscriber = Builder::from_config(self.config.clone()).build_subscriber_client()?;
        subscriber.init().await?;
        subscriber.subscribe(channel).await?;
        tracing::debug!(channel, "Subscribed to notification channel");
        Ok(Subscription::new(subscriber, channel.to_owned()))
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Flush all keys from the instance.
    ///
    /// **WARNING:** This deletes all data. Only use for testing.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Redis`] if the flush fails.
    pub async fn flush_all(&self) -> Result<(), DbError> {
        let _: () = self.client.flushall(false).await?;
        Ok(())
    }
}
