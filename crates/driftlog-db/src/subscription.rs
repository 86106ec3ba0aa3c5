//! Per-stream notification channel subscriptions.
//!
//! Wake-up channels carry no delivery guarantee beyond "something changed".
//! Each streaming query owns one [`Subscription`] on its own connection, so
//! stopping a stream tears its subscription down without touching siblings.

use fred::clients::SubscriberClient;
use fred::prelude::*;
use fred::types::Message;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;

use crate::error::DbError;

/// A wake-up received from a notification channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wakeup {
    /// A message arrived on the subscribed channel, with its payload.
    Message(String),
    /// The receiver fell behind; this many messages were dropped. Callers
    /// decide whether a gap is survivable (a pure wake-up signal) or not
    /// (a payload-carrying channel).
    Lagged(u64),
}

/// A live subscription to one notification channel.
///
/// Dropping the subscription closes its connection, which unsubscribes
/// server-side.
pub struct Subscription {
    client: Option<SubscriberClient>,
    receiver: Receiver<Message>,
    channel: String,
}

impl Subscription {
    pub(crate) fn new(client: SubscriberClient, channel: String) -> Self {
        let receiver = client.message_rx();
        Self {
            client: Some(client),
            receiver,
            channel,
        }
    }

    /// The channel this subscription listens on.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Wait for the next wake-up on this subscription's channel.
    ///
    /// Messages for other channels that happen to share the connection are
    /// skipped. Cancel-safe: a wake-up is only consumed when this future
    /// completes.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::SubscriptionClosed`] when the connection is gone.
    pub async fn recv(&mut self) -> Result<Wakeup, DbError> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => {
                    if message.channel.to_string() != self.channel {
                        continue;
                    }
                    let payload = message.value.convert::<String>().unwrap_or_default();
                    return Ok(Wakeup::Message(payload));
                }
                Err(RecvError::Lagged(skipped)) => return Ok(Wakeup::Lagged(skipped)),
                Err(RecvError::Closed) => return Err(DbError::SubscriptionClosed),
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            // Teardown is fire-and-forget; closing the connection
            // unsubscribes server-side.
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    let _ = client.quit().await;
                });
            }
        }
    }
}
