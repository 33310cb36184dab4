//! NATS Subscriber implementation
//!
//! Each `subscribe` call binds the configured durable pull consumer and
//! fetches a single message.

use crate::client::{NatsClient, BACKEND};
use crate::error::{NatsError, Result};
use crate::jetstream::{JetStreamMessage, PullSubscription};
use crate::metrics::{SUBSCRIBE_SUCCESS_COUNT, SUBSCRIBE_TOTAL_COUNT};
use crate::pubsub::{Message, Subscriber};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;

/// Future returned by a [`FetchFn`]
pub type FetchFuture = BoxFuture<'static, Result<Vec<JetStreamMessage>>>;

/// Strategy for pulling a batch from a bound consumer: `(subscription, batch, max_wait)`
pub type FetchFn =
    Arc<dyn Fn(Arc<dyn PullSubscription>, usize, Duration) -> FetchFuture + Send + Sync>;

/// Fetch straight from the subscription
pub fn default_fetch_fn() -> FetchFn {
    Arc::new(
        |subscription: Arc<dyn PullSubscription>, batch: usize, max_wait: Duration| -> FetchFuture {
            Box::pin(async move { subscription.fetch(batch, max_wait).await })
        },
    )
}

impl From<JetStreamMessage> for Message {
    fn from(msg: JetStreamMessage) -> Self {
        let message = Message::new(msg.subject, msg.payload.to_vec()).with_metadata(msg.headers);
        match msg.committer {
            Some(committer) => message.with_committer(committer),
            None => message,
        }
    }
}

#[async_trait]
impl Subscriber for NatsClient {
    async fn subscribe(&self, topic: &str) -> Result<Option<Message>> {
        let consumer = self.config.consumer.as_str();
        let labels = [("stream", topic), ("consumer", consumer)];

        self.metrics.increment_counter(SUBSCRIBE_TOTAL_COUNT, &labels);

        if topic.is_empty() {
            let err = NatsError::SubscriberNotConfigured;
            tracing::error!("can't subscribe: {}", err);
            return Err(err);
        }

        let subscription = match self
            .jetstream
            .pull_subscribe(topic, consumer, self.config.max_deliver)
            .await
        {
            Ok(subscription) => subscription,
            Err(e) => {
                let err = NatsError::Consumer(e.to_string());
                tracing::error!(topic = %topic, consumer = %consumer, "{}", err);
                return Err(err);
            }
        };

        // Guard is released before the fetch goes out.
        let fetch = self.fetch_fn.read().await.clone();

        let messages = fetch(subscription, 1, self.config.max_wait())
            .await
            .map_err(|e| {
                let err = NatsError::Fetch(e.to_string());
                tracing::error!(topic = %topic, consumer = %consumer, "{}", err);
                err
            })?;

        let Some(msg) = messages.into_iter().next() else {
            tracing::debug!(topic = %topic, consumer = %consumer, "No message within max wait");
            return Ok(None);
        };

        tracing::debug!(
            backend = BACKEND,
            mode = "SUB",
            topic = %msg.subject,
            value = %String::from_utf8_lossy(&msg.payload),
            host = %self.config.server,
            "Message received"
        );

        self.metrics.increment_counter(SUBSCRIBE_SUCCESS_COUNT, &labels);

        Ok(Some(msg.into()))
    }
}
