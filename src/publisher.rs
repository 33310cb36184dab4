//! NATS Publisher implementation

use crate::client::{NatsClient, BACKEND};
use crate::error::{NatsError, Result};
use crate::metrics::{PUBLISH_SUCCESS_COUNT, PUBLISH_TOTAL_COUNT};
use crate::pubsub::Publisher;
use async_trait::async_trait;
use bytes::Bytes;

#[async_trait]
impl Publisher for NatsClient {
    /// Publish a payload to NATS JetStream and wait for the ack
    ///
    /// Broker errors are returned unchanged.
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        self.metrics
            .increment_counter(PUBLISH_TOTAL_COUNT, &[("stream", topic)]);

        if topic.is_empty() {
            let err = NatsError::PublisherNotConfigured;
            tracing::error!("can't publish message: {}", err);
            return Err(err);
        }

        if let Err(e) = self
            .jetstream
            .publish(topic, Bytes::copy_from_slice(payload))
            .await
        {
            tracing::error!(topic = %topic, "failed to publish message to NATS JetStream: {}", e);
            return Err(e);
        }

        tracing::debug!(
            backend = BACKEND,
            mode = "PUB",
            topic = %topic,
            value = %String::from_utf8_lossy(payload),
            host = %self.config.server,
            "Message published"
        );

        self.metrics
            .increment_counter(PUBLISH_SUCCESS_COUNT, &[("stream", topic)]);

        Ok(())
    }
}
