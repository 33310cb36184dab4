//! Broker capability surface and its async-nats implementation
//!
//! The adapter only talks to the traits in this module. [`NatsConnector`]
//! produces the real async-nats backed handles; tests substitute mocks.

use crate::config::{NatsConfig, Retention, StreamConfig};
use crate::error::{NatsError, Result};
use crate::pubsub::Committer;
use async_nats::jetstream;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Message as returned by a pull fetch
pub struct JetStreamMessage {
    pub subject: String,
    pub payload: Bytes,
    pub headers: HashMap<String, String>,
    pub committer: Option<Arc<dyn Committer>>,
}

impl JetStreamMessage {
    pub fn new(subject: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            subject: subject.into(),
            payload: payload.into(),
            headers: HashMap::new(),
            committer: None,
        }
    }
}

/// Opens broker connections
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &NatsConfig) -> Result<Arc<dyn Connection>>;
}

/// An open broker connection
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connection: Send + Sync {
    /// Derive a JetStream context from this connection
    fn jetstream(&self) -> Result<Arc<dyn JetStream>>;

    /// Flush in-flight work and close
    async fn drain(&self) -> Result<()>;

    fn is_connected(&self) -> bool;
}

/// JetStream publishing, consuming and stream administration
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JetStream: Send + Sync {
    /// Publish and wait for the stream acknowledgment
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<()>;

    /// Create or attach the durable pull consumer `consumer` filtered on `subject`
    ///
    /// `max_deliver` caps redeliveries of an unacknowledged message, -1 for
    /// unlimited. Attaching to a durable bound to another subject fails.
    async fn pull_subscribe(
        &self,
        subject: &str,
        consumer: &str,
        max_deliver: i64,
    ) -> Result<Arc<dyn PullSubscription>>;

    /// Create the stream, or attach to it when it already exists
    async fn ensure_stream(&self, config: &StreamConfig) -> Result<()>;

    async fn add_stream(&self, config: &StreamConfig) -> Result<()>;

    async fn delete_stream(&self, name: &str) -> Result<()>;
}

/// A bound pull consumer
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PullSubscription: Send + Sync {
    /// Fetch up to `batch` messages, waiting at most `max_wait`
    async fn fetch(&self, batch: usize, max_wait: Duration) -> Result<Vec<JetStreamMessage>>;
}

/// [`Connector`] backed by async-nats
#[derive(Debug, Default, Clone, Copy)]
pub struct NatsConnector;

#[async_trait]
impl Connector for NatsConnector {
    async fn connect(&self, config: &NatsConfig) -> Result<Arc<dyn Connection>> {
        let mut options = async_nats::ConnectOptions::new()
            .max_reconnects(Some(config.max_reconnect_attempts as usize))
            .connection_timeout(Duration::from_secs(config.connection_timeout_secs));

        if config.enable_tls {
            options = options.require_tls(true);
            if let Some(path) = &config.tls_cert_path {
                options = options.add_root_certificates(PathBuf::from(path));
            }
        }

        let client = options
            .connect(config.server.as_str())
            .await
            .map_err(|e| NatsError::Connection(e.to_string()))?;

        Ok(Arc::new(NatsConnection::new(client)))
    }
}

/// [`Connection`] over an `async_nats::Client`
pub struct NatsConnection {
    client: async_nats::Client,
}

impl NatsConnection {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Connection for NatsConnection {
    fn jetstream(&self) -> Result<Arc<dyn JetStream>> {
        Ok(Arc::new(NatsJetStream::new(jetstream::new(
            self.client.clone(),
        ))))
    }

    async fn drain(&self) -> Result<()> {
        self.client
            .drain()
            .await
            .map_err(|e| NatsError::Broker(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        self.client.connection_state() == async_nats::connection::State::Connected
    }
}

/// [`JetStream`] over an `async_nats::jetstream::Context`
pub struct NatsJetStream {
    context: jetstream::Context,
}

impl NatsJetStream {
    pub fn new(context: jetstream::Context) -> Self {
        Self { context }
    }
}

#[async_trait]
impl JetStream for NatsJetStream {
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<()> {
        let ack = self
            .context
            .publish(subject.to_string(), payload)
            .await
            .map_err(|e| NatsError::Broker(e.to_string()))?;

        ack.await.map_err(|e| NatsError::Broker(e.to_string()))?;

        Ok(())
    }

    async fn pull_subscribe(
        &self,
        subject: &str,
        consumer: &str,
        max_deliver: i64,
    ) -> Result<Arc<dyn PullSubscription>> {
        let stream_name = self
            .context
            .stream_by_subject(subject)
            .await
            .map_err(|e| NatsError::Broker(e.to_string()))?;

        let stream = self
            .context
            .get_stream(&stream_name)
            .await
            .map_err(|e| NatsError::Broker(e.to_string()))?;

        let pull_consumer = stream
            .get_or_create_consumer(consumer, consumer_config(subject, consumer, max_deliver))
            .await
            .map_err(|e| NatsError::Broker(e.to_string()))?;

        // An existing durable comes back with its stored config untouched.
        check_filter_subject(
            consumer,
            &pull_consumer.cached_info().config.filter_subject,
            subject,
        )?;

        Ok(Arc::new(NatsPullSubscription {
            consumer: pull_consumer,
        }))
    }

    async fn ensure_stream(&self, config: &StreamConfig) -> Result<()> {
        self.context
            .get_or_create_stream(stream_config(config))
            .await
            .map_err(|e| NatsError::Broker(e.to_string()))?;
        Ok(())
    }

    async fn add_stream(&self, config: &StreamConfig) -> Result<()> {
        self.context
            .create_stream(stream_config(config))
            .await
            .map_err(|e| NatsError::Broker(e.to_string()))?;
        Ok(())
    }

    async fn delete_stream(&self, name: &str) -> Result<()> {
        self.context
            .delete_stream(name)
            .await
            .map_err(|e| NatsError::Broker(e.to_string()))?;
        Ok(())
    }
}

/// [`PullSubscription`] over an async-nats pull consumer
pub struct NatsPullSubscription {
    consumer: jetstream::consumer::PullConsumer,
}

#[async_trait]
impl PullSubscription for NatsPullSubscription {
    async fn fetch(&self, batch: usize, max_wait: Duration) -> Result<Vec<JetStreamMessage>> {
        let mut messages = self
            .consumer
            .fetch()
            .max_messages(batch)
            .expires(max_wait)
            .messages()
            .await
            .map_err(|e| NatsError::Broker(e.to_string()))?;

        let mut fetched = Vec::with_capacity(batch);
        while let Some(message) = messages.next().await {
            let message = message.map_err(|e| NatsError::Broker(e.to_string()))?;
            fetched.push(into_fetched(message));
        }

        Ok(fetched)
    }
}

fn into_fetched(message: jetstream::Message) -> JetStreamMessage {
    let mut headers = HashMap::new();
    if let Some(map) = &message.headers {
        for (name, values) in map.iter() {
            if let Some(value) = values.first() {
                headers.insert(name.to_string(), value.as_str().to_string());
            }
        }
    }

    JetStreamMessage {
        subject: message.subject.to_string(),
        payload: message.payload.clone(),
        headers,
        committer: Some(Arc::new(JetStreamAck { message })),
    }
}

/// Acks a fetched message on commit
struct JetStreamAck {
    message: jetstream::Message,
}

#[async_trait]
impl Committer for JetStreamAck {
    async fn commit(&self) -> Result<()> {
        self.message.ack().await.map_err(NatsError::from)
    }
}

/// Durable pull consumer definition for `subject`
pub(crate) fn consumer_config(
    subject: &str,
    consumer: &str,
    max_deliver: i64,
) -> jetstream::consumer::pull::Config {
    jetstream::consumer::pull::Config {
        durable_name: Some(consumer.to_string()),
        filter_subject: subject.to_string(),
        ack_policy: jetstream::consumer::AckPolicy::Explicit,
        deliver_policy: jetstream::consumer::DeliverPolicy::All,
        max_deliver,
        max_waiting: 128,
        ..Default::default()
    }
}

/// Reject a durable consumer whose stored filter differs from the requested subject
pub(crate) fn check_filter_subject(consumer: &str, bound: &str, requested: &str) -> Result<()> {
    if bound == requested {
        return Ok(());
    }

    Err(NatsError::Broker(format!(
        "consumer '{}' is bound to subject '{}', not '{}'",
        consumer, bound, requested
    )))
}

/// Map a stream definition onto the async-nats stream config
pub(crate) fn stream_config(config: &StreamConfig) -> jetstream::stream::Config {
    let retention = match config.retention {
        Retention::Limits => jetstream::stream::RetentionPolicy::Limits,
        Retention::Interest => jetstream::stream::RetentionPolicy::Interest,
        Retention::WorkQueue => jetstream::stream::RetentionPolicy::WorkQueue,
    };

    jetstream::stream::Config {
        name: config.stream_name(),
        subjects: vec![config.subject.clone()],
        retention,
        num_replicas: config.replicas,
        max_messages: config.max_messages,
        max_bytes: config.max_bytes,
        max_age: config.max_age(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamConfigBuilder;

    #[test]
    fn test_stream_config_mapping() {
        let config = StreamConfigBuilder::new("orders.>")
            .name("ORDERS")
            .retention(Retention::WorkQueue)
            .replicas(3)
            .max_messages(50_000)
            .max_bytes(500_000_000)
            .max_age(Duration::from_secs(3600))
            .build();

        let js_config = stream_config(&config);

        assert_eq!(js_config.name, "ORDERS");
        assert_eq!(js_config.subjects, vec!["orders.>".to_string()]);
        assert_eq!(
            js_config.retention,
            jetstream::stream::RetentionPolicy::WorkQueue
        );
        assert_eq!(js_config.num_replicas, 3);
        assert_eq!(js_config.max_messages, 50_000);
        assert_eq!(js_config.max_bytes, 500_000_000);
        assert_eq!(js_config.max_age, Duration::from_secs(3600));
    }

    #[test]
    fn test_consumer_config_carries_redelivery_limit() {
        let config = consumer_config("orders.a", "billing", 3);

        assert_eq!(config.durable_name.as_deref(), Some("billing"));
        assert_eq!(config.filter_subject, "orders.a");
        assert_eq!(config.max_deliver, 3);
        assert_eq!(config.ack_policy, jetstream::consumer::AckPolicy::Explicit);
    }

    #[test]
    fn test_filter_subject_must_match_durable() {
        assert!(check_filter_subject("billing", "orders.a", "orders.a").is_ok());

        let err = check_filter_subject("billing", "orders.a", "orders.b").unwrap_err();
        assert_eq!(
            err.to_string(),
            "consumer 'billing' is bound to subject 'orders.a', not 'orders.b'"
        );
    }

    #[test]
    fn test_stream_config_name_defaults_to_subject() {
        let config = StreamConfigBuilder::new("test-stream").build();
        assert_eq!(stream_config(&config).name, "test-stream");
    }
}
