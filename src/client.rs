//! NATS JetStream pub/sub client
//!
//! Holds the broker handles and implements the administrative half of
//! [`PubSubClient`]. Traffic lives in `publisher.rs` and `subscriber.rs`.

use crate::config::{NatsConfig, StreamConfigBuilder};
use crate::error::{NatsError, Result};
use crate::jetstream::{Connection, Connector, JetStream, NatsConnector};
use crate::metrics::Metrics;
use crate::pubsub::{Health, HealthStatus, PubSubClient};
use crate::subscriber::{default_fetch_fn, FetchFn};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub(crate) const BACKEND: &str = "NATS";

/// JetStream-backed pub/sub client
pub struct NatsClient {
    pub(crate) connection: Arc<dyn Connection>,
    pub(crate) jetstream: Arc<dyn JetStream>,
    pub(crate) config: NatsConfig,
    pub(crate) metrics: Arc<dyn Metrics>,
    pub(crate) fetch_fn: RwLock<FetchFn>,
}

impl NatsClient {
    /// Connect to the configured NATS server
    pub async fn new(config: NatsConfig, metrics: Arc<dyn Metrics>) -> Result<Self> {
        Self::with_connector(config, metrics, &NatsConnector).await
    }

    /// Connect through a caller-supplied [`Connector`]
    ///
    /// Validates the configuration, opens the connection, derives the
    /// JetStream context and makes sure the configured stream exists.
    pub async fn with_connector(
        config: NatsConfig,
        metrics: Arc<dyn Metrics>,
        connector: &dyn Connector,
    ) -> Result<Self> {
        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "could not initialize NATS JetStream");
            return Err(e);
        }

        let connection = connector.connect(&config).await.map_err(|e| {
            tracing::error!(
                server = %config.server,
                error = %e,
                "failed to connect to NATS server"
            );
            e
        })?;

        let jetstream = connection.jetstream().map_err(|e| {
            tracing::error!(error = %e, "failed to create JetStream context");
            NatsError::JetStream(e.to_string())
        })?;

        jetstream.ensure_stream(&config.stream).await.map_err(|e| {
            tracing::error!(
                stream = %config.stream.stream_name(),
                error = %e,
                "failed to create or attach JetStream stream"
            );
            NatsError::JetStream(e.to_string())
        })?;

        tracing::info!(server = %config.server, "connected to NATS server");

        Ok(Self::from_parts(config, connection, jetstream, metrics))
    }

    pub(crate) fn from_parts(
        mut config: NatsConfig,
        connection: Arc<dyn Connection>,
        jetstream: Arc<dyn JetStream>,
        metrics: Arc<dyn Metrics>,
    ) -> Self {
        if config.consumer.is_empty() {
            config.consumer = format!("consumer-{}", uuid::Uuid::new_v4());
            tracing::debug!(consumer = %config.consumer, "Generated consumer name");
        }

        Self {
            connection,
            jetstream,
            config,
            metrics,
            fetch_fn: RwLock::new(default_fetch_fn()),
        }
    }

    /// Replace the strategy used to fetch batches from pull consumers
    pub async fn set_fetch_fn(&self, fetch_fn: FetchFn) {
        *self.fetch_fn.write().await = fetch_fn;
    }

    pub fn config(&self) -> &NatsConfig {
        &self.config
    }

    /// Durable consumer name used for pull subscriptions
    pub fn consumer(&self) -> &str {
        &self.config.consumer
    }
}

#[async_trait]
impl PubSubClient for NatsClient {
    /// Create a stream named `name` capturing the subject `name`
    async fn create_stream(&self, name: &str) -> Result<()> {
        let stream = StreamConfigBuilder::new(name).name(name).build();
        self.jetstream.add_stream(&stream).await
    }

    async fn delete_stream(&self, name: &str) -> Result<()> {
        self.jetstream.delete_stream(name).await
    }

    fn health(&self) -> Health {
        let status = if self.connection.is_connected() {
            HealthStatus::Up
        } else {
            HealthStatus::Down
        };

        let mut details = HashMap::new();
        details.insert("backend".to_string(), BACKEND.to_string());
        details.insert("host".to_string(), self.config.server.clone());
        details.insert("stream".to_string(), self.config.stream.stream_name());
        details.insert("consumer".to_string(), self.config.consumer.clone());

        Health { status, details }
    }

    /// Delete the configured stream, then drain the connection
    ///
    /// Drain runs even when the delete fails; the first error is returned.
    async fn close(&self) -> Result<()> {
        let stream = self.config.stream.stream_name();

        let deleted = self.jetstream.delete_stream(&stream).await;
        if let Err(e) = &deleted {
            tracing::error!(stream = %stream, error = %e, "failed to delete NATS stream");
        }

        let drained = self.connection.drain().await;
        if let Err(e) = &drained {
            tracing::error!(error = %e, "failed to drain NATS connection");
        }

        deleted.and(drained)
    }
}
