//! NATS JetStream Adapter for the pub/sub abstraction
//!
//! Binds the framework's [`Publisher`], [`Subscriber`] and [`PubSubClient`]
//! ports to NATS JetStream through `async-nats`.
//!
//! # Features
//!
//! - **Publishing**: publish payloads and wait for the JetStream ack
//! - **Pull subscriptions**: durable pull consumers, one message per call
//! - **Stream administration**: create and delete streams
//! - **Observability**: `tracing` logs and traffic counters through a [`Metrics`] sink
//! - **Pluggable broker**: everything goes through the traits in [`jetstream`]
//!
//! # Example
//!
//! ```rust,ignore
//! use pubsub_adapter_nats::{InMemoryMetrics, NatsClient, NatsConfig, Publisher, Subscriber};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NatsConfig::from_env()?;
//!     let client = NatsClient::new(config, Arc::new(InMemoryMetrics::new())).await?;
//!
//!     client.publish("events", b"hello").await?;
//!
//!     if let Some(msg) = client.subscribe("events").await? {
//!         println!("{}: {}", msg.topic, String::from_utf8_lossy(&msg.value));
//!         msg.commit().await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod jetstream;
pub mod metrics;
pub mod publisher;
pub mod pubsub;
pub mod subscriber;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports
pub use client::NatsClient;
pub use config::{NatsConfig, Retention, StreamConfig, StreamConfigBuilder};
pub use error::{NatsError, Result};
pub use jetstream::{
    Connection, Connector, JetStream, JetStreamMessage, NatsConnector, PullSubscription,
};
#[cfg(feature = "metrics")]
pub use metrics::PrometheusMetrics;
pub use metrics::{InMemoryMetrics, Metrics, NoopMetrics};
pub use pubsub::{Committer, Health, HealthStatus, Message, PubSubClient, Publisher, Subscriber};
pub use subscriber::{default_fetch_fn, FetchFn, FetchFuture};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_exports_build_a_config_and_sink() {
        let config = NatsConfig {
            stream: StreamConfigBuilder::new("orders.>")
                .retention(Retention::WorkQueue)
                .build(),
            ..NatsConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.stream.stream_name(), "orders__");

        let counters = InMemoryMetrics::new();
        let sink: &dyn Metrics = &counters;
        sink.increment_counter(metrics::PUBLISH_TOTAL_COUNT, &[("stream", "orders.a")]);
        assert_eq!(
            counters.count(metrics::PUBLISH_TOTAL_COUNT, &[("stream", "orders.a")]),
            1
        );

        let msg = Message::new("orders.a", "hello");
        assert_eq!(msg.topic, "orders.a");
    }
}
