//! Integration tests for the NATS adapter
//!
//! These tests require a running NATS server with JetStream enabled.
//! Run with: `cargo test --test integration_tests -- --ignored`

#[cfg(test)]
mod integration {
    use pubsub_adapter_nats::{
        HealthStatus, InMemoryMetrics, NatsClient, NatsConfig, NatsError, PubSubClient, Publisher,
        StreamConfigBuilder, Subscriber,
    };
    use std::sync::Arc;

    fn config(subject: &str, consumer: &str) -> NatsConfig {
        NatsConfig {
            stream: StreamConfigBuilder::new(subject).build(),
            consumer: consumer.to_string(),
            ..NatsConfig::default()
        }
    }

    #[tokio::test]
    #[ignore = "requires NATS server with JetStream"]
    async fn test_connect_to_nats() {
        let client = NatsClient::new(
            config("it-connect", "it-connect-consumer"),
            Arc::new(InMemoryMetrics::new()),
        )
        .await
        .expect("Failed to connect");

        assert_eq!(client.health().status, HealthStatus::Up);
        client.close().await.expect("Failed to close");
    }

    #[tokio::test]
    #[ignore = "requires NATS server with JetStream"]
    async fn test_publish_and_subscribe() {
        let client = NatsClient::new(
            config("it-roundtrip", "it-roundtrip-consumer"),
            Arc::new(InMemoryMetrics::new()),
        )
        .await
        .expect("Failed to connect");

        client
            .publish("it-roundtrip", b"Hello, NATS!")
            .await
            .expect("Failed to publish");

        let msg = client
            .subscribe("it-roundtrip")
            .await
            .expect("Failed to subscribe")
            .expect("No message received");

        assert_eq!(msg.topic, "it-roundtrip");
        assert_eq!(msg.value, b"Hello, NATS!".to_vec());
        msg.commit().await.expect("Failed to ack");

        client.close().await.expect("Failed to close");
    }

    #[tokio::test]
    #[ignore = "requires NATS server with JetStream"]
    async fn test_create_and_delete_stream() {
        let client = NatsClient::new(
            config("it-admin", "it-admin-consumer"),
            Arc::new(InMemoryMetrics::new()),
        )
        .await
        .expect("Failed to connect");

        client.create_stream("it-extra").await.expect("Failed to create stream");
        client.delete_stream("it-extra").await.expect("Failed to delete stream");

        client.close().await.expect("Failed to close");
    }

    #[tokio::test]
    #[ignore = "requires NATS server with JetStream"]
    async fn test_durable_consumer_rejects_other_subject() {
        let client = NatsClient::new(
            config("it-filter.>", "it-filter-consumer"),
            Arc::new(InMemoryMetrics::new()),
        )
        .await
        .expect("Failed to connect");

        client
            .publish("it-filter.a", b"for a")
            .await
            .expect("Failed to publish");
        client
            .subscribe("it-filter.a")
            .await
            .expect("Failed to bind consumer");

        let err = client.subscribe("it-filter.b").await.unwrap_err();
        assert!(matches!(err, NatsError::Consumer(_)));

        client.close().await.expect("Failed to close");
    }
}
