//! Framework-side publish/subscribe abstraction
//!
//! These are the ports the application talks to. [`crate::NatsClient`] is the
//! JetStream adapter behind them.

use crate::error::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Acknowledges a delivered message back to the broker
#[async_trait]
pub trait Committer: Send + Sync {
    async fn commit(&self) -> Result<()>;
}

/// Message envelope handed to subscribers
pub struct Message {
    /// Subject the message was delivered on
    pub topic: String,

    /// Opaque payload
    pub value: Vec<u8>,

    /// Broker headers, first value per key
    pub metadata: HashMap<String, String>,

    committer: Option<Arc<dyn Committer>>,
}

impl Message {
    pub fn new(topic: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            value: value.into(),
            metadata: HashMap::new(),
            committer: None,
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_committer(mut self, committer: Arc<dyn Committer>) -> Self {
        self.committer = Some(committer);
        self
    }

    /// Decode the JSON payload into `T`
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.value)?)
    }

    /// Acknowledge the message. A message without a committer is a no-op.
    pub async fn commit(&self) -> Result<()> {
        match &self.committer {
            Some(committer) => committer.commit().await,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("topic", &self.topic)
            .field("value", &String::from_utf8_lossy(&self.value))
            .field("metadata", &self.metadata)
            .field("committable", &self.committer.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Up,
    Down,
}

/// Health report of a pub/sub backend
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub status: HealthStatus,
    pub details: HashMap<String, String>,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish `payload` on `topic`
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<()>;
}

#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Pull the next message for `topic`, `None` when nothing arrived in time
    async fn subscribe(&self, topic: &str) -> Result<Option<Message>>;
}

/// Full pub/sub backend: traffic, stream administration and lifecycle
#[async_trait]
pub trait PubSubClient: Publisher + Subscriber {
    async fn create_stream(&self, name: &str) -> Result<()>;

    async fn delete_stream(&self, name: &str) -> Result<()>;

    fn health(&self) -> Health;

    async fn close(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NatsError;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingCommitter(AtomicUsize);

    #[async_trait]
    impl Committer for CountingCommitter {
        async fn commit(&self) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Order {
        id: u32,
        item: String,
    }

    #[test]
    fn test_bind_json_payload() {
        let msg = Message::new("orders", br#"{"id": 7, "item": "book"}"#.to_vec());
        let order: Order = msg.bind().unwrap();
        assert_eq!(
            order,
            Order {
                id: 7,
                item: "book".to_string()
            }
        );
    }

    #[test]
    fn test_bind_invalid_payload() {
        let msg = Message::new("orders", "not json");
        let result: Result<Order> = msg.bind();
        assert!(matches!(result, Err(NatsError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_commit_forwards_to_committer() {
        let committer = Arc::new(CountingCommitter(AtomicUsize::new(0)));
        let msg = Message::new("orders", "hello").with_committer(committer.clone());

        msg.commit().await.unwrap();
        assert_eq!(committer.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_commit_without_committer() {
        let msg = Message::new("orders", "hello");
        assert!(msg.commit().await.is_ok());
    }

    #[test]
    fn test_health_serializes_uppercase_status() {
        let health = Health {
            status: HealthStatus::Up,
            details: HashMap::new(),
        };
        let value = serde_json::to_value(&health).unwrap();
        assert_eq!(value["status"], "UP");
    }
}
