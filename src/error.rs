//! Error types for the NATS pub/sub adapter

use thiserror::Error;

/// NATS adapter error types
#[derive(Debug, Error)]
pub enum NatsError {
    /// Configuration has no server address
    #[error("NATS server address not provided")]
    ServerNotProvided,

    /// Configuration has no stream subject
    #[error("NATS stream subject not provided")]
    StreamNotProvided,

    /// Any other invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection error to NATS server
    #[error("Connection error: {0}")]
    Connection(String),

    /// JetStream context or stream setup error
    #[error("JetStream error: {0}")]
    JetStream(String),

    /// Publish called without a usable stream context or topic
    #[error("publisher not configured or stream is empty")]
    PublisherNotConfigured,

    /// Subscribe called without a usable stream context or topic
    #[error("subscriber not configured or topic is empty")]
    SubscriberNotConfigured,

    /// Pull consumer could not be created or bound
    #[error("failed to create or attach consumer: {0}")]
    Consumer(String),

    /// Batch fetch from a pull consumer failed
    #[error("failed to fetch messages: {0}")]
    Fetch(String),

    /// Error reported by the broker, passed through unchanged
    #[error("{0}")]
    Broker(String),

    /// Payload decoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for NATS operations
pub type Result<T> = std::result::Result<T, NatsError>;

impl From<async_nats::Error> for NatsError {
    fn from(err: async_nats::Error) -> Self {
        NatsError::Broker(err.to_string())
    }
}
