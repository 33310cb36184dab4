//! NATS adapter configuration

use crate::error::{NatsError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// NATS JetStream configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NatsConfig {
    /// NATS server URL (e.g., "nats://localhost:4222")
    pub server: String,

    /// Stream the adapter publishes into and consumes from
    pub stream: StreamConfig,

    /// Durable consumer name; generated per client when empty
    pub consumer: String,

    /// Upper bound for a single fetch, in milliseconds
    pub max_wait_ms: u64,

    /// Redelivery limit for the pull consumer
    pub max_deliver: i64,

    /// Max reconnect attempts
    pub max_reconnect_attempts: u32,

    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,

    /// Enable TLS
    pub enable_tls: bool,

    /// TLS root certificate path (if enable_tls)
    pub tls_cert_path: Option<String>,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            server: "nats://localhost:4222".to_string(),
            stream: StreamConfig::default(),
            consumer: String::new(),
            max_wait_ms: 1_000,
            max_deliver: 3,
            max_reconnect_attempts: 10,
            connection_timeout_secs: 5,
            enable_tls: false,
            tls_cert_path: None,
        }
    }
}

impl NatsConfig {
    /// Validate configuration
    ///
    /// The server is checked before the stream subject, so a config missing
    /// both reports [`NatsError::ServerNotProvided`].
    pub fn validate(&self) -> Result<()> {
        if self.server.is_empty() {
            return Err(NatsError::ServerNotProvided);
        }

        if self.stream.subject.is_empty() {
            return Err(NatsError::StreamNotProvided);
        }

        if self.enable_tls && self.tls_cert_path.is_none() {
            return Err(NatsError::Config(
                "TLS enabled but no certificate path provided".to_string(),
            ));
        }

        Ok(())
    }

    /// Fetch wait bound as a [`Duration`]
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    /// Create configuration from environment variables
    ///
    /// # Environment Variables
    /// - `NATS_SERVER`: NATS server URL
    /// - `NATS_STREAM_SUBJECT`: subject the stream captures
    /// - `NATS_STREAM_NAME`: stream name (optional, derived from the subject)
    /// - `NATS_STREAM_RETENTION`: `limits`, `interest` or `workqueue`
    /// - `NATS_STREAM_REPLICAS`: stream replica count
    /// - `NATS_CONSUMER`: durable consumer name (optional)
    /// - `NATS_MAX_WAIT_MS`: fetch wait bound
    /// - `NATS_MAX_DELIVER`: consumer redelivery limit
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let stream_defaults = StreamConfig::default();

        let retention = match std::env::var("NATS_STREAM_RETENTION") {
            Ok(value) => value.parse()?,
            Err(_) => stream_defaults.retention,
        };

        let config = Self {
            server: std::env::var("NATS_SERVER").unwrap_or(defaults.server),
            stream: StreamConfig {
                subject: std::env::var("NATS_STREAM_SUBJECT").unwrap_or(stream_defaults.subject),
                name: std::env::var("NATS_STREAM_NAME").ok(),
                retention,
                replicas: env_parse("NATS_STREAM_REPLICAS").unwrap_or(stream_defaults.replicas),
                ..stream_defaults
            },
            consumer: std::env::var("NATS_CONSUMER").unwrap_or_default(),
            max_wait_ms: env_parse("NATS_MAX_WAIT_MS").unwrap_or(defaults.max_wait_ms),
            max_deliver: env_parse("NATS_MAX_DELIVER").unwrap_or(defaults.max_deliver),
            max_reconnect_attempts: env_parse("NATS_MAX_RECONNECT_ATTEMPTS")
                .unwrap_or(defaults.max_reconnect_attempts),
            connection_timeout_secs: env_parse("NATS_CONNECTION_TIMEOUT_SECS")
                .unwrap_or(defaults.connection_timeout_secs),
            enable_tls: env_parse("NATS_ENABLE_TLS").unwrap_or(false),
            tls_cert_path: std::env::var("NATS_TLS_CERT_PATH").ok(),
        };

        config.validate()?;
        Ok(config)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

/// Message retention policy of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Retention {
    /// Keep messages until a size, count or age limit is hit
    #[default]
    Limits,
    /// Keep messages while there are consumers interested in them
    Interest,
    /// Remove messages once acknowledged
    WorkQueue,
}

impl FromStr for Retention {
    type Err = NatsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "limits" => Ok(Self::Limits),
            "interest" => Ok(Self::Interest),
            "workqueue" | "work_queue" => Ok(Self::WorkQueue),
            other => Err(NatsError::Config(format!(
                "unknown stream retention policy: {}",
                other
            ))),
        }
    }
}

/// JetStream stream definition
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Subject captured by the stream
    pub subject: String,

    /// Stream name; derived from the subject when absent
    pub name: Option<String>,

    pub retention: Retention,

    pub replicas: usize,

    pub max_messages: i64,

    pub max_bytes: i64,

    /// Maximum message age in seconds, 0 for unlimited
    pub max_age_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            subject: "events".to_string(),
            name: None,
            retention: Retention::Limits,
            replicas: 1,
            max_messages: 100_000,
            max_bytes: 1_073_741_824, // 1GB
            max_age_secs: 86400 * 7,  // 7 days
        }
    }
}

impl StreamConfig {
    /// Name the stream is registered under.
    ///
    /// JetStream rejects `.`, `*`, `>` and whitespace in stream names, so a
    /// subject-derived name has those replaced with `_`.
    pub fn stream_name(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => self
                .subject
                .chars()
                .map(|c| match c {
                    '.' | '*' | '>' => '_',
                    c if c.is_whitespace() => '_',
                    c => c,
                })
                .collect(),
        }
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

/// Stream configuration builder
pub struct StreamConfigBuilder {
    config: StreamConfig,
}

impl StreamConfigBuilder {
    /// Create a builder for a stream capturing `subject`
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            config: StreamConfig {
                subject: subject.into(),
                ..StreamConfig::default()
            },
        }
    }

    /// Set an explicit stream name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    pub fn retention(mut self, retention: Retention) -> Self {
        self.config.retention = retention;
        self
    }

    pub fn replicas(mut self, replicas: usize) -> Self {
        self.config.replicas = replicas;
        self
    }

    /// Set maximum number of messages
    pub fn max_messages(mut self, max: i64) -> Self {
        self.config.max_messages = max;
        self
    }

    /// Set maximum bytes
    pub fn max_bytes(mut self, max: i64) -> Self {
        self.config.max_bytes = max;
        self
    }

    /// Set maximum age for messages
    pub fn max_age(mut self, duration: Duration) -> Self {
        self.config.max_age_secs = duration.as_secs();
        self
    }

    /// Build the stream configuration
    pub fn build(self) -> StreamConfig {
        self.config
    }
}
