//! Shared helpers for unit tests

use crate::config::{NatsConfig, StreamConfigBuilder};
use crate::jetstream::{MockConnection, MockJetStream};
use crate::metrics::{Metrics, NoopMetrics};
use crate::NatsClient;
use std::future::Future;
use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `fut` with a debug-level subscriber and return its output plus the logs.
///
/// The subscriber is thread-local, so this relies on the current-thread
/// runtime `#[tokio::test]` uses by default.
pub(crate) async fn capture_logs<F: Future>(fut: F) -> (F::Output, String) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(buffer.clone())
        .finish();

    let output = {
        let _guard = tracing::subscriber::set_default(subscriber);
        fut.await
    };

    let logs = String::from_utf8_lossy(&buffer.0.lock().unwrap()).into_owned();
    (output, logs)
}

pub(crate) fn test_config() -> NatsConfig {
    NatsConfig {
        server: "nats://localhost:4222".to_string(),
        stream: StreamConfigBuilder::new("test-stream").build(),
        consumer: "test-consumer".to_string(),
        max_wait_ms: 1_000,
        ..NatsConfig::default()
    }
}

pub(crate) fn client_with(connection: MockConnection, js: MockJetStream) -> NatsClient {
    client_with_metrics(connection, js, Arc::new(NoopMetrics))
}

pub(crate) fn client_with_metrics(
    connection: MockConnection,
    js: MockJetStream,
    metrics: Arc<dyn Metrics>,
) -> NatsClient {
    NatsClient::from_parts(test_config(), Arc::new(connection), Arc::new(js), metrics)
}
