//! Metrics sinks for pub/sub traffic counters

use std::collections::HashMap;
use std::sync::Mutex;

pub const PUBLISH_TOTAL_COUNT: &str = "app_pubsub_publish_total_count";
pub const PUBLISH_SUCCESS_COUNT: &str = "app_pubsub_publish_success_count";
pub const SUBSCRIBE_TOTAL_COUNT: &str = "app_pubsub_subscribe_total_count";
pub const SUBSCRIBE_SUCCESS_COUNT: &str = "app_pubsub_subscribe_success_count";

/// Counter sink the adapter reports traffic to
pub trait Metrics: Send + Sync {
    /// Increment counter `name` by one for the given label set
    fn increment_counter(&self, name: &str, labels: &[(&str, &str)]);
}

/// Discards every observation
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn increment_counter(&self, _name: &str, _labels: &[(&str, &str)]) {}
}

/// Keeps counters in process memory
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    counters: Mutex<HashMap<String, u64>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter, 0 if never incremented
    pub fn count(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        let counters = match self.counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        counters.get(&series_key(name, labels)).copied().unwrap_or(0)
    }
}

impl Metrics for InMemoryMetrics {
    fn increment_counter(&self, name: &str, labels: &[(&str, &str)]) {
        let mut counters = match self.counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *counters.entry(series_key(name, labels)).or_insert(0) += 1;
    }
}

fn series_key(name: &str, labels: &[(&str, &str)]) -> String {
    let labels: Vec<String> = labels.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("{}{{{}}}", name, labels.join(","))
}

#[cfg(feature = "metrics")]
pub use self::prometheus_sink::PrometheusMetrics;

#[cfg(feature = "metrics")]
mod prometheus_sink {
    use super::*;
    use prometheus::{IntCounterVec, Opts, Registry};

    /// Prometheus-backed sink; counter vectors are registered on first use
    pub struct PrometheusMetrics {
        registry: Registry,
        counters: Mutex<HashMap<String, IntCounterVec>>,
    }

    impl PrometheusMetrics {
        pub fn new(registry: Registry) -> Self {
            Self {
                registry,
                counters: Mutex::new(HashMap::new()),
            }
        }

        pub fn registry(&self) -> &Registry {
            &self.registry
        }

        fn counter_vec(&self, name: &str, label_names: &[&str]) -> Option<IntCounterVec> {
            let mut counters = match self.counters.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };

            if let Some(counter) = counters.get(name) {
                return Some(counter.clone());
            }

            let counter = match IntCounterVec::new(Opts::new(name, help_text(name)), label_names) {
                Ok(counter) => counter,
                Err(e) => {
                    tracing::warn!(metric = %name, error = %e, "Failed to create counter");
                    return None;
                }
            };

            if let Err(e) = self.registry.register(Box::new(counter.clone())) {
                tracing::warn!(metric = %name, error = %e, "Failed to register counter");
                return None;
            }

            counters.insert(name.to_string(), counter.clone());
            Some(counter)
        }
    }

    impl Default for PrometheusMetrics {
        fn default() -> Self {
            Self::new(Registry::new())
        }
    }

    impl Metrics for PrometheusMetrics {
        fn increment_counter(&self, name: &str, labels: &[(&str, &str)]) {
            let label_names: Vec<&str> = labels.iter().map(|(k, _)| *k).collect();
            let label_values: Vec<&str> = labels.iter().map(|(_, v)| *v).collect();

            let Some(counter) = self.counter_vec(name, &label_names) else {
                return;
            };

            match counter.get_metric_with_label_values(&label_values) {
                Ok(counter) => counter.inc(),
                Err(e) => {
                    tracing::warn!(metric = %name, error = %e, "Counter label mismatch");
                }
            }
        }
    }

    fn help_text(name: &str) -> String {
        match name {
            PUBLISH_TOTAL_COUNT => "Total publish attempts".to_string(),
            PUBLISH_SUCCESS_COUNT => "Successful publishes".to_string(),
            SUBSCRIBE_TOTAL_COUNT => "Total subscribe attempts".to_string(),
            SUBSCRIBE_SUCCESS_COUNT => "Messages received by subscribers".to_string(),
            other => format!("Counter {}", other),
        }
    }

}
