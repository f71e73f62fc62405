//! Entry hooks and log message metrics

use crate::field::Entry;
use crate::Result;
use metrics::{
    Counter, Gauge, Histogram, Key, KeyName, Label, Metadata, Recorder, SharedString, Unit,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Callback run for every entry that passes the level threshold
pub type Hook = Arc<dyn Fn(&Entry) -> Result<()> + Send + Sync>;

static METADATA: Metadata<'static> =
    Metadata::new(module_path!(), metrics::Level::INFO, Some(module_path!()));

/// Help text of the log message counter
pub const MESSAGE_COUNTER_HELP: &str = "How many log messages created, partitioned by log level.";

/// Name of the log message counter for `app_name`
pub fn message_counter_name(app_name: &str) -> String {
    format!("{}_log_messages_total", app_name)
}

/// Hook counting log messages per level on `recorder`.
///
/// The counter is named `<app_name>_log_messages_total` and carries a
/// lowercase `level` label, e.g. `appname_log_messages_total{level="info"}`.
pub fn message_counter(app_name: &str, recorder: Arc<dyn Recorder + Send + Sync>) -> Hook {
    let name = message_counter_name(app_name);
    recorder.describe_counter(
        KeyName::from(name.clone()),
        None,
        SharedString::from(MESSAGE_COUNTER_HELP),
    );

    Arc::new(move |entry: &Entry| -> Result<()> {
        let level = entry.level.as_str().to_lowercase();
        let key = Key::from_parts(name.clone(), vec![Label::new("level", level)]);
        recorder.register_counter(&key, &METADATA).increment(1);
        Ok(())
    })
}

/// In-process recorder keeping counter values for inspection and
/// Prometheus text rendering. Gauges and histograms are not tracked.
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    counters: Arc<Mutex<HashMap<Key, Arc<AtomicU64>>>>,
    descriptions: Arc<Mutex<HashMap<String, String>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of the counter `name` with exactly `labels`
    pub fn counter_value(&self, name: &str, labels: &[(&str, &str)]) -> Option<u64> {
        let labels: Vec<Label> = labels
            .iter()
            .map(|(k, v)| Label::new(k.to_string(), v.to_string()))
            .collect();
        let key = Key::from_parts(name.to_string(), labels);

        self.counters
            .lock()
            .ok()?
            .get(&key)
            .map(|value| value.load(Ordering::Relaxed))
    }

    /// Render counters in the Prometheus text exposition format, families
    /// and samples sorted
    pub fn render_prometheus(&self) -> String {
        let counters = match self.counters.lock() {
            Ok(counters) => counters,
            Err(poisoned) => poisoned.into_inner(),
        };
        let descriptions = match self.descriptions.lock() {
            Ok(descriptions) => descriptions,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut families: BTreeMap<&str, Vec<(String, u64)>> = BTreeMap::new();
        for (key, value) in counters.iter() {
            families
                .entry(key.name())
                .or_default()
                .push((format_labels(key.labels()), value.load(Ordering::Relaxed)));
        }

        let mut output = String::new();
        for (name, mut samples) in families {
            samples.sort();
            if let Some(help) = descriptions.get(name) {
                output.push_str(&format!("# HELP {} {}\n", name, help));
            }
            output.push_str(&format!("# TYPE {} counter\n", name));
            for (labels, value) in samples {
                output.push_str(&format!("{}{} {}\n", name, labels, value));
            }
        }

        output
    }

    pub fn reset(&self) {
        if let Ok(mut counters) = self.counters.lock() {
            counters.clear();
        }
    }
}

impl Recorder for MetricsRegistry {
    fn describe_counter(&self, key: KeyName, _unit: Option<Unit>, description: SharedString) {
        if let Ok(mut descriptions) = self.descriptions.lock() {
            descriptions.insert(key.as_str().to_string(), description.to_string());
        }
    }

    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        let atomic = match self.counters.lock() {
            Ok(mut counters) => Arc::clone(
                counters
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(AtomicU64::new(0))),
            ),
            Err(_) => return Counter::noop(),
        };
        Counter::from_arc(atomic)
    }

    fn register_gauge(&self, _key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, _key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}

/// Recorder exporting through `metrics-exporter-prometheus`, with the handle
/// used to render its scrape output
#[cfg(feature = "prometheus")]
pub fn prometheus_recorder() -> (
    Arc<metrics_exporter_prometheus::PrometheusRecorder>,
    metrics_exporter_prometheus::PrometheusHandle,
) {
    let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    (Arc::new(recorder), handle)
}

fn format_labels(labels: std::slice::Iter<'_, Label>) -> String {
    let mut label_pairs: Vec<String> = labels
        .map(|label| format!("{}=\"{}\"", label.key(), label.value()))
        .collect();
    if label_pairs.is_empty() {
        String::new()
    } else {
        label_pairs.sort();
        format!("{{{}}}", label_pairs.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_message_counter_counts_per_level() {
        let registry = MetricsRegistry::new();
        let hook = message_counter("appname", Arc::new(registry.clone()));

        hook(&Entry::new(Level::INFO, "a")).unwrap();
        hook(&Entry::new(Level::INFO, "b")).unwrap();
        hook(&Entry::new(Level::ERROR, "c")).unwrap();

        assert_eq!(
            registry.counter_value("appname_log_messages_total", &[("level", "info")]),
            Some(2)
        );
        assert_eq!(
            registry.counter_value("appname_log_messages_total", &[("level", "error")]),
            Some(1)
        );
        assert_eq!(
            registry.counter_value("appname_log_messages_total", &[("level", "debug")]),
            None
        );
    }

    #[test]
    fn test_render_prometheus() {
        let registry = MetricsRegistry::new();
        let hook = message_counter("appname", Arc::new(registry.clone()));

        hook(&Entry::new(Level::INFO, "a")).unwrap();
        hook(&Entry::new(Level::ERROR, "b")).unwrap();
        hook(&Entry::new(Level::INFO, "c")).unwrap();

        let expected = "\
# HELP appname_log_messages_total How many log messages created, partitioned by log level.
# TYPE appname_log_messages_total counter
appname_log_messages_total{level=\"error\"} 1
appname_log_messages_total{level=\"info\"} 2
";
        assert_eq!(registry.render_prometheus(), expected);
    }

    #[test]
    fn test_reset_clears_counters() {
        let registry = MetricsRegistry::new();
        let counter = registry.register_counter(&Key::from_name("test_counter"), &METADATA);
        counter.increment(5);
        assert_eq!(registry.counter_value("test_counter", &[]), Some(5));

        registry.reset();
        assert_eq!(registry.counter_value("test_counter", &[]), None);
    }

    #[cfg(feature = "prometheus")]
    #[test]
    fn test_prometheus_exporter_recorder() {
        let (recorder, handle) = prometheus_recorder();
        let hook = message_counter("exported", recorder);

        hook(&Entry::new(Level::WARN, "w")).unwrap();

        let rendered = handle.render();
        assert!(rendered.contains("exported_log_messages_total{level=\"warn\"} 1"));
    }
}
