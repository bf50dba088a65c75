//! Metric descriptors, samples and Prometheus naming rules.

use std::sync::Arc;

use crate::collector::CollectError;

/// Prefix shared by every metric this exporter publishes.
pub const METRIC_PREFIX: &str = "mirakurun";

/// Sanitize a metric name to be Prometheus-compatible.
///
/// Prometheus metric names must match `[a-zA-Z_:][a-zA-Z0-9_:]*`.
/// This function:
/// - Replaces invalid characters with underscores
/// - Ensures the name starts with a letter or underscore
/// - Collapses multiple underscores into one
pub fn sanitize_metric_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 1);
    let mut last_was_underscore = false;
    let mut chars = name.chars().peekable();

    if let Some(&first) = chars.peek()
        && first.is_ascii_digit()
    {
        result.push('_');
        last_was_underscore = true;
    }

    for c in chars {
        let is_valid_char = c.is_ascii_alphanumeric() || c == '_' || c == ':';

        if is_valid_char {
            if c == '_' {
                if !last_was_underscore {
                    result.push(c);
                    last_was_underscore = true;
                }
            } else {
                result.push(c);
                last_was_underscore = false;
            }
        } else if !last_was_underscore {
            result.push('_');
            last_was_underscore = true;
        }
    }

    while result.ends_with('_') {
        result.pop();
    }

    if result.is_empty() {
        result.push_str("unnamed");
    }

    result
}

/// Sanitize a label name to be Prometheus-compatible.
///
/// Prometheus label names must match `[a-zA-Z_][a-zA-Z0-9_]*`.
/// Labels starting with `__` are reserved for internal use.
pub fn sanitize_label_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut last_was_underscore = false;

    for (i, c) in name.chars().enumerate() {
        let valid = if i == 0 {
            c.is_ascii_alphabetic() || c == '_'
        } else {
            c.is_ascii_alphanumeric() || c == '_'
        };

        if valid {
            result.push(c);
            last_was_underscore = c == '_';
        } else if !last_was_underscore {
            result.push('_');
            last_was_underscore = true;
        }
    }

    while result.ends_with('_') {
        result.pop();
    }

    if result.is_empty() {
        return "label".to_string();
    }

    if result.starts_with("__") {
        result.insert(0, 'z');
    }

    result
}

/// Build a full metric name from a subsystem and a dotted JSON path.
///
/// Format: `mirakurun_{subsystem}_{path}`, lowercased, with path separators
/// turned into underscores. `("status", "process.memoryUsage.heapUsed")`
/// becomes `mirakurun_status_process_memoryusage_heapused`.
pub fn build_metric_name(subsystem: &str, path: &str) -> String {
    let sanitized = sanitize_metric_name(path).to_ascii_lowercase();

    if subsystem.is_empty() {
        format!("{}_{}", METRIC_PREFIX, sanitized)
    } else {
        format!("{}_{}_{}", METRIC_PREFIX, subsystem, sanitized)
    }
}

/// Prometheus metric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

impl MetricKind {
    /// Get the TYPE comment string for Prometheus exposition format.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }
}

/// Static description of a metric family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDescriptor {
    pub name: String,
    pub help: String,
    pub label_names: Vec<String>,
    pub kind: MetricKind,
}

impl MetricDescriptor {
    pub fn new(
        name: impl Into<String>,
        help: impl Into<String>,
        kind: MetricKind,
        label_names: &[&str],
    ) -> Self {
        Self {
            name: sanitize_metric_name(&name.into()),
            help: help.into(),
            label_names: label_names.iter().map(|l| sanitize_label_name(l)).collect(),
            kind,
        }
    }

    pub fn gauge(name: impl Into<String>, help: impl Into<String>, label_names: &[&str]) -> Self {
        Self::new(name, help, MetricKind::Gauge, label_names)
    }

    pub fn counter(
        name: impl Into<String>,
        help: impl Into<String>,
        label_names: &[&str],
    ) -> Self {
        Self::new(name, help, MetricKind::Counter, label_names)
    }
}

/// One observed value of a metric family.
///
/// Only constructible through [`MetricSample::new`], which guarantees the
/// label values line up with the descriptor's label names.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    descriptor: Arc<MetricDescriptor>,
    value: f64,
    label_values: Vec<String>,
}

impl MetricSample {
    pub fn new(
        descriptor: &Arc<MetricDescriptor>,
        value: f64,
        label_values: Vec<String>,
    ) -> Result<Self, CollectError> {
        if label_values.len() != descriptor.label_names.len() {
            return Err(CollectError::LabelArity {
                metric: descriptor.name.clone(),
                expected: descriptor.label_names.len(),
                actual: label_values.len(),
            });
        }

        Ok(Self {
            descriptor: Arc::clone(descriptor),
            value,
            label_values,
        })
    }

    pub fn descriptor(&self) -> &Arc<MetricDescriptor> {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn label_values(&self) -> &[String] {
        &self.label_values
    }

    /// Label name/value pairs in descriptor order.
    pub fn labels(&self) -> impl Iterator<Item = (&str, &str)> {
        self.descriptor
            .label_names
            .iter()
            .zip(&self.label_values)
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Look up a label value by name.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels().find(|(k, _)| *k == name).map(|(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_metric_name_simple() {
        assert_eq!(sanitize_metric_name("stored_events"), "stored_events");
    }

    #[test]
    fn test_sanitize_metric_name_dots() {
        assert_eq!(
            sanitize_metric_name("process.memoryUsage.rss"),
            "process_memoryUsage_rss"
        );
        assert_eq!(sanitize_metric_name("timerAccuracy.m1.avg"), "timerAccuracy_m1_avg");
    }

    #[test]
    fn test_sanitize_metric_name_special_chars() {
        assert_eq!(sanitize_metric_name("heap-used%"), "heap_used");
        assert_eq!(sanitize_metric_name("a..b"), "a_b");
    }

    #[test]
    fn test_sanitize_metric_name_leading_number() {
        assert_eq!(sanitize_metric_name("15m"), "_15m");
    }

    #[test]
    fn test_sanitize_metric_name_empty() {
        assert_eq!(sanitize_metric_name(""), "unnamed");
        assert_eq!(sanitize_metric_name("..."), "unnamed");
    }

    #[test]
    fn test_sanitize_label_name() {
        assert_eq!(sanitize_label_name("host"), "host");
        assert_eq!(sanitize_label_name("node-env"), "node_env");
        assert_eq!(sanitize_label_name("__name"), "z__name");
    }

    #[test]
    fn test_build_metric_name() {
        assert_eq!(build_metric_name("status", "time"), "mirakurun_status_time");
        assert_eq!(
            build_metric_name("status", "process.memoryUsage.heapUsed"),
            "mirakurun_status_process_memoryusage_heapused"
        );
        assert_eq!(
            build_metric_name("status", "timerAccuracy.m15.max"),
            "mirakurun_status_timeraccuracy_m15_max"
        );
        assert_eq!(build_metric_name("", "latest_version"), "mirakurun_latest_version");
    }

    #[test]
    fn test_sample_label_arity() {
        let desc = Arc::new(MetricDescriptor::gauge("m", "help", &["host", "version"]));

        let ok = MetricSample::new(&desc, 1.0, vec!["a".into(), "4.0.0".into()]).unwrap();
        assert_eq!(ok.label("version"), Some("4.0.0"));
        assert_eq!(ok.label("missing"), None);

        let err = MetricSample::new(&desc, 1.0, vec!["a".into()]).unwrap_err();
        assert!(matches!(
            err,
            CollectError::LabelArity {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_metric_kind_as_str() {
        assert_eq!(MetricKind::Counter.as_str(), "counter");
        assert_eq!(MetricKind::Gauge.as_str(), "gauge");
    }
}
