//! Collector trait and the registry that scrapes and renders collectors.

use std::collections::{HashMap, HashSet};
use std::fmt::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::mapping::{MetricDescriptor, MetricSample, build_metric_name};

/// Errors that abort a single collector's scrape.
#[derive(Debug, Error)]
pub enum CollectError {
    /// Fetching or decoding the upstream document failed.
    #[error(transparent)]
    Upstream(#[from] mirakurun_common::Error),

    #[error("Metric {metric} expects {expected} label values, got {actual}")]
    LabelArity {
        metric: String,
        expected: usize,
        actual: usize,
    },

    #[error("Collector task failed: {0}")]
    Task(String),
}

/// Errors raised while registering collectors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Metric {0} is already registered")]
    Duplicate(String),
}

/// A source of metric samples.
///
/// `describe` must not perform I/O and must return the same descriptors for
/// the collector's whole lifetime. `collect` is all-or-nothing: on error it
/// yields no samples.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Short name used in logs and in the `collector` label.
    fn name(&self) -> &'static str;

    fn describe(&self) -> Vec<Arc<MetricDescriptor>>;

    async fn collect(&self) -> Result<Vec<MetricSample>, CollectError>;
}

/// Result of scraping one collector.
#[derive(Debug, Clone)]
pub struct CollectorOutcome {
    pub collector: &'static str,
    pub success: bool,
    pub duration: Duration,
}

/// Everything gathered by one scrape.
#[derive(Debug, Clone, Default)]
pub struct ScrapeReport {
    pub samples: Vec<MetricSample>,
    pub outcomes: Vec<CollectorOutcome>,
}

impl ScrapeReport {
    /// Samples for a metric family, in emission order.
    pub fn samples_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MetricSample> {
        self.samples.iter().filter(move |s| s.name() == name)
    }
}

/// Immutable set of collectors plus the exporter's own scrape metrics.
pub struct Registry {
    collectors: Vec<Arc<dyn Collector>>,
    names: HashSet<String>,
    success: Arc<MetricDescriptor>,
    duration: Arc<MetricDescriptor>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let success = Arc::new(MetricDescriptor::gauge(
            build_metric_name("exporter", "collector_success"),
            "Whether the collector's last scrape succeeded (1) or failed (0).",
            &["collector"],
        ));
        let duration = Arc::new(MetricDescriptor::gauge(
            build_metric_name("exporter", "collector_duration_seconds"),
            "Time the collector's last scrape took.",
            &["collector"],
        ));
        let names = [success.name.clone(), duration.name.clone()]
            .into_iter()
            .collect();

        Self {
            collectors: Vec::new(),
            names,
            success,
            duration,
        }
    }

    /// Register a collector, rejecting metric names that are already taken.
    pub fn register<C: Collector + 'static>(&mut self, collector: C) -> Result<(), RegistryError> {
        let descriptors = collector.describe();

        let mut incoming = HashSet::with_capacity(descriptors.len());
        for desc in &descriptors {
            if self.names.contains(&desc.name) || !incoming.insert(desc.name.clone()) {
                return Err(RegistryError::Duplicate(desc.name.clone()));
            }
        }

        debug!(
            collector = collector.name(),
            metrics = descriptors.len(),
            "Registered collector"
        );
        self.names.extend(incoming);
        self.collectors.push(Arc::new(collector));
        Ok(())
    }

    /// Number of registered collectors.
    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    /// All descriptors, collectors in registration order followed by the
    /// exporter's own.
    pub fn describe(&self) -> Vec<Arc<MetricDescriptor>> {
        let mut descriptors: Vec<_> = self.collectors.iter().flat_map(|c| c.describe()).collect();
        descriptors.push(Arc::clone(&self.success));
        descriptors.push(Arc::clone(&self.duration));
        descriptors
    }

    /// Run every collector concurrently and gather their samples.
    ///
    /// A failing collector contributes no samples; the rest still report.
    pub async fn gather(&self) -> ScrapeReport {
        let handles: Vec<_> = self
            .collectors
            .iter()
            .map(|collector| {
                let collector = Arc::clone(collector);
                tokio::spawn(async move {
                    let start = Instant::now();
                    let result = collector.collect().await;
                    (result, start.elapsed())
                })
            })
            .collect();

        let mut report = ScrapeReport::default();

        for (collector, handle) in self.collectors.iter().zip(handles) {
            let name = collector.name();
            let (result, duration) = match handle.await {
                Ok(done) => done,
                Err(e) => (Err(CollectError::Task(e.to_string())), Duration::ZERO),
            };

            let success = match result {
                Ok(samples) => {
                    debug!(
                        collector = name,
                        samples = samples.len(),
                        elapsed_ms = duration.as_millis() as u64,
                        "Collector scraped"
                    );
                    report.samples.extend(samples);
                    true
                }
                Err(e) => {
                    warn!(collector = name, error = %e, "Collector scrape failed");
                    false
                }
            };

            report.outcomes.push(CollectorOutcome {
                collector: name,
                success,
                duration,
            });
        }

        for outcome in &report.outcomes {
            match self.outcome_samples(outcome) {
                Ok(samples) => report.samples.extend(samples),
                Err(e) => {
                    error!(collector = outcome.collector, error = %e, "Exporter metric rejected")
                }
            }
        }

        report
    }

    /// `collector_success` and `collector_duration_seconds` for one outcome.
    fn outcome_samples(
        &self,
        outcome: &CollectorOutcome,
    ) -> Result<[MetricSample; 2], CollectError> {
        let labels = vec![outcome.collector.to_string()];
        let success = if outcome.success { 1.0 } else { 0.0 };

        Ok([
            MetricSample::new(&self.success, success, labels.clone())?,
            MetricSample::new(&self.duration, outcome.duration.as_secs_f64(), labels)?,
        ])
    }

    /// Scrape and render in Prometheus text exposition format.
    pub async fn render(&self) -> String {
        let report = self.gather().await;
        render_text(&self.describe(), &report.samples)
    }
}

/// Render samples grouped under their descriptors, in descriptor order.
///
/// Families without samples are omitted.
pub fn render_text(descriptors: &[Arc<MetricDescriptor>], samples: &[MetricSample]) -> String {
    let mut by_name: HashMap<&str, Vec<&MetricSample>> = HashMap::new();
    for sample in samples {
        by_name.entry(sample.name()).or_default().push(sample);
    }

    let mut output = String::with_capacity(samples.len() * 100);

    for desc in descriptors {
        let Some(series) = by_name.get(desc.name.as_str()) else {
            continue;
        };

        writeln!(output, "# HELP {} {}", desc.name, escape_help(&desc.help)).ok();
        writeln!(output, "# TYPE {} {}", desc.name, desc.kind.as_str()).ok();

        for sample in series {
            writeln!(
                output,
                "{}{} {}",
                desc.name,
                format_labels(sample),
                format_value(sample.value())
            )
            .ok();
        }
    }

    output
}

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Escape special characters in HELP text.
fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Format a floating point value for Prometheus.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

/// Format labels for Prometheus exposition format.
fn format_labels(sample: &MetricSample) -> String {
    let parts: Vec<String> = sample
        .labels()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect();

    if parts.is_empty() {
        return String::new();
    }

    format!("{{{}}}", parts.join(","))
}
