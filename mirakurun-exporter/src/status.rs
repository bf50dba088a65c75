//! Collector for `GET /api/status`.

use std::sync::Arc;

use async_trait::async_trait;
use mirakurun_common::{ApiClient, StatusSnapshot};
use tracing::debug;

use crate::collector::{CollectError, Collector};
use crate::mapping::{MetricDescriptor, MetricKind, MetricSample, build_metric_name};

/// How a field of the snapshot turns into a sample.
enum Reading {
    /// Numeric value, only the `host` label.
    Value(f64),
    /// Constant `1` with the string carried in the extra label.
    Label(String),
    /// Nothing usable this scrape.
    Skip,
}

type Reader = fn(&StatusSnapshot) -> Reading;

struct StatusMetric {
    descriptor: Arc<MetricDescriptor>,
    read: Reader,
}

/// Publishes one metric per selected field of the status document.
pub struct StatusCollector {
    client: ApiClient,
    metrics: Vec<StatusMetric>,
}

impl StatusCollector {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            metrics: status_metrics(),
        }
    }

    /// Turn a decoded snapshot into samples labeled with `host`.
    pub fn samples(
        &self,
        host: &str,
        snapshot: &StatusSnapshot,
    ) -> Result<Vec<MetricSample>, CollectError> {
        let mut samples = Vec::with_capacity(self.metrics.len());

        for metric in &self.metrics {
            let sample = match (metric.read)(snapshot) {
                Reading::Value(value) => {
                    MetricSample::new(&metric.descriptor, value, vec![host.to_string()])?
                }
                Reading::Label(text) => {
                    MetricSample::new(&metric.descriptor, 1.0, vec![host.to_string(), text])?
                }
                Reading::Skip => {
                    debug!(metric = %metric.descriptor.name, "No usable value, skipping");
                    continue;
                }
            };
            samples.push(sample);
        }

        Ok(samples)
    }
}

#[async_trait]
impl Collector for StatusCollector {
    fn name(&self) -> &'static str {
        "status"
    }

    fn describe(&self) -> Vec<Arc<MetricDescriptor>> {
        self.metrics
            .iter()
            .map(|m| Arc::clone(&m.descriptor))
            .collect()
    }

    async fn collect(&self) -> Result<Vec<MetricSample>, CollectError> {
        let snapshot: StatusSnapshot = self.client.fetch("status").await?;
        self.samples(&self.client.endpoint().host, &snapshot)
    }
}

/// Builder for the fixed metric table.
struct Table(Vec<StatusMetric>);

impl Table {
    fn push(&mut self, path: &str, help: &str, kind: MetricKind, labels: &[&str], read: Reader) {
        let descriptor = MetricDescriptor::new(build_metric_name("status", path), help, kind, labels);
        self.0.push(StatusMetric {
            descriptor: Arc::new(descriptor),
            read,
        });
    }

    fn gauge(&mut self, path: &str, help: &str, read: Reader) {
        self.push(path, help, MetricKind::Gauge, &["host"], read);
    }

    fn info(&mut self, path: &str, help: &str, label: &str, read: Reader) {
        self.push(path, help, MetricKind::Gauge, &["host", label], read);
    }
}

fn status_metrics() -> Vec<StatusMetric> {
    use Reading::{Label, Skip, Value};

    let mut t = Table(Vec::with_capacity(53));

    t.push(
        "time",
        "Unix time reported by the Mirakurun status endpoint.",
        MetricKind::Counter,
        &["host"],
        |s| Value(s.time as f64),
    );
    t.info("version", "Mirakurun version.", "version", |s| {
        Label(s.version.clone())
    });

    // Process
    t.info("process.arch", "CPU architecture of the Mirakurun process.", "arch", |s| {
        Label(s.process.arch.clone())
    });
    t.info("process.platform", "OS platform of the Mirakurun process.", "platform", |s| {
        Label(s.process.platform.clone())
    });
    t.gauge("process.pid", "Process ID of Mirakurun.", |s| {
        Value(s.process.pid as f64)
    });

    t.info("process.versions.node", "Node.js version.", "version", |s| {
        Label(s.process.versions.node.clone())
    });
    t.info("process.versions.v8", "V8 version.", "version", |s| {
        Label(s.process.versions.v8.clone())
    });
    t.info("process.versions.uv", "libuv version.", "version", |s| {
        Label(s.process.versions.uv.clone())
    });
    t.info("process.versions.zlib", "zlib version.", "version", |s| {
        Label(s.process.versions.zlib.clone())
    });
    t.info("process.versions.brotli", "Brotli version.", "version", |s| {
        Label(s.process.versions.brotli.clone())
    });
    t.info("process.versions.ares", "c-ares version.", "version", |s| {
        Label(s.process.versions.ares.clone())
    });
    t.info("process.versions.modules", "Node.js module ABI version.", "version", |s| {
        Label(s.process.versions.modules.clone())
    });
    t.info("process.versions.nghttp2", "nghttp2 version.", "version", |s| {
        Label(s.process.versions.nghttp2.clone())
    });
    t.info("process.versions.napi", "N-API version.", "version", |s| {
        Label(s.process.versions.napi.clone())
    });
    t.info("process.versions.llhttp", "llhttp version.", "version", |s| {
        Label(s.process.versions.llhttp.clone())
    });
    t.info("process.versions.openssl", "OpenSSL version.", "version", |s| {
        Label(s.process.versions.openssl.clone())
    });
    t.info("process.versions.cldr", "CLDR data version.", "version", |s| {
        Label(s.process.versions.cldr.clone())
    });
    t.info("process.versions.icu", "ICU version.", "version", |s| {
        Label(s.process.versions.icu.clone())
    });
    t.info("process.versions.tz", "Time zone database version.", "version", |s| {
        Label(s.process.versions.tz.clone())
    });
    t.info("process.versions.unicode", "Unicode version.", "version", |s| {
        Label(s.process.versions.unicode.clone())
    });

    t.info("process.env.path", "PATH of the Mirakurun process.", "path", |s| {
        Label(s.process.env.path.clone())
    });
    t.gauge("process.env.usingWinser", "USING_WINSER of the Mirakurun process.", |s| {
        match s.process.env.using_winser_value() {
            Some(v) => Value(v),
            None => Skip,
        }
    });
    t.info("process.env.nodeEnv", "NODE_ENV of the Mirakurun process.", "node_env", |s| {
        Label(s.process.env.node_env.clone())
    });
    t.info(
        "process.env.serverConfigPath",
        "Path of the server configuration file.",
        "server_config_path",
        |s| Label(s.process.env.server_config_path.clone()),
    );
    t.info(
        "process.env.tunersConfigPath",
        "Path of the tuners configuration file.",
        "tuners_config_path",
        |s| Label(s.process.env.tuners_config_path.clone()),
    );
    t.info(
        "process.env.channelsConfigPath",
        "Path of the channels configuration file.",
        "channels_config_path",
        |s| Label(s.process.env.channels_config_path.clone()),
    );
    t.info(
        "process.env.servicesDbPath",
        "Path of the services database.",
        "services_db_path",
        |s| Label(s.process.env.services_db_path.clone()),
    );
    t.info(
        "process.env.programsDbPath",
        "Path of the programs database.",
        "programs_db_path",
        |s| Label(s.process.env.programs_db_path.clone()),
    );

    t.gauge("process.memoryUsage.rss", "Resident set size in bytes.", |s| {
        Value(s.process.memory_usage.rss as f64)
    });
    t.gauge("process.memoryUsage.heapTotal", "V8 heap size in bytes.", |s| {
        Value(s.process.memory_usage.heap_total as f64)
    });
    t.gauge("process.memoryUsage.heapUsed", "V8 heap in use in bytes.", |s| {
        Value(s.process.memory_usage.heap_used as f64)
    });
    t.gauge(
        "process.memoryUsage.external",
        "Memory of C++ objects bound to JavaScript objects in bytes.",
        |s| Value(s.process.memory_usage.external as f64),
    );
    t.gauge(
        "process.memoryUsage.arrayBuffers",
        "Memory allocated for ArrayBuffers and SharedArrayBuffers in bytes.",
        |s| Value(s.process.memory_usage.array_buffers as f64),
    );

    // EPG
    t.gauge(
        "epg.gatheringNetworks",
        "Number of networks whose EPG is being gathered.",
        |s| Value(s.epg.gathering_networks.len() as f64),
    );
    t.gauge("epg.storedEvents", "Number of EPG events stored.", |s| {
        Value(s.epg.stored_events as f64)
    });

    // Streams
    t.gauge("streamCount.tunerDevice", "Active tuner device streams.", |s| {
        Value(s.stream_count.tuner_device as f64)
    });
    t.gauge("streamCount.tsFilter", "Active TS filter streams.", |s| {
        Value(s.stream_count.ts_filter as f64)
    });
    t.gauge("streamCount.decoder", "Active decoder streams.", |s| {
        Value(s.stream_count.decoder as f64)
    });

    // Errors. These reset when Mirakurun restarts, so they stay gauges.
    t.gauge("errorCount.uncaughtException", "Uncaught exceptions since start.", |s| {
        Value(s.error_count.uncaught_exception as f64)
    });
    t.gauge("errorCount.unhandledRejection", "Unhandled promise rejections since start.", |s| {
        Value(s.error_count.unhandled_rejection as f64)
    });
    t.gauge("errorCount.bufferOverflow", "Stream buffer overflows since start.", |s| {
        Value(s.error_count.buffer_overflow as f64)
    });
    t.gauge("errorCount.tunerDeviceRespawn", "Tuner device respawns since start.", |s| {
        Value(s.error_count.tuner_device_respawn as f64)
    });
    t.gauge("errorCount.decoderRespawn", "Decoder respawns since start.", |s| {
        Value(s.error_count.decoder_respawn as f64)
    });

    // Timer accuracy
    t.gauge("timerAccuracy.last", "Last measured timer drift.", |s| {
        Value(s.timer_accuracy.last)
    });
    t.gauge("timerAccuracy.m1.avg", "Average timer drift over 1 minute.", |s| {
        Value(s.timer_accuracy.m1.avg)
    });
    t.gauge("timerAccuracy.m1.min", "Minimum timer drift over 1 minute.", |s| {
        Value(s.timer_accuracy.m1.min)
    });
    t.gauge("timerAccuracy.m1.max", "Maximum timer drift over 1 minute.", |s| {
        Value(s.timer_accuracy.m1.max)
    });
    t.gauge("timerAccuracy.m5.avg", "Average timer drift over 5 minutes.", |s| {
        Value(s.timer_accuracy.m5.avg)
    });
    t.gauge("timerAccuracy.m5.min", "Minimum timer drift over 5 minutes.", |s| {
        Value(s.timer_accuracy.m5.min)
    });
    t.gauge("timerAccuracy.m5.max", "Maximum timer drift over 5 minutes.", |s| {
        Value(s.timer_accuracy.m5.max)
    });
    t.gauge("timerAccuracy.m15.avg", "Average timer drift over 15 minutes.", |s| {
        Value(s.timer_accuracy.m15.avg)
    });
    t.gauge("timerAccuracy.m15.min", "Minimum timer drift over 15 minutes.", |s| {
        Value(s.timer_accuracy.m15.min)
    });
    t.gauge("timerAccuracy.m15.max", "Maximum timer drift over 15 minutes.", |s| {
        Value(s.timer_accuracy.m15.max)
    });

    t.0
}
