//! Typed views of the Mirakurun `status` and `version` documents.
//!
//! Decoding is forgiving below the top level: any field that is
//! missing, `null`, or of an unexpected type falls back to its `Default`
//! without disturbing its siblings. Only a body that is not a JSON object is
//! rejected.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};

/// Deserialize `T`, substituting `T::default()` when the value does not fit.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Decode a JSON body whose top level must be an object.
pub fn decode_object<T: DeserializeOwned>(body: &[u8]) -> serde_json::Result<T> {
    let value: serde_json::Value = serde_json::from_slice(body)?;
    if !value.is_object() {
        return Err(serde_json::Error::custom(format!(
            "expected a JSON object, found {}",
            json_kind(&value)
        )));
    }
    serde_json::from_value(value)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Response of `GET /api/version`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VersionSnapshot {
    #[serde(deserialize_with = "lenient")]
    pub current: String,
    #[serde(deserialize_with = "lenient")]
    pub latest: String,
}

/// Response of `GET /api/status`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StatusSnapshot {
    /// Unix timestamp reported by the service.
    #[serde(deserialize_with = "lenient")]
    pub time: i64,
    #[serde(deserialize_with = "lenient")]
    pub version: String,
    #[serde(deserialize_with = "lenient")]
    pub process: ProcessStatus,
    #[serde(deserialize_with = "lenient")]
    pub epg: EpgStatus,
    #[serde(rename = "streamCount", deserialize_with = "lenient")]
    pub stream_count: StreamCount,
    #[serde(rename = "errorCount", deserialize_with = "lenient")]
    pub error_count: ErrorCount,
    #[serde(rename = "timerAccuracy", deserialize_with = "lenient")]
    pub timer_accuracy: TimerAccuracy,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProcessStatus {
    #[serde(deserialize_with = "lenient")]
    pub arch: String,
    #[serde(deserialize_with = "lenient")]
    pub platform: String,
    #[serde(deserialize_with = "lenient")]
    pub versions: RuntimeVersions,
    #[serde(deserialize_with = "lenient")]
    pub env: ProcessEnv,
    #[serde(deserialize_with = "lenient")]
    pub pid: i64,
    #[serde(rename = "memoryUsage", deserialize_with = "lenient")]
    pub memory_usage: MemoryUsage,
}

/// Versions of the Node.js runtime and its bundled libraries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeVersions {
    #[serde(deserialize_with = "lenient")]
    pub node: String,
    #[serde(deserialize_with = "lenient")]
    pub v8: String,
    #[serde(deserialize_with = "lenient")]
    pub uv: String,
    #[serde(deserialize_with = "lenient")]
    pub zlib: String,
    #[serde(deserialize_with = "lenient")]
    pub brotli: String,
    #[serde(deserialize_with = "lenient")]
    pub ares: String,
    #[serde(deserialize_with = "lenient")]
    pub modules: String,
    #[serde(deserialize_with = "lenient")]
    pub nghttp2: String,
    #[serde(deserialize_with = "lenient")]
    pub napi: String,
    #[serde(deserialize_with = "lenient")]
    pub llhttp: String,
    #[serde(deserialize_with = "lenient")]
    pub openssl: String,
    #[serde(deserialize_with = "lenient")]
    pub cldr: String,
    #[serde(deserialize_with = "lenient")]
    pub icu: String,
    #[serde(deserialize_with = "lenient")]
    pub tz: String,
    #[serde(deserialize_with = "lenient")]
    pub unicode: String,
}

/// The subset of the service's environment it chooses to publish.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ProcessEnv {
    #[serde(deserialize_with = "lenient")]
    pub path: String,
    #[serde(deserialize_with = "lenient")]
    pub using_winser: String,
    #[serde(deserialize_with = "lenient")]
    pub node_env: String,
    #[serde(deserialize_with = "lenient")]
    pub server_config_path: String,
    #[serde(deserialize_with = "lenient")]
    pub tuners_config_path: String,
    #[serde(deserialize_with = "lenient")]
    pub channels_config_path: String,
    #[serde(deserialize_with = "lenient")]
    pub services_db_path: String,
    #[serde(deserialize_with = "lenient")]
    pub programs_db_path: String,
}

impl ProcessEnv {
    /// `USING_WINSER` as a number, if it is one.
    pub fn using_winser_value(&self) -> Option<f64> {
        self.using_winser.trim().parse::<f64>().ok()
    }
}

/// Node.js `process.memoryUsage()` in bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemoryUsage {
    #[serde(deserialize_with = "lenient")]
    pub rss: u64,
    #[serde(deserialize_with = "lenient")]
    pub heap_total: u64,
    #[serde(deserialize_with = "lenient")]
    pub heap_used: u64,
    #[serde(deserialize_with = "lenient")]
    pub external: u64,
    #[serde(deserialize_with = "lenient")]
    pub array_buffers: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EpgStatus {
    /// Network IDs whose EPG is currently being gathered.
    #[serde(deserialize_with = "lenient")]
    pub gathering_networks: Vec<i64>,
    #[serde(deserialize_with = "lenient")]
    pub stored_events: u64,
}

/// Active streams per stream type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StreamCount {
    #[serde(deserialize_with = "lenient")]
    pub tuner_device: u64,
    #[serde(deserialize_with = "lenient")]
    pub ts_filter: u64,
    #[serde(deserialize_with = "lenient")]
    pub decoder: u64,
}

/// Error counters since the service started. They reset on restart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ErrorCount {
    #[serde(deserialize_with = "lenient")]
    pub uncaught_exception: u64,
    #[serde(deserialize_with = "lenient")]
    pub unhandled_rejection: u64,
    #[serde(deserialize_with = "lenient")]
    pub buffer_overflow: u64,
    #[serde(deserialize_with = "lenient")]
    pub tuner_device_respawn: u64,
    #[serde(deserialize_with = "lenient")]
    pub decoder_respawn: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TimerAccuracy {
    #[serde(deserialize_with = "lenient")]
    pub last: f64,
    #[serde(deserialize_with = "lenient")]
    pub m1: AccuracyWindow,
    #[serde(deserialize_with = "lenient")]
    pub m5: AccuracyWindow,
    #[serde(deserialize_with = "lenient")]
    pub m15: AccuracyWindow,
}

/// Timer drift statistics over one sliding window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AccuracyWindow {
    #[serde(deserialize_with = "lenient")]
    pub avg: f64,
    #[serde(deserialize_with = "lenient")]
    pub min: f64,
    #[serde(deserialize_with = "lenient")]
    pub max: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = r#"{
        "time": 1700000000,
        "version": "4.0.0",
        "process": {
            "arch": "x64",
            "platform": "linux",
            "versions": { "node": "20.10.0", "v8": "11.3.244.8-node.25", "tz": "2023c" },
            "env": {
                "PATH": "/usr/local/bin:/usr/bin",
                "USING_WINSER": "1",
                "NODE_ENV": "production",
                "TUNERS_CONFIG_PATH": "/app-config/tuners.yml"
            },
            "pid": 123,
            "memoryUsage": { "rss": 104857600, "heapTotal": 50331648, "heapUsed": 40000000, "external": 2000000, "arrayBuffers": 150000 }
        },
        "epg": { "gatheringNetworks": [4, 32736], "storedEvents": 42 },
        "streamCount": { "tunerDevice": 2, "tsFilter": 3, "decoder": 0 },
        "errorCount": { "uncaughtException": 1, "unhandledRejection": 0, "bufferOverflow": 5, "tunerDeviceRespawn": 0, "decoderRespawn": 2 },
        "timerAccuracy": {
            "last": 1.25,
            "m1": { "avg": 0.5, "min": 0.1, "max": 2.5 },
            "m5": { "avg": 0.6, "min": 0.1, "max": 3.0 },
            "m15": { "avg": 0.7, "min": 0.0, "max": 9.75 }
        }
    }"#;

    #[test]
    fn test_decode_full_status() {
        let status: StatusSnapshot = decode_object(STATUS.as_bytes()).unwrap();

        assert_eq!(status.time, 1_700_000_000);
        assert_eq!(status.version, "4.0.0");
        assert_eq!(status.process.arch, "x64");
        assert_eq!(status.process.pid, 123);
        assert_eq!(status.process.versions.node, "20.10.0");
        assert_eq!(status.process.versions.tz, "2023c");
        assert_eq!(status.process.env.path, "/usr/local/bin:/usr/bin");
        assert_eq!(status.process.env.tuners_config_path, "/app-config/tuners.yml");
        assert_eq!(status.process.memory_usage.heap_total, 50_331_648);
        assert_eq!(status.epg.gathering_networks, vec![4, 32736]);
        assert_eq!(status.epg.stored_events, 42);
        assert_eq!(status.stream_count.ts_filter, 3);
        assert_eq!(status.error_count.buffer_overflow, 5);
        assert_eq!(status.timer_accuracy.m15.max, 9.75);
    }

    #[test]
    fn test_missing_sections_take_defaults() {
        let status: StatusSnapshot =
            decode_object(br#"{"time": 5, "epg": {"storedEvents": 7}}"#).unwrap();

        assert_eq!(status.time, 5);
        assert_eq!(status.epg.stored_events, 7);
        assert_eq!(status.error_count, ErrorCount::default());
        assert!(status.version.is_empty());
        assert!(status.epg.gathering_networks.is_empty());
    }

    #[test]
    fn test_mistyped_fields_do_not_poison_siblings() {
        let body = br#"{
            "time": "yesterday",
            "version": 4,
            "process": { "pid": 99, "arch": null, "memoryUsage": { "rss": -1, "heapUsed": 10 } },
            "errorCount": "none",
            "streamCount": { "tunerDevice": 1.5, "decoder": 2 }
        }"#;
        let status: StatusSnapshot = decode_object(body).unwrap();

        assert_eq!(status.time, 0);
        assert_eq!(status.version, "");
        assert_eq!(status.process.pid, 99);
        assert_eq!(status.process.arch, "");
        assert_eq!(status.process.memory_usage.rss, 0);
        assert_eq!(status.process.memory_usage.heap_used, 10);
        assert_eq!(status.error_count, ErrorCount::default());
        assert_eq!(status.stream_count.tuner_device, 0);
        assert_eq!(status.stream_count.decoder, 2);
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(decode_object::<StatusSnapshot>(b"{\"time\": ").is_err());
        assert!(decode_object::<StatusSnapshot>(b"").is_err());
    }

    #[test]
    fn test_non_object_is_an_error() {
        let err = decode_object::<VersionSnapshot>(b"[\"4.0.0\"]").unwrap_err();
        assert!(err.to_string().contains("an array"));
        assert!(decode_object::<StatusSnapshot>(b"null").is_err());
    }

    #[test]
    fn test_using_winser_parse() {
        let mut env = ProcessEnv::default();
        assert_eq!(env.using_winser_value(), None);

        env.using_winser = "1".to_string();
        assert_eq!(env.using_winser_value(), Some(1.0));

        env.using_winser = "true".to_string();
        assert_eq!(env.using_winser_value(), None);
    }
}
