//! Collector for `GET /api/version`.

use std::sync::Arc;

use async_trait::async_trait;
use mirakurun_common::{ApiClient, VersionSnapshot};

use crate::collector::{CollectError, Collector};
use crate::mapping::{MetricDescriptor, MetricSample, build_metric_name};

/// Publishes the running and the latest released Mirakurun versions as
/// constant `1` gauges labeled with the version string.
pub struct VersionCollector {
    client: ApiClient,
    current: Arc<MetricDescriptor>,
    latest: Arc<MetricDescriptor>,
}

impl VersionCollector {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            current: Arc::new(MetricDescriptor::gauge(
                build_metric_name("", "current_version"),
                "Current version of Mirakurun.",
                &["host", "version"],
            )),
            latest: Arc::new(MetricDescriptor::gauge(
                build_metric_name("", "latest_version"),
                "Latest released version of Mirakurun.",
                &["host", "version"],
            )),
        }
    }

    pub fn samples(
        &self,
        host: &str,
        snapshot: &VersionSnapshot,
    ) -> Result<Vec<MetricSample>, CollectError> {
        Ok(vec![
            MetricSample::new(
                &self.current,
                1.0,
                vec![host.to_string(), snapshot.current.clone()],
            )?,
            MetricSample::new(
                &self.latest,
                1.0,
                vec![host.to_string(), snapshot.latest.clone()],
            )?,
        ])
    }
}

#[async_trait]
impl Collector for VersionCollector {
    fn name(&self) -> &'static str {
        "version"
    }

    fn describe(&self) -> Vec<Arc<MetricDescriptor>> {
        vec![Arc::clone(&self.current), Arc::clone(&self.latest)]
    }

    async fn collect(&self) -> Result<Vec<MetricSample>, CollectError> {
        let snapshot: VersionSnapshot = self.client.fetch("version").await?;
        self.samples(&self.client.endpoint().host, &snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirakurun_common::EndpointConfig;

    fn collector() -> VersionCollector {
        VersionCollector::new(ApiClient::new(EndpointConfig::default(), None).unwrap())
    }

    #[test]
    fn test_describe() {
        let descriptors = collector().describe();

        let names: Vec<_> = descriptors.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["mirakurun_current_version", "mirakurun_latest_version"]);
        for desc in &descriptors {
            assert_eq!(desc.label_names, vec!["host", "version"]);
        }
    }

    #[test]
    fn test_samples() {
        let snapshot = VersionSnapshot {
            current: "3.9.0-rc.4".to_string(),
            latest: "4.0.0".to_string(),
        };
        let samples = collector().samples("tuner.local", &snapshot).unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].name(), "mirakurun_current_version");
        assert_eq!(samples[0].value(), 1.0);
        assert_eq!(samples[0].label("version"), Some("3.9.0-rc.4"));
        assert_eq!(samples[1].name(), "mirakurun_latest_version");
        assert_eq!(samples[1].label("version"), Some("4.0.0"));
        assert_eq!(samples[1].label("host"), Some("tuner.local"));
    }

    #[tokio::test]
    async fn test_collect_unreachable_yields_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let endpoint = EndpointConfig {
            host: "127.0.0.1".to_string(),
            port,
            scheme: "http".to_string(),
        };
        let collector = VersionCollector::new(ApiClient::new(endpoint, None).unwrap());

        let result = collector.collect().await;
        assert!(matches!(result, Err(CollectError::Upstream(_))));
    }
}
