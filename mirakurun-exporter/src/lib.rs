//! Prometheus exporter for Mirakurun.
//!
//! On every scrape of `/metrics` the exporter queries a Mirakurun tuner
//! server's `status` and `version` APIs and republishes selected fields as
//! labeled metrics.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │   Mirakurun     │<────│   Collectors    │<────│   HTTP Server   │
//! │ /api/status ... │     │ (status,version)│     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! MIRAKURUN_HOST=tuner.local mirakurun-exporter --listen 0.0.0.0:9100
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for the optional configuration file and
//! [`mirakurun_common::EndpointConfig`] for the upstream variables.

pub mod collector;
pub mod config;
pub mod http;
pub mod mapping;
pub mod status;
pub mod version;

pub use collector::{CollectError, Collector, Registry, ScrapeReport};
pub use config::ExporterConfig;
pub use http::HttpServer;
pub use mapping::{MetricDescriptor, MetricKind, MetricSample};
pub use status::StatusCollector;
pub use version::VersionCollector;

use mirakurun_common::ApiClient;

/// Registry with the status and version collectors bound to `client`.
pub fn default_registry(client: &ApiClient) -> Result<Registry, collector::RegistryError> {
    let mut registry = Registry::new();
    registry.register(StatusCollector::new(client.clone()))?;
    registry.register(VersionCollector::new(client.clone()))?;
    Ok(registry)
}
