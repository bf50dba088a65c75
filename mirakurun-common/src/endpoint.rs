//! Upstream endpoint resolution.

use std::fmt;

use crate::error::{Error, Result};

/// Environment variable naming the Mirakurun host.
pub const HOST_VAR: &str = "MIRAKURUN_HOST";
/// Environment variable naming the Mirakurun port.
pub const PORT_VAR: &str = "MIRAKURUN_PORT";
/// Environment variable naming the URL scheme.
pub const SCHEME_VAR: &str = "MIRAKURUN_SCHEMA";

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 40772;
pub const DEFAULT_SCHEME: &str = "http";

/// Location of the Mirakurun API.
///
/// Resolved once at startup and handed to every collector; nothing reads the
/// environment after that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,
    pub scheme: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            scheme: DEFAULT_SCHEME.to_string(),
        }
    }
}

impl EndpointConfig {
    /// Resolve the endpoint from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve the endpoint through an arbitrary variable lookup.
    ///
    /// Variables that are unset or empty fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = get(HOST_VAR).unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match get(PORT_VAR) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| {
                Error::config(format!("{} must be a port number, got '{}': {}", PORT_VAR, raw, e))
            })?,
            None => DEFAULT_PORT,
        };

        let scheme = get(SCHEME_VAR)
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_else(|| DEFAULT_SCHEME.to_string());
        if scheme != "http" && scheme != "https" {
            return Err(Error::config(format!(
                "{} must be 'http' or 'https', got '{}'",
                SCHEME_VAR, scheme
            )));
        }

        Ok(Self { host, port, scheme })
    }

    /// Root of the REST API, always ending in `/api/`.
    pub fn api_root(&self) -> String {
        format!("{}://{}:{}/api/", self.scheme, self.host, self.port)
    }

    /// Full URL for a namespace, with an optional raw query string.
    pub fn url(&self, namespace: &str, query: Option<&str>) -> String {
        let mut url = format!("{}{}", self.api_root(), namespace);
        if let Some(query) = query {
            url.push('?');
            url.push_str(query);
        }
        url
    }
}

impl fmt::Display for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = EndpointConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 40772);
        assert_eq!(config.scheme, "http");
        assert_eq!(config.url("status", None), "http://localhost:40772/api/status");
    }

    #[test]
    fn test_host_override_keeps_other_defaults() {
        let config = EndpointConfig::from_lookup(lookup(&[(HOST_VAR, "tuner.local")])).unwrap();

        assert_eq!(config.host, "tuner.local");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.scheme, DEFAULT_SCHEME);
        assert_eq!(
            config.url("version", None),
            "http://tuner.local:40772/api/version"
        );
    }

    #[test]
    fn test_all_overrides() {
        let config = EndpointConfig::from_lookup(lookup(&[
            (HOST_VAR, "10.0.0.5"),
            (PORT_VAR, "8888"),
            (SCHEME_VAR, "HTTPS"),
        ]))
        .unwrap();

        assert_eq!(config.api_root(), "https://10.0.0.5:8888/api/");
        assert_eq!(config.to_string(), "https://10.0.0.5:8888");
    }

    #[test]
    fn test_empty_values_fall_back() {
        let config =
            EndpointConfig::from_lookup(lookup(&[(HOST_VAR, ""), (PORT_VAR, "  ")])).unwrap();
        assert_eq!(config, EndpointConfig::default());
    }

    #[test]
    fn test_invalid_port() {
        let result = EndpointConfig::from_lookup(lookup(&[(PORT_VAR, "tuner")]));
        let err = result.unwrap_err().to_string();
        assert!(err.contains(PORT_VAR));

        assert!(EndpointConfig::from_lookup(lookup(&[(PORT_VAR, "70000")])).is_err());
    }

    #[test]
    fn test_invalid_scheme() {
        let result = EndpointConfig::from_lookup(lookup(&[(SCHEME_VAR, "ftp")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_url_with_query() {
        let config = EndpointConfig::default();
        assert_eq!(
            config.url("programs", Some("networkId=4")),
            "http://localhost:40772/api/programs?networkId=4"
        );
    }
}
