use thiserror::Error;

/// Common error type for the Mirakurun exporter.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The upstream request could not be completed: connection refused,
    /// DNS failure, timeout, non-success status, or a truncated body.
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The upstream body was not a JSON object.
    #[error("Failed to decode {namespace} response: {source}")]
    Decode {
        namespace: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for errors raised while talking to the upstream service.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Decode { .. })
    }
}

/// Result type alias using the exporter's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
