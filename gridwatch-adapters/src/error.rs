//! Error types for gatherers and routing.

use thiserror::Error;

/// Errors that can occur when building gatherers or gathering metrics.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// An alias points to a user datasource that does not exist.
    #[error("alias {alias} for ID {id} not found")]
    AliasNotFound { id: String, alias: String },

    /// A datasource declaration is invalid.
    #[error("invalid datasource configuration: {0}")]
    Config(String),

    /// The datasource kind is not available in this build.
    #[error("datasource kind not supported: {0}")]
    Unsupported(String),

    /// A query referenced an unknown datasource.
    #[error("datasource {0} does not exist")]
    DatasourceNotFound(String),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Failed to parse response.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("request timed out")]
    Timeout,

    /// The backend answered without the expected series.
    #[error("unexpected result: {0}")]
    EmptyResult(String),
}

#[cfg(any(feature = "prometheus", feature = "graphite", feature = "influxdb"))]
impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout
        } else if err.is_connect() {
            AdapterError::Connection(err.to_string())
        } else if err.is_decode() {
            AdapterError::Parse(err.to_string())
        } else {
            AdapterError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::Parse(err.to_string())
    }
}
