//! Chartkeep error types

use std::time::Duration;

/// Chartkeep error types
#[derive(Debug, thiserror::Error)]
pub enum ChartkeepError {
    // Upstream/network errors
    /// Connection failure or timeout before any response arrived.
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// A 2xx response whose body is malformed or describes an error.
    #[error("invalid upstream payload: {0}")]
    Payload(String),

    // Local errors
    #[error("credential error: {0}")]
    Credential(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure reported by a [`KeyValueCache`](crate::cache::KeyValueCache)
    /// backend. Reads that fail are treated as misses.
    #[error("cache error: {0}")]
    Cache(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ChartkeepError {
    /// Upstream HTTP status associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ChartkeepError::Api { status, .. } => Some(*status),
            ChartkeepError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Whether the upstream asked us to back off.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ChartkeepError::RateLimited { .. })
    }

    /// Errors raised while talking to an upstream service, as opposed to
    /// local cache or configuration problems.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            ChartkeepError::Http(_)
                | ChartkeepError::Api { .. }
                | ChartkeepError::RateLimited { .. }
                | ChartkeepError::Payload(_)
        )
    }
}

/// Result type alias for Chartkeep operations
pub type Result<T> = std::result::Result<T, ChartkeepError>;
