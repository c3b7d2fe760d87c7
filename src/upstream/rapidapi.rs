//! Billboard chart API client (served through RapidAPI).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use super::ChartSource;
use crate::types::ChartSnapshot;
use crate::{ChartkeepError, Result, version};

/// Default base URL for the chart API
const DEFAULT_BASE_URL: &str = "https://billboard-charts-api.p.rapidapi.com";

/// Host header RapidAPI routes on
const DEFAULT_HOST: &str = "billboard-charts-api.p.rapidapi.com";

/// Connection settings for the chart provider.
///
/// ```rust
/// # use chartkeep::upstream::UpstreamConfig;
/// # use std::time::Duration;
/// let config = UpstreamConfig::new()
///     .base_url("http://localhost:8080")
///     .timeout(Duration::from_secs(3));
/// ```
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    /// Value of the `X-RapidAPI-Host` header.
    pub host: String,
    /// Per-request timeout. Default: 10s.
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            host: DEFAULT_HOST.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl UpstreamConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Client for the Billboard chart API.
#[derive(Clone)]
pub struct RapidApiChartClient {
    api_key: String,
    host: String,
    base_url: String,
    http: Client,
}

impl RapidApiChartClient {
    pub fn new(api_key: impl Into<String>, config: &UpstreamConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(version::user_agent())
            .build()
            .map_err(|e| ChartkeepError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            host: config.host.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        Self::new(api_key, &UpstreamConfig::new().base_url(base_url))
    }

    /// Check response status and map to the upstream error taxonomy.
    fn handle_response_errors(response: &reqwest::Response) -> Result<()> {
        let status = response.status();

        if status.is_success() {
            return Ok(());
        }

        match status.as_u16() {
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(Duration::from_secs);
                Err(ChartkeepError::RateLimited { retry_after })
            }
            code => Err(ChartkeepError::Api {
                status: code,
                message: format!("chart API returned {status}"),
            }),
        }
    }
}

#[async_trait]
impl ChartSource for RapidApiChartClient {
    fn name(&self) -> &str {
        "billboard"
    }

    #[instrument(skip(self), fields(provider = "billboard"))]
    async fn fetch_chart(&self, chart_id: &str, week: Option<&str>) -> Result<ChartSnapshot> {
        let url = format!("{}/chart.php", self.base_url);

        let mut query = vec![("id", chart_id)];
        if let Some(week) = week {
            query.push(("week", week));
        }

        let response = self
            .http
            .get(&url)
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", &self.host)
            .query(&query)
            .send()
            .await
            .map_err(|e| ChartkeepError::Http(e.to_string()))?;

        Self::handle_response_errors(&response)?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| ChartkeepError::Payload(e.to_string()))?;

        let snapshot = ChartSnapshot::from_payload(chart_id, week, body)?;
        debug!(
            entries = snapshot.entries.len(),
            as_of = snapshot.as_of_date.as_deref().unwrap_or("unknown"),
            "Fetched chart"
        );
        Ok(snapshot)
    }
}
