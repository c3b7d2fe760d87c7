//! Upstream chart provider.
//!
//! [`ChartSource`] is the seam the decision engine fetches through;
//! [`RapidApiChartClient`] is the production implementation.

mod rapidapi;

pub use rapidapi::{RapidApiChartClient, UpstreamConfig};

use async_trait::async_trait;

use crate::Result;
use crate::types::ChartSnapshot;

/// Something that can produce a fresh chart snapshot.
///
/// Implementations classify failures into the upstream variants of
/// [`ChartkeepError`](crate::ChartkeepError): `RateLimited` for HTTP 429,
/// `Api` for other non-2xx statuses, `Http` for transport failures and
/// `Payload` for unusable 2xx bodies.
#[async_trait]
pub trait ChartSource: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Fetch the chart `chart_id`, for `week` when given, else the current one.
    async fn fetch_chart(&self, chart_id: &str, week: Option<&str>) -> Result<ChartSnapshot>;
}
