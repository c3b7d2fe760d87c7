//! Telemetry metric name constants.
//!
//! Centralised metric names for chartkeep operations. Hosts install their
//! own `metrics` recorder (e.g. prometheus, statsd); without a recorder
//! installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `chartkeep_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `outcome`: how a request or lookup was resolved
//! - `namespace`: cache key family: "chart", "catalog_search", "catalog_token"
//! - `status`: upstream fetch result: "ok", "rate_limited" or "error"

/// Chart requests answered by the handler.
///
/// Labels: `outcome` ("fresh" | "cached" | "fallback" | "unavailable").
pub const REQUESTS_TOTAL: &str = "chartkeep_requests_total";

/// End-to-end chart request duration in seconds.
pub const REQUEST_DURATION_SECONDS: &str = "chartkeep_request_duration_seconds";

/// Upstream chart fetches attempted.
///
/// Labels: `status`.
pub const UPSTREAM_FETCHES_TOTAL: &str = "chartkeep_upstream_fetches_total";

/// Total cache hits.
///
/// Labels: `namespace`.
pub const CACHE_HITS_TOTAL: &str = "chartkeep_cache_hits_total";

/// Total cache misses.
///
/// Labels: `namespace`.
pub const CACHE_MISSES_TOTAL: &str = "chartkeep_cache_misses_total";

/// Times the rate-limit cooldown was armed after an upstream 429.
pub const RATE_LIMIT_TRIPS_TOTAL: &str = "chartkeep_rate_limit_trips_total";

/// Catalog lookups that reached the search API or its cache.
///
/// Labels: `outcome` ("found" | "no_result" | "error" | "no_token").
pub const CATALOG_LOOKUPS_TOTAL: &str = "chartkeep_catalog_lookups_total";
