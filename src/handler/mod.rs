//! Chart request orchestration.
//!
//! [`ChartRequestHandler::handle`] runs one request end to end: read the
//! cached snapshot and the rate-limit flag, ask the decision engine what to
//! do, fetch if needed, fall back on failure, enrich, and store the result.

mod builder;

pub use builder::{Chartkeep, ChartkeepBuilder};

use std::sync::Arc;
use std::time::Instant;

use chrono::TimeDelta;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::keys::chart_key;
use crate::cache::{KeyValueCache, get_typed, set_typed};
use crate::catalog::CatalogService;
use crate::clock::Clock;
use crate::refresh::{
    Decision, FetchTrigger, RATE_LIMIT_NOTE, RateLimitBreaker, RefreshDecisionEngine, Retention,
    fallback_note,
};
use crate::telemetry;
use crate::types::{ChartReply, ChartRequest, ChartSnapshot, EntryLayout};
use crate::upstream::ChartSource;
use crate::{ChartkeepError, Result};

/// A reply still being assembled, with what should happen to the cache.
struct Served {
    snapshot: ChartSnapshot,
    cached: bool,
    note: Option<String>,
    retention: Retention,
    outcome: &'static str,
}

/// Answers chart requests from cache or the provider.
pub struct ChartRequestHandler {
    cache: Arc<dyn KeyValueCache>,
    source: Arc<dyn ChartSource>,
    clock: Arc<dyn Clock>,
    engine: RefreshDecisionEngine,
    breaker: RateLimitBreaker,
    catalog: Option<CatalogService>,
}

impl ChartRequestHandler {
    pub(crate) fn new(
        cache: Arc<dyn KeyValueCache>,
        source: Arc<dyn ChartSource>,
        clock: Arc<dyn Clock>,
        engine: RefreshDecisionEngine,
        breaker: RateLimitBreaker,
        catalog: Option<CatalogService>,
    ) -> Self {
        Self {
            cache,
            source,
            clock,
            engine,
            breaker,
            catalog,
        }
    }

    pub fn cache(&self) -> &Arc<dyn KeyValueCache> {
        &self.cache
    }

    pub fn engine(&self) -> &RefreshDecisionEngine {
        &self.engine
    }

    pub fn catalog(&self) -> Option<&CatalogService> {
        self.catalog.as_ref()
    }

    pub fn has_catalog(&self) -> bool {
        self.catalog.is_some()
    }

    /// Drop every cached chart, token, search result and the rate-limit flag.
    pub async fn clear_cache(&self) -> Result<()> {
        self.cache.clear().await?;
        info!("Cache cleared");
        Ok(())
    }

    /// Answer one chart request.
    ///
    /// Only invalid input is an error. Upstream failures become a fallback
    /// reply when a cached snapshot exists and [`ChartReply::Unavailable`]
    /// otherwise.
    #[instrument(skip(self), fields(chart = %request.chart_id, week = ?request.week))]
    pub async fn handle(&self, request: ChartRequest) -> Result<ChartReply> {
        let request = request.validate()?;
        let started = Instant::now();
        let key = chart_key(&request.chart_id, request.week.as_deref());

        let previous = match get_typed::<ChartSnapshot>(self.cache.as_ref(), &key).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "Chart cache read failed, treating as miss");
                None
            }
        };
        if previous.is_some() {
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "namespace" => "chart").increment(1);
        } else {
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "namespace" => "chart").increment(1);
        }

        let rate_limited = self.breaker.is_tripped().await;
        let decision = self
            .engine
            .decide(&request, previous, rate_limited, self.clock.today());

        let outcome = match decision {
            Decision::ServeCache { snapshot, note } => {
                debug!(rate_limited, "Serving cached chart");
                Ok(Served {
                    snapshot,
                    cached: true,
                    note: note.map(str::to_string),
                    retention: Retention::Keep,
                    outcome: "cached",
                })
            }
            Decision::FetchThenCache => self.fetch(&request, None, None).await,
            Decision::FetchWithFallback { fallback, trigger } => {
                self.fetch(&request, Some(fallback), Some(trigger)).await
            }
        };

        let reply = match outcome {
            Ok(served) => {
                let mut served = self.enrich(&request, served).await;
                self.store(&key, &mut served).await;
                if !request.enrich {
                    // The stored copy keeps its metadata for later requests.
                    for entry in &mut served.snapshot.entries {
                        entry.enrichment = None;
                    }
                }
                metrics::counter!(telemetry::REQUESTS_TOTAL, "outcome" => served.outcome)
                    .increment(1);
                ChartReply::Served {
                    snapshot: served.snapshot,
                    cached: served.cached,
                    note: served.note,
                }
            }
            Err(e) => {
                metrics::counter!(telemetry::REQUESTS_TOTAL, "outcome" => "unavailable")
                    .increment(1);
                ChartReply::Unavailable {
                    error: e.to_string(),
                    status_code: e.status_code(),
                }
            }
        };

        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        Ok(reply)
    }

    /// Fetch from the provider and settle the result, falling back to
    /// `fallback` on any failure.
    async fn fetch(
        &self,
        request: &ChartRequest,
        fallback: Option<ChartSnapshot>,
        trigger: Option<FetchTrigger>,
    ) -> Result<Served> {
        let fetched = self
            .source
            .fetch_chart(&request.chart_id, request.week.as_deref())
            .await;

        match fetched {
            Ok(snapshot) => {
                metrics::counter!(telemetry::UPSTREAM_FETCHES_TOTAL, "status" => "ok")
                    .increment(1);
                self.breaker.clear().await;
                let settled = self.engine.settle(trigger, fallback, snapshot);
                Ok(Served {
                    snapshot: settled.snapshot,
                    cached: settled.cached,
                    note: settled.note.map(str::to_string),
                    retention: settled.retention,
                    outcome: if settled.cached { "cached" } else { "fresh" },
                })
            }
            Err(e) => {
                let status = if e.is_rate_limited() {
                    "rate_limited"
                } else {
                    "error"
                };
                metrics::counter!(telemetry::UPSTREAM_FETCHES_TOTAL, "status" => status)
                    .increment(1);
                if e.is_upstream() {
                    warn!(provider = self.source.name(), error = %e, "Chart fetch failed");
                } else {
                    error!(provider = self.source.name(), error = %e, "Chart source failed locally");
                }

                if let ChartkeepError::RateLimited { retry_after } = &e {
                    self.breaker.trip(*retry_after).await;
                }

                let Some(snapshot) = fallback else {
                    return Err(e);
                };
                let note = if e.is_rate_limited() {
                    RATE_LIMIT_NOTE.to_string()
                } else {
                    fallback_note(&e)
                };
                Ok(Served {
                    snapshot,
                    cached: true,
                    note: Some(note),
                    retention: Retention::Keep,
                    outcome: "fallback",
                })
            }
        }
    }

    /// Attach catalog metadata when requested.
    ///
    /// A current chart that gained metadata is re-stored so the next
    /// request does not look it up again. The re-store keeps the expiry the
    /// cached copy already had.
    async fn enrich(&self, request: &ChartRequest, mut served: Served) -> Served {
        let Some(catalog) = &self.catalog else {
            return served;
        };
        if !request.enrich || served.snapshot.layout == EntryLayout::Opaque {
            return served;
        }

        let before = enriched_count(&served.snapshot);
        served.snapshot = catalog.enrich(served.snapshot).await;
        let gained = enriched_count(&served.snapshot) > before;

        if gained && served.retention == Retention::Keep && !served.snapshot.is_historical() {
            served.retention = self.remaining_retention(&served.snapshot);
        }
        served
    }

    /// Retention for re-storing a cached current chart without extending
    /// its lifetime. Entries written without an expiry stamp get the short
    /// pending window.
    fn remaining_retention(&self, snapshot: &ChartSnapshot) -> Retention {
        let Some(expires_at) = snapshot.expires_at else {
            return Retention::Expiring(self.engine.policy().pending_ttl);
        };
        match (expires_at - self.clock.now()).to_std() {
            Ok(remaining) if !remaining.is_zero() => Retention::Expiring(remaining),
            _ => Retention::Keep,
        }
    }

    async fn store(&self, key: &str, served: &mut Served) {
        let Some(ttl) = served.retention.ttl() else {
            return;
        };
        served.snapshot.expires_at = ttl
            .and_then(|ttl| TimeDelta::from_std(ttl).ok())
            .map(|ttl| self.clock.now() + ttl);
        match set_typed(self.cache.as_ref(), key, &served.snapshot, ttl).await {
            Ok(()) => info!(
                key,
                ttl_secs = ttl.map(|t| t.as_secs()),
                "Cached chart snapshot"
            ),
            Err(e) => warn!(key, error = %e, "Failed to cache chart snapshot"),
        }
    }
}

fn enriched_count(snapshot: &ChartSnapshot) -> usize {
    snapshot.entries.iter().filter(|e| e.is_enriched()).count()
}
