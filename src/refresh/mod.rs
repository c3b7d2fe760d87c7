//! Refresh decisions for cached charts.
//!
//! [`RefreshDecisionEngine::decide`] picks, from the cached snapshot and
//! the rate-limit flag, whether a request is answered from cache or goes to
//! the provider. [`RefreshDecisionEngine::settle`] decides what a
//! successful fetch means for the response and for the cache.
//!
//! Both are pure; the request handler does the I/O.

mod breaker;

pub use breaker::RateLimitBreaker;

use std::time::Duration;

use chrono::{Datelike, NaiveDate, Weekday};
use tracing::debug;

use crate::types::{ChartRequest, ChartSnapshot};

/// Note on a snapshot served because the provider is rate limiting us.
pub const RATE_LIMIT_NOTE: &str = "Using cached data due to rate limit cooldown";

/// Note on a refresh-day fetch that returned the chart we already had.
pub const NO_NEW_DATA_NOTE: &str = "No new chart data yet";

/// Note on a forced refresh of a historical week we already hold.
pub const IMMUTABLE_NOTE: &str = "Historical chart data is immutable; served from cache";

/// Note on a cached snapshot served after a failed fetch.
pub fn fallback_note(error: &impl std::fmt::Display) -> String {
    format!("Using cached data due to API error: {error}")
}

/// Refresh timing knobs.
///
/// ```rust
/// # use chartkeep::refresh::RefreshPolicy;
/// # use chrono::Weekday;
/// # use std::time::Duration;
/// let policy = RefreshPolicy::new()
///     .refresh_day(Weekday::Wed)
///     .rate_limit_cooldown(Duration::from_secs(60));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Weekday the provider publishes new charts, in server-local time.
    /// Default: Tuesday.
    pub refresh_day: Weekday,
    /// TTL for a newly accepted current chart. Default: one week.
    pub current_ttl: Duration,
    /// TTL for a current chart re-cached because the provider has not
    /// published yet. Default: one hour.
    pub pending_ttl: Duration,
    /// How long the rate-limit flag stays set. Default: five minutes.
    pub rate_limit_cooldown: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            refresh_day: Weekday::Tue,
            current_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            pending_ttl: Duration::from_secs(60 * 60),
            rate_limit_cooldown: Duration::from_secs(5 * 60),
        }
    }
}

impl RefreshPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh_day(mut self, day: Weekday) -> Self {
        self.refresh_day = day;
        self
    }

    pub fn current_ttl(mut self, ttl: Duration) -> Self {
        self.current_ttl = ttl;
        self
    }

    pub fn pending_ttl(mut self, ttl: Duration) -> Self {
        self.pending_ttl = ttl;
        self
    }

    pub fn rate_limit_cooldown(mut self, ttl: Duration) -> Self {
        self.rate_limit_cooldown = ttl;
        self
    }
}

/// Why a request with a cached snapshot still goes to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchTrigger {
    /// The caller asked for `refresh`.
    Forced,
    /// Current chart on the refresh day.
    RefreshDay,
}

/// What to do with a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Answer from cache without contacting the provider.
    ServeCache {
        snapshot: ChartSnapshot,
        note: Option<&'static str>,
    },
    /// Fetch; nothing to fall back on.
    FetchThenCache,
    /// Fetch; on failure serve `fallback`.
    FetchWithFallback {
        fallback: ChartSnapshot,
        trigger: FetchTrigger,
    },
}

/// How a settled snapshot should be stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Leave the cache as it is.
    Keep,
    /// Store with no expiry.
    Permanent,
    /// Store for the given TTL.
    Expiring(Duration),
}

impl Retention {
    /// TTL argument for [`KeyValueCache::set`](crate::cache::KeyValueCache::set),
    /// or `None` when nothing should be written.
    pub fn ttl(self) -> Option<Option<Duration>> {
        match self {
            Retention::Keep => None,
            Retention::Permanent => Some(None),
            Retention::Expiring(ttl) => Some(Some(ttl)),
        }
    }
}

/// Response and cache effect of a successful fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub snapshot: ChartSnapshot,
    pub cached: bool,
    pub note: Option<&'static str>,
    pub retention: Retention,
}

/// Stateless decision logic over a [`RefreshPolicy`].
#[derive(Debug, Clone, Default)]
pub struct RefreshDecisionEngine {
    policy: RefreshPolicy,
}

impl RefreshDecisionEngine {
    pub fn new(policy: RefreshPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RefreshPolicy {
        &self.policy
    }

    pub fn is_refresh_day(&self, today: NaiveDate) -> bool {
        today.weekday() == self.policy.refresh_day
    }

    /// Choose how to answer `request`.
    ///
    /// With a cached snapshot:
    /// - the rate-limit flag serves it, whatever else was asked;
    /// - a historical week is served unless `force_refresh`;
    /// - the current chart is served unless `force_refresh` or `today` is
    ///   the refresh day;
    /// - anything else fetches with the snapshot as fallback.
    ///
    /// Without one the request always fetches, flag or not.
    pub fn decide(
        &self,
        request: &ChartRequest,
        cached: Option<ChartSnapshot>,
        rate_limited: bool,
        today: NaiveDate,
    ) -> Decision {
        let Some(snapshot) = cached else {
            return Decision::FetchThenCache;
        };

        if rate_limited {
            return Decision::ServeCache {
                snapshot,
                note: Some(RATE_LIMIT_NOTE),
            };
        }

        if request.force_refresh {
            return Decision::FetchWithFallback {
                fallback: snapshot,
                trigger: FetchTrigger::Forced,
            };
        }

        if request.is_historical() || !self.is_refresh_day(today) {
            return Decision::ServeCache {
                snapshot,
                note: None,
            };
        }

        Decision::FetchWithFallback {
            fallback: snapshot,
            trigger: FetchTrigger::RefreshDay,
        }
    }

    /// Reconcile a freshly fetched snapshot with what was cached.
    ///
    /// - A historical week already cached keeps the cached copy.
    /// - A historical week fetched for the first time is stored permanently.
    /// - On a refresh-day fetch, a current chart with the same as-of date as
    ///   the cached one is not new: the old copy is served and re-stored
    ///   for the short pending window.
    /// - Otherwise the fetched chart is accepted for the long window.
    pub fn settle(
        &self,
        trigger: Option<FetchTrigger>,
        previous: Option<ChartSnapshot>,
        fetched: ChartSnapshot,
    ) -> Settlement {
        if fetched.is_historical() {
            return match previous {
                Some(previous) => Settlement {
                    snapshot: previous,
                    cached: true,
                    note: Some(IMMUTABLE_NOTE),
                    retention: Retention::Keep,
                },
                None => Settlement {
                    snapshot: fetched,
                    cached: false,
                    note: None,
                    retention: Retention::Permanent,
                },
            };
        }

        if let Some(previous) = previous {
            let unchanged = trigger == Some(FetchTrigger::RefreshDay)
                && previous.as_of_date.is_some()
                && previous.as_of_date == fetched.as_of_date;
            if unchanged {
                debug!(
                    as_of = previous.as_of_date.as_deref().unwrap_or_default(),
                    "Provider has not published a new chart yet"
                );
                return Settlement {
                    snapshot: previous,
                    cached: true,
                    note: Some(NO_NEW_DATA_NOTE),
                    retention: Retention::Expiring(self.policy.pending_ttl),
                };
            }
        }

        Settlement {
            snapshot: fetched,
            cached: false,
            note: None,
            retention: Retention::Expiring(self.policy.current_ttl),
        }
    }
}
