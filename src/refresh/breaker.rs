//! Rate-limit cooldown flag.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

use crate::cache::KeyValueCache;
use crate::cache::keys::RATE_LIMIT_KEY;
use crate::telemetry;

/// Shared "provider is rate limiting us" flag, stored in the cache so every
/// process behind the same store backs off together.
///
/// Check-then-act on the flag is not atomic; two requests racing past a
/// clear flag may both reach the provider.
#[derive(Clone)]
pub struct RateLimitBreaker {
    cache: Arc<dyn KeyValueCache>,
    cooldown: Duration,
}

impl RateLimitBreaker {
    pub fn new(cache: Arc<dyn KeyValueCache>, cooldown: Duration) -> Self {
        Self { cache, cooldown }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Whether the cooldown is active. Cache failures read as "not tripped".
    pub async fn is_tripped(&self) -> bool {
        match self.cache.get(RATE_LIMIT_KEY).await {
            Ok(flag) => flag.is_some(),
            Err(e) => {
                warn!(error = %e, "Rate-limit flag read failed");
                false
            }
        }
    }

    /// Arm the cooldown after a 429.
    ///
    /// The cooldown is fixed; a `Retry-After` hint is only logged.
    pub async fn trip(&self, retry_after: Option<Duration>) {
        metrics::counter!(telemetry::RATE_LIMIT_TRIPS_TOTAL).increment(1);
        info!(
            cooldown_secs = self.cooldown.as_secs(),
            retry_after_secs = retry_after.map(|d| d.as_secs()),
            "Upstream rate limited, cooling down"
        );
        if let Err(e) = self
            .cache
            .set(RATE_LIMIT_KEY, Value::Bool(true), Some(self.cooldown))
            .await
        {
            warn!(error = %e, "Failed to set rate-limit flag");
        }
    }

    /// Disarm after a successful fetch.
    pub async fn clear(&self) {
        if let Err(e) = self.cache.delete(RATE_LIMIT_KEY).await {
            warn!(error = %e, "Failed to clear rate-limit flag");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    #[tokio::test]
    async fn trip_and_clear() {
        let breaker = RateLimitBreaker::new(Arc::new(MemoryCache::new()), Duration::from_secs(300));
        assert!(!breaker.is_tripped().await);

        breaker.trip(None).await;
        assert!(breaker.is_tripped().await);

        breaker.clear().await;
        assert!(!breaker.is_tripped().await);
    }

    #[tokio::test]
    async fn cooldown_expires() {
        let breaker =
            RateLimitBreaker::new(Arc::new(MemoryCache::new()), Duration::from_millis(50));
        breaker.trip(Some(Duration::from_secs(3600))).await;
        assert!(breaker.is_tripped().await);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(!breaker.is_tripped().await);
    }
}
