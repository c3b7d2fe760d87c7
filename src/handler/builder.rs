//! Builder for configuring chart handlers

use std::sync::Arc;

use super::ChartRequestHandler;
use crate::cache::{KeyValueCache, MemoryCache};
use crate::catalog::{CatalogConfig, CatalogCredentials, CatalogSearch, CatalogService, TokenMinter};
use crate::clock::{Clock, SystemClock};
use crate::refresh::{RateLimitBreaker, RefreshDecisionEngine, RefreshPolicy};
use crate::upstream::{ChartSource, RapidApiChartClient, UpstreamConfig};
use crate::{ChartkeepError, Result};

/// Main entry point for creating chart handlers.
pub struct Chartkeep;

impl Chartkeep {
    /// Create a new builder for configuring the handler.
    pub fn builder() -> ChartkeepBuilder {
        ChartkeepBuilder::new()
    }
}

/// Builder for [`ChartRequestHandler`].
///
/// Everything the handler touches is injected here; there is no global
/// state. Unset collaborators get production defaults: an in-memory cache,
/// the system clock and the HTTP clients.
#[derive(Default)]
pub struct ChartkeepBuilder {
    rapidapi_key: Option<String>,
    upstream: UpstreamConfig,
    source: Option<Arc<dyn ChartSource>>,
    cache: Option<Arc<dyn KeyValueCache>>,
    clock: Option<Arc<dyn Clock>>,
    policy: RefreshPolicy,
    catalog_credentials: Option<CatalogCredentials>,
    catalog_search: Option<Arc<dyn CatalogSearch>>,
    catalog: CatalogConfig,
}

impl ChartkeepBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the RapidAPI chart provider with this key.
    pub fn rapidapi(mut self, api_key: impl Into<String>) -> Self {
        self.rapidapi_key = Some(api_key.into());
        self
    }

    /// Connection settings for the RapidAPI provider.
    pub fn upstream_config(mut self, config: UpstreamConfig) -> Self {
        self.upstream = config;
        self
    }

    /// Use a custom chart source instead of RapidAPI.
    pub fn chart_source(mut self, source: Arc<dyn ChartSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Shared cache. Default: a private [`MemoryCache`].
    pub fn cache(mut self, cache: Arc<dyn KeyValueCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Enable enrichment with these signing credentials.
    pub fn catalog_credentials(mut self, credentials: CatalogCredentials) -> Self {
        self.catalog_credentials = Some(credentials);
        self
    }

    /// Use a custom catalog search backend.
    ///
    /// Enables enrichment even without credentials; lookups then succeed
    /// only while a token is cached.
    pub fn catalog_search(mut self, search: Arc<dyn CatalogSearch>) -> Self {
        self.catalog_search = Some(search);
        self
    }

    pub fn catalog_config(mut self, config: CatalogConfig) -> Self {
        self.catalog = config;
        self
    }

    /// Build the handler.
    pub fn build(self) -> Result<ChartRequestHandler> {
        let source: Arc<dyn ChartSource> = match (self.source, self.rapidapi_key) {
            (Some(source), _) => source,
            (None, Some(key)) => Arc::new(RapidApiChartClient::new(key, &self.upstream)?),
            (None, None) => {
                return Err(ChartkeepError::Configuration(
                    "no chart source configured (set a RapidAPI key)".into(),
                ));
            }
        };

        let cache: Arc<dyn KeyValueCache> = self
            .cache
            .unwrap_or_else(|| Arc::new(MemoryCache::new()));
        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let minter = self.catalog_credentials.map(TokenMinter::new);
        let catalog = match (self.catalog_search, minter.is_some()) {
            (Some(search), _) => Some(search),
            (None, true) => Some(Arc::new(self.catalog.client()?) as Arc<dyn CatalogSearch>),
            (None, false) => None,
        }
        .map(|search| {
            CatalogService::new(cache.clone(), search, minter, clock.clone(), self.catalog)
        });

        let breaker = RateLimitBreaker::new(cache.clone(), self.policy.rate_limit_cooldown);
        let engine = RefreshDecisionEngine::new(self.policy);

        Ok(ChartRequestHandler::new(
            cache, source, clock, engine, breaker, catalog,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_a_chart_source() {
        let err = Chartkeep::builder().build().err().unwrap();
        assert!(matches!(err, ChartkeepError::Configuration(_)));
    }

    #[test]
    fn rapidapi_key_is_enough() {
        let handler = Chartkeep::builder().rapidapi("key").build().unwrap();
        assert!(!handler.has_catalog());
    }

    #[test]
    fn credentials_enable_catalog() {
        let handler = Chartkeep::builder()
            .rapidapi("key")
            .catalog_credentials(CatalogCredentials::new("kid", "team", "pem"))
            .build()
            .unwrap();
        assert!(handler.has_catalog());
    }
}
