//! Catalog enrichment.
//!
//! [`CatalogService`] attaches catalog metadata (links, previews, artwork)
//! to chart entries. Every outcome, including "no match" and transient
//! failures, is cached under the `(title, artist)` pair so the search API
//! sees each song at most once per TTL window.
//!
//! Enrichment never fails a request: missing credentials, search errors
//! and undecodable cache entries all degrade the affected entry to "no
//! enrichment" and are logged.

mod artwork;
mod search;
mod token;

pub use artwork::normalize_artwork_url;
pub use search::{AppleMusicClient, CatalogSearch};
pub use token::{CatalogCredentials, DeveloperClaims, TokenMinter};

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream;
use tracing::{debug, info, instrument, warn};

use crate::cache::keys::{CATALOG_TOKEN_KEY, catalog_search_key};
use crate::cache::{KeyValueCache, get_typed, set_typed};
use crate::clock::Clock;
use crate::telemetry;
use crate::types::{CatalogMetadata, ChartEntry, ChartSnapshot, EntryLayout};

/// Catalog enrichment settings.
///
/// ```rust
/// # use chartkeep::catalog::CatalogConfig;
/// # use std::time::Duration;
/// let config = CatalogConfig::new()
///     .storefront("gb")
///     .concurrency(8)
///     .error_ttl(Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub base_url: String,
    pub storefront: String,
    /// Edge length artwork URLs are rewritten to. Default: 300.
    pub artwork_size: u32,
    /// Maximum in-flight searches per `enrich` call. Default: 5.
    pub concurrency: usize,
    /// TTL for search results, including "no match". Default: 24h.
    pub search_ttl: Duration,
    /// TTL for the "no result" written after a failed search. Default: 5m.
    pub error_ttl: Duration,
    /// How long a minted token stays in the cache. Default: 11h.
    pub token_cache_ttl: Duration,
    /// Per-search timeout. Default: 5s.
    pub timeout: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: search::DEFAULT_BASE_URL.to_string(),
            storefront: "us".to_string(),
            artwork_size: 300,
            concurrency: 5,
            search_ttl: Duration::from_secs(24 * 60 * 60),
            error_ttl: Duration::from_secs(5 * 60),
            token_cache_ttl: Duration::from_secs(11 * 60 * 60),
            timeout: Duration::from_secs(5),
        }
    }
}

impl CatalogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn storefront(mut self, storefront: impl Into<String>) -> Self {
        self.storefront = storefront.into();
        self
    }

    pub fn artwork_size(mut self, size: u32) -> Self {
        self.artwork_size = size;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    pub fn search_ttl(mut self, ttl: Duration) -> Self {
        self.search_ttl = ttl;
        self
    }

    pub fn error_ttl(mut self, ttl: Duration) -> Self {
        self.error_ttl = ttl;
        self
    }

    pub fn token_cache_ttl(mut self, ttl: Duration) -> Self {
        self.token_cache_ttl = ttl;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Production search client for these settings.
    pub fn client(&self) -> crate::Result<AppleMusicClient> {
        AppleMusicClient::new(&self.base_url, &self.storefront, self.timeout)
    }
}

/// Token lifecycle, cached lookups and bounded-concurrency enrichment.
pub struct CatalogService {
    cache: Arc<dyn KeyValueCache>,
    search: Arc<dyn CatalogSearch>,
    minter: Option<TokenMinter>,
    clock: Arc<dyn Clock>,
    config: CatalogConfig,
}

impl CatalogService {
    /// `minter == None` means no credentials are configured: every lookup
    /// that misses the cache reports no result.
    pub fn new(
        cache: Arc<dyn KeyValueCache>,
        search: Arc<dyn CatalogSearch>,
        minter: Option<TokenMinter>,
        clock: Arc<dyn Clock>,
        config: CatalogConfig,
    ) -> Self {
        Self {
            cache,
            search,
            minter,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Bearer token for the search API, minted on demand.
    ///
    /// Returns `None` when no credentials are configured or signing fails.
    pub async fn auth_token(&self) -> Option<String> {
        match get_typed::<String>(self.cache.as_ref(), CATALOG_TOKEN_KEY).await {
            Ok(Some(token)) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "namespace" => "catalog_token")
                    .increment(1);
                return Some(token);
            }
            Ok(None) => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "namespace" => "catalog_token")
                    .increment(1);
            }
            Err(e) => warn!(error = %e, "Token cache read failed"),
        }

        let Some(minter) = &self.minter else {
            debug!("No catalog credentials configured");
            return None;
        };

        let token = match minter.mint(self.clock.now()) {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to mint catalog token");
                return None;
            }
        };

        if let Err(e) = set_typed(
            self.cache.as_ref(),
            CATALOG_TOKEN_KEY,
            &token,
            Some(self.config.token_cache_ttl),
        )
        .await
        {
            warn!(error = %e, "Failed to cache catalog token");
        }
        info!("Minted catalog token");
        Some(token)
    }

    /// Catalog match for `(title, artist)`, served from cache when possible.
    #[instrument(skip(self))]
    pub async fn lookup(&self, title: &str, artist: &str) -> Option<CatalogMetadata> {
        let key = catalog_search_key(title, artist);

        match get_typed::<Option<CatalogMetadata>>(self.cache.as_ref(), &key).await {
            Ok(Some(cached)) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "namespace" => "catalog_search")
                    .increment(1);
                let outcome = if cached.is_some() { "found" } else { "no_result" };
                metrics::counter!(telemetry::CATALOG_LOOKUPS_TOTAL, "outcome" => outcome)
                    .increment(1);
                debug!(outcome, "Catalog cache hit");
                return cached;
            }
            Ok(None) => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "namespace" => "catalog_search")
                    .increment(1);
            }
            Err(e) => warn!(error = %e, "Catalog cache read failed"),
        }

        let Some(token) = self.auth_token().await else {
            metrics::counter!(telemetry::CATALOG_LOOKUPS_TOTAL, "outcome" => "no_token")
                .increment(1);
            return None;
        };

        let (result, ttl) = match self.search.search_song(&token, title, artist).await {
            Ok(found) => {
                let outcome = if found.is_some() { "found" } else { "no_result" };
                metrics::counter!(telemetry::CATALOG_LOOKUPS_TOTAL, "outcome" => outcome)
                    .increment(1);
                (found.map(|m| self.normalize(m)), self.config.search_ttl)
            }
            Err(e) => {
                warn!(error = %e, "Catalog search failed");
                metrics::counter!(telemetry::CATALOG_LOOKUPS_TOTAL, "outcome" => "error")
                    .increment(1);
                if e.status_code() == Some(401) {
                    // Rejected token: mint a fresh one next time.
                    if let Err(e) = self.cache.delete(CATALOG_TOKEN_KEY).await {
                        warn!(error = %e, "Failed to drop rejected catalog token");
                    }
                }
                (None, self.config.error_ttl)
            }
        };

        if let Err(e) = set_typed(self.cache.as_ref(), &key, &result, Some(ttl)).await {
            warn!(error = %e, "Failed to cache catalog result");
        }
        result
    }

    /// Attach catalog metadata to every entry of `snapshot`.
    ///
    /// Entries that already carry metadata only have their artwork URL
    /// re-normalised. At most `concurrency` searches are in flight; results
    /// are paired with entries by position. Opaque payloads are returned
    /// unchanged.
    #[instrument(skip(self, snapshot), fields(chart = %snapshot.chart_id, entries = snapshot.entries.len()))]
    pub async fn enrich(&self, mut snapshot: ChartSnapshot) -> ChartSnapshot {
        if snapshot.layout == EntryLayout::Opaque {
            debug!("Unrecognised chart layout, skipping enrichment");
            return snapshot;
        }

        let entries = std::mem::take(&mut snapshot.entries);
        let pending = entries.iter().filter(|e| !e.is_enriched()).count();
        debug!(pending, "Enriching chart entries");

        snapshot.entries = stream::iter(entries)
            .map(|entry| self.enrich_entry(entry))
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;
        snapshot
    }

    async fn enrich_entry(&self, mut entry: ChartEntry) -> ChartEntry {
        entry.enrichment = match entry.enrichment.take() {
            Some(existing) => Some(self.normalize(existing)),
            None => self.lookup(&entry.title, &entry.artist).await,
        };
        entry
    }

    fn normalize(&self, mut meta: CatalogMetadata) -> CatalogMetadata {
        if let Some(url) = meta.artwork_url.as_deref() {
            meta.artwork_url = Some(normalize_artwork_url(url, self.config.artwork_size));
        }
        meta
    }
}
