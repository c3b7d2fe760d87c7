//! Integration tests for catalog lookups and enrichment.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use wiremock::matchers::{header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chartkeep::cache::keys::{CATALOG_TOKEN_KEY, catalog_search_key};
use chartkeep::catalog::{
    AppleMusicClient, CatalogConfig, CatalogCredentials, CatalogSearch, CatalogService,
    TokenMinter,
};
use chartkeep::{
    CatalogMetadata, ChartEntry, ChartSnapshot, KeyValueCache, MemoryCache, Result, SystemClock,
};

const PRIVATE_KEY: &str = include_str!("fixtures/catalog_key.pem");

fn minter() -> TokenMinter {
    TokenMinter::new(CatalogCredentials::new("KEY123", "TEAM456", PRIVATE_KEY))
}

fn service(
    cache: Arc<MemoryCache>,
    search: Arc<dyn CatalogSearch>,
    minter: Option<TokenMinter>,
    config: CatalogConfig,
) -> CatalogService {
    CatalogService::new(cache, search, minter, Arc::new(SystemClock), config)
}

fn song_result(id: &str, artwork: &str) -> Value {
    json!({
        "results": {"songs": {"data": [{
            "id": id,
            "attributes": {
                "url": format!("https://music.apple.com/us/song/{id}"),
                "previews": [{"url": format!("https://audio.example/{id}.m4a")}],
                "artwork": {"url": artwork},
                "artistName": "Miley Cyrus",
                "albumName": "Endless Summer Vacation"
            }
        }]}}
    })
}

fn chart(entries: Vec<ChartEntry>) -> ChartSnapshot {
    let body = json!({
        "chart": {"date": "2023-04-08", "entries": entries}
    });
    ChartSnapshot::from_payload("hot-100", None, body).unwrap()
}

// =============================================================================
// Lookups against a mock catalog
// =============================================================================

#[tokio::test]
async fn lookup_finds_and_normalises_artwork() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/catalog/us/search"))
        .and(query_param("term", "Flowers Miley Cyrus"))
        .and(query_param("types", "songs"))
        .and(query_param("limit", "1"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(song_result(
            "1663973562",
            "https://img.example/thumb/{w}x{h}bb.jpg",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let cache = Arc::new(MemoryCache::new());
    let client = Arc::new(AppleMusicClient::with_base_url(server.uri()).unwrap());
    let svc = service(cache.clone(), client, Some(minter()), CatalogConfig::new());

    let found = svc.lookup("Flowers", "Miley Cyrus").await.unwrap();
    assert_eq!(found.id, "1663973562");
    assert_eq!(
        found.artwork_url.as_deref(),
        Some("https://img.example/thumb/300x300bb.jpg")
    );

    // Second lookup is served from cache (mock expects exactly one call).
    let again = svc.lookup("Flowers", "Miley Cyrus").await.unwrap();
    assert_eq!(again, found);

    // The token was minted once and cached.
    let token = cache.get(CATALOG_TOKEN_KEY).await.unwrap().unwrap();
    assert_eq!(token.as_str().unwrap().split('.').count(), 3);
}

#[tokio::test]
async fn no_match_is_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/catalog/us/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let cache = Arc::new(MemoryCache::new());
    let client = Arc::new(AppleMusicClient::with_base_url(server.uri()).unwrap());
    let svc = service(cache.clone(), client, Some(minter()), CatalogConfig::new());

    let title = "This Song Definitely Does Not Exist";
    let artist = "Nonexistent Artist";
    assert_eq!(svc.lookup(title, artist).await, None);
    assert_eq!(svc.lookup(title, artist).await, None);

    assert_eq!(
        cache.get(&catalog_search_key(title, artist)).await.unwrap(),
        Some(Value::Null)
    );
}

#[tokio::test]
async fn search_failure_is_cached_briefly() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/catalog/us/search"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let cache = Arc::new(MemoryCache::new());
    let client = Arc::new(AppleMusicClient::with_base_url(server.uri()).unwrap());
    let config = CatalogConfig::new().error_ttl(Duration::from_millis(100));
    let svc = service(cache.clone(), client, Some(minter()), config);

    assert_eq!(svc.lookup("Song", "Artist").await, None);
    // Inside the error window: no new call.
    assert_eq!(svc.lookup("Song", "Artist").await, None);

    tokio::time::sleep(Duration::from_millis(250)).await;
    // Window over: retried.
    assert_eq!(svc.lookup("Song", "Artist").await, None);
}

#[tokio::test]
async fn missing_credentials_skip_search_and_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(song_result("1", "x")))
        .expect(0)
        .mount(&server)
        .await;

    let cache = Arc::new(MemoryCache::new());
    let client = Arc::new(AppleMusicClient::with_base_url(server.uri()).unwrap());
    let svc = service(cache.clone(), client, None, CatalogConfig::new());

    assert_eq!(svc.lookup("Song", "Artist").await, None);
    assert_eq!(
        cache.get(&catalog_search_key("Song", "Artist")).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn unusable_signing_key_yields_no_token() {
    let cache = Arc::new(MemoryCache::new());
    let client = Arc::new(AppleMusicClient::with_base_url("http://127.0.0.1:9").unwrap());
    let bad = TokenMinter::new(CatalogCredentials::new("KEY", "TEAM", "not a key"));
    let svc = service(cache.clone(), client, Some(bad), CatalogConfig::new());

    assert_eq!(svc.auth_token().await, None);
    assert_eq!(cache.get(CATALOG_TOKEN_KEY).await.unwrap(), None);
}

// =============================================================================
// Enrichment with an in-process catalog
// =============================================================================

/// Catalog that knows every song, answers slower for earlier positions and
/// records peak concurrency.
#[derive(Default)]
struct SlowCatalog {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl CatalogSearch for SlowCatalog {
    async fn search_song(
        &self,
        _token: &str,
        title: &str,
        _artist: &str,
    ) -> Result<Option<CatalogMetadata>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.seen.lock().unwrap().push(title.to_string());

        let position: u64 = title.trim_start_matches("Song ").parse().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(5 * (20 - position.min(20)))).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(Some(
            CatalogMetadata::new(format!("id-{title}"), format!("https://music.example/{title}"))
                .with_artwork_url("https://img.example/{w}x{h}bb.jpg"),
        ))
    }
}

fn numbered_entries(n: u32) -> Vec<ChartEntry> {
    (1..=n)
        .map(|i| ChartEntry::new(i, format!("Song {i}"), "Artist"))
        .collect()
}

#[tokio::test]
async fn enrich_is_bounded_and_positional() {
    let catalog = Arc::new(SlowCatalog::default());
    let svc = service(
        Arc::new(MemoryCache::new()),
        catalog.clone(),
        Some(minter()),
        CatalogConfig::new().concurrency(3),
    );

    let enriched = svc.enrich(chart(numbered_entries(12))).await;

    assert_eq!(catalog.calls.load(Ordering::SeqCst), 12);
    assert!(catalog.peak.load(Ordering::SeqCst) <= 3);
    for entry in &enriched.entries {
        let meta = entry.enrichment.as_ref().unwrap();
        assert_eq!(meta.id, format!("id-{}", entry.title));
        assert_eq!(
            meta.artwork_url.as_deref(),
            Some("https://img.example/300x300bb.jpg")
        );
    }
    let ranks: Vec<_> = enriched.entries.iter().map(|e| e.rank).collect();
    assert_eq!(ranks, (1..=12).map(Some).collect::<Vec<_>>());
}

#[tokio::test]
async fn enrich_is_idempotent() {
    let catalog = Arc::new(SlowCatalog::default());
    let svc = service(
        Arc::new(MemoryCache::new()),
        catalog.clone(),
        Some(minter()),
        CatalogConfig::new(),
    );

    let once = svc.enrich(chart(numbered_entries(4))).await;
    let twice = svc.enrich(once.clone()).await;

    assert_eq!(once, twice);
    assert_eq!(catalog.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn already_enriched_entries_are_only_renormalised() {
    let catalog = Arc::new(SlowCatalog::default());
    let svc = service(
        Arc::new(MemoryCache::new()),
        catalog.clone(),
        Some(minter()),
        CatalogConfig::new().artwork_size(600),
    );

    let mut entries = numbered_entries(2);
    entries[0].enrichment = Some(
        CatalogMetadata::new("1234", "http://example.com")
            .with_artwork_url("https://img.example/100x100bb.jpg"),
    );

    let enriched = svc.enrich(chart(entries)).await;

    let first = enriched.entries[0].enrichment.as_ref().unwrap();
    assert_eq!(first.id, "1234");
    assert_eq!(
        first.artwork_url.as_deref(),
        Some("https://img.example/600x600bb.jpg")
    );
    let seen: HashSet<String> = catalog.seen.lock().unwrap().iter().cloned().collect();
    assert_eq!(seen, HashSet::from(["Song 2".to_string()]));
}

#[tokio::test]
async fn legacy_apple_music_field_counts_as_enriched() {
    let catalog = Arc::new(SlowCatalog::default());
    let svc = service(
        Arc::new(MemoryCache::new()),
        catalog.clone(),
        Some(minter()),
        CatalogConfig::new(),
    );

    let snapshot = ChartSnapshot::from_payload(
        "hot-100",
        None,
        json!({"chart": {"entries": [{
            "title": "Bohemian Rhapsody",
            "artist": "Queen",
            "apple_music": {"id": "1234", "url": "http://example.com"}
        }]}}),
    )
    .unwrap();

    let enriched = svc.enrich(snapshot).await;
    assert_eq!(catalog.calls.load(Ordering::SeqCst), 0);
    assert_eq!(enriched.entries[0].enrichment.as_ref().unwrap().id, "1234");
}

#[tokio::test]
async fn enrich_without_token_leaves_entries_bare() {
    let catalog = Arc::new(SlowCatalog::default());
    let svc = service(
        Arc::new(MemoryCache::new()),
        catalog.clone(),
        None,
        CatalogConfig::new(),
    );

    let enriched = svc.enrich(chart(numbered_entries(3))).await;
    assert!(enriched.entries.iter().all(|e| e.enrichment.is_none()));
    assert_eq!(catalog.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn songs_layout_is_enriched() {
    let catalog = Arc::new(SlowCatalog::default());
    let svc = service(
        Arc::new(MemoryCache::new()),
        catalog,
        Some(minter()),
        CatalogConfig::new(),
    );

    let snapshot = ChartSnapshot::from_payload(
        "hot-100",
        None,
        json!({"songs": [{"name": "Song 1", "artist": "Queen"}]}),
    )
    .unwrap();

    let payload = svc.enrich(snapshot).await.to_payload().unwrap();
    assert_eq!(payload["songs"][0]["name"], "Song 1");
    assert_eq!(payload["songs"][0]["enrichment"]["id"], "id-Song 1");
}
