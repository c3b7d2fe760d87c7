//! Catalog search client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::types::CatalogMetadata;
use crate::{ChartkeepError, Result, version};

/// Default base URL for the catalog API
pub(crate) const DEFAULT_BASE_URL: &str = "https://api.music.apple.com";

/// Song search against a music catalog.
#[async_trait]
pub trait CatalogSearch: Send + Sync {
    /// Best match for `title` by `artist`, or `None` when the catalog has
    /// nothing. Transport and HTTP failures are errors, not `None`.
    async fn search_song(
        &self,
        token: &str,
        title: &str,
        artist: &str,
    ) -> Result<Option<CatalogMetadata>>;
}

/// Apple Music catalog client.
#[derive(Clone)]
pub struct AppleMusicClient {
    base_url: String,
    storefront: String,
    http: Client,
}

impl AppleMusicClient {
    pub fn new(
        base_url: impl Into<String>,
        storefront: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(version::user_agent())
            .build()
            .map_err(|e| ChartkeepError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            storefront: storefront.into(),
            http,
        })
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Self::new(base_url, "us", Duration::from_secs(5))
    }

    fn handle_response_errors(response: &reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        match status.as_u16() {
            429 => Err(ChartkeepError::RateLimited {
                retry_after: response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(Duration::from_secs),
            }),
            code => Err(ChartkeepError::Api {
                status: code,
                message: format!("catalog search returned {status}"),
            }),
        }
    }
}

#[async_trait]
impl CatalogSearch for AppleMusicClient {
    #[instrument(skip(self, token))]
    async fn search_song(
        &self,
        token: &str,
        title: &str,
        artist: &str,
    ) -> Result<Option<CatalogMetadata>> {
        let url = format!(
            "{}/v1/catalog/{}/search",
            self.base_url, self.storefront
        );
        let term = format!("{title} {artist}");

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&[("term", term.as_str()), ("types", "songs"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| ChartkeepError::Http(e.to_string()))?;

        Self::handle_response_errors(&response)?;

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ChartkeepError::Payload(e.to_string()))?;

        let found = body.into_first_song();
        debug!(found = found.is_some(), "Catalog search complete");
        Ok(found)
    }
}

// Wire format of the search endpoint. Only the fields we keep are modelled.

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: SearchResults,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResults {
    songs: Option<SongPage>,
}

#[derive(Debug, Deserialize)]
struct SongPage {
    #[serde(default)]
    data: Vec<SongResource>,
}

#[derive(Debug, Deserialize)]
struct SongResource {
    id: String,
    #[serde(default)]
    attributes: SongAttributes,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SongAttributes {
    url: Option<String>,
    #[serde(default)]
    previews: Vec<Preview>,
    artwork: Option<Artwork>,
    duration_in_millis: Option<u64>,
    isrc: Option<String>,
    release_date: Option<String>,
    #[serde(default)]
    genre_names: Vec<String>,
    album_name: Option<String>,
    artist_name: Option<String>,
    composer_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Preview {
    url: String,
}

#[derive(Debug, Deserialize)]
struct Artwork {
    url: String,
}

impl SearchResponse {
    fn into_first_song(self) -> Option<CatalogMetadata> {
        let song = self.results.songs?.data.into_iter().next()?;
        let attrs = song.attributes;
        Some(CatalogMetadata {
            id: song.id,
            url: attrs.url.unwrap_or_default(),
            preview_url: attrs.previews.into_iter().next().map(|p| p.url),
            artwork_url: attrs.artwork.map(|a| a.url),
            duration_ms: attrs.duration_in_millis,
            isrc: attrs.isrc,
            release_date: attrs.release_date,
            genres: attrs.genre_names,
            album_name: attrs.album_name,
            artist_name: attrs.artist_name,
            composer_name: attrs.composer_name,
        })
    }
}
