//! Configuration loading for chartkeepd.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.chartkeep/config.toml` (user)
//! 3. `/etc/chartkeep/config.toml` (system)
//!
//! With no file and no explicit path, built-in defaults apply.
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.chartkeep/secrets.toml` (user, must be 0600)
//! 2. `/etc/chartkeep/secrets.toml` (system, must be 0600)
//!
//! Each secret falls back to an environment variable.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::Weekday;
use tracing::warn;

use crate::cache::MemoryCache;
use crate::catalog::{CatalogConfig, CatalogCredentials};
use crate::handler::{Chartkeep, ChartkeepBuilder};
use crate::refresh::RefreshPolicy;
use crate::upstream::UpstreamConfig;
use crate::{ChartkeepError, Result};

/// Daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamSection,
    #[serde(default)]
    pub refresh: RefreshSection,
    #[serde(default)]
    pub catalog: CatalogSection,
    #[serde(default)]
    pub cache: CacheSection,
}

/// Server network configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:5000).
    #[serde(default = "default_address")]
    pub address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1:5000".to_string()
}

/// Chart provider connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamSection {
    pub base_url: String,
    pub host: String,
    pub timeout_secs: u64,
}

impl Default for UpstreamSection {
    fn default() -> Self {
        let defaults = UpstreamConfig::default();
        Self {
            base_url: defaults.base_url,
            host: defaults.host,
            timeout_secs: defaults.timeout.as_secs(),
        }
    }
}

/// Refresh schedule and TTLs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefreshSection {
    /// Weekday name, full or abbreviated ("tuesday", "tue").
    pub day: String,
    pub current_ttl_secs: u64,
    pub pending_ttl_secs: u64,
    pub rate_limit_cooldown_secs: u64,
}

impl Default for RefreshSection {
    fn default() -> Self {
        let defaults = RefreshPolicy::default();
        Self {
            day: "tuesday".to_string(),
            current_ttl_secs: defaults.current_ttl.as_secs(),
            pending_ttl_secs: defaults.pending_ttl.as_secs(),
            rate_limit_cooldown_secs: defaults.rate_limit_cooldown.as_secs(),
        }
    }
}

/// Catalog enrichment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogSection {
    pub base_url: String,
    pub storefront: String,
    pub artwork_size: u32,
    pub concurrency: usize,
    pub search_ttl_secs: u64,
    pub error_ttl_secs: u64,
    pub timeout_secs: u64,
}

impl Default for CatalogSection {
    fn default() -> Self {
        let defaults = CatalogConfig::default();
        Self {
            base_url: defaults.base_url,
            storefront: defaults.storefront,
            artwork_size: defaults.artwork_size,
            concurrency: defaults.concurrency,
            search_ttl_secs: defaults.search_ttl.as_secs(),
            error_ttl_secs: defaults.error_ttl.as_secs(),
            timeout_secs: defaults.timeout.as_secs(),
        }
    }
}

/// In-process cache sizing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub max_entries: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_entries: crate::cache::memory::DEFAULT_MAX_ENTRIES,
        }
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided, must exist)
    /// 2. `~/.chartkeep/config.toml`
    /// 3. `/etc/chartkeep/config.toml`
    /// 4. Built-in defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ChartkeepError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            ChartkeepError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(ChartkeepError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".chartkeep").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        let system_config = PathBuf::from("/etc/chartkeep/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    pub fn upstream_config(&self) -> UpstreamConfig {
        UpstreamConfig::new()
            .base_url(&self.upstream.base_url)
            .host(&self.upstream.host)
            .timeout(Duration::from_secs(self.upstream.timeout_secs))
    }

    pub fn refresh_policy(&self) -> Result<RefreshPolicy> {
        let day = Weekday::from_str(self.refresh.day.trim()).map_err(|_| {
            ChartkeepError::Configuration(format!(
                "refresh.day is not a weekday: {:?}",
                self.refresh.day
            ))
        })?;
        Ok(RefreshPolicy::new()
            .refresh_day(day)
            .current_ttl(Duration::from_secs(self.refresh.current_ttl_secs))
            .pending_ttl(Duration::from_secs(self.refresh.pending_ttl_secs))
            .rate_limit_cooldown(Duration::from_secs(self.refresh.rate_limit_cooldown_secs)))
    }

    pub fn catalog_config(&self) -> Result<CatalogConfig> {
        if self.catalog.concurrency == 0 {
            return Err(ChartkeepError::Configuration(
                "catalog.concurrency must be at least 1".into(),
            ));
        }
        let c = &self.catalog;
        Ok(CatalogConfig::new()
            .base_url(&c.base_url)
            .storefront(&c.storefront)
            .artwork_size(c.artwork_size)
            .concurrency(c.concurrency)
            .search_ttl(Duration::from_secs(c.search_ttl_secs))
            .error_ttl(Duration::from_secs(c.error_ttl_secs))
            .timeout(Duration::from_secs(c.timeout_secs)))
    }

    /// Handler builder populated from this config and `secrets`.
    pub fn handler_builder(&self, secrets: &Secrets) -> Result<ChartkeepBuilder> {
        let mut builder = Chartkeep::builder()
            .upstream_config(self.upstream_config())
            .refresh_policy(self.refresh_policy()?)
            .catalog_config(self.catalog_config()?)
            .cache(std::sync::Arc::new(MemoryCache::with_max_entries(
                self.cache.max_entries,
            )));

        if let Some(key) = secrets.rapidapi_key() {
            builder = builder.rapidapi(key);
        }
        if let Some(credentials) = secrets.catalog_credentials()? {
            builder = builder.catalog_credentials(credentials);
        }
        Ok(builder)
    }
}

/// Secrets configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub rapidapi: Option<ApiKeySecret>,
    #[serde(default)]
    pub apple_music: Option<AppleMusicSecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

/// Catalog signing material.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppleMusicSecret {
    pub key_id: Option<String>,
    pub team_id: Option<String>,
    /// PEM text, or a path to a PEM file.
    pub auth_key: Option<String>,
}

const RAPIDAPI_ENV: &str = "RAPID_API_KEY";
const KEY_ID_ENV: &str = "APPLE_MUSIC_KEY_ID";
const TEAM_ID_ENV: &str = "APPLE_MUSIC_TEAM_ID";
const AUTH_KEY_ENV: &str = "APPLE_MUSIC_AUTH_KEY";

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Returns empty secrets if no file exists (environment variables still
    /// apply).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".chartkeep").join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from_file(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/chartkeep/secrets.toml");
        if system_secrets.exists() {
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    /// Load one secrets file, rejecting group- or world-readable files.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            ChartkeepError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            ChartkeepError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            ChartkeepError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(ChartkeepError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// RapidAPI key, falling back to `RAPID_API_KEY`.
    pub fn rapidapi_key(&self) -> Option<String> {
        self.rapidapi
            .as_ref()
            .map(|s| s.api_key.clone())
            .or_else(|| env_nonempty(RAPIDAPI_ENV))
    }

    /// Catalog credentials, each field falling back to its environment
    /// variable.
    ///
    /// `None` when nothing is configured. A partial set is logged and
    /// treated as none.
    pub fn catalog_credentials(&self) -> Result<Option<CatalogCredentials>> {
        let file = self.apple_music.clone().unwrap_or_default();
        let key_id = file.key_id.or_else(|| env_nonempty(KEY_ID_ENV));
        let team_id = file.team_id.or_else(|| env_nonempty(TEAM_ID_ENV));
        let auth_key = file.auth_key.or_else(|| env_nonempty(AUTH_KEY_ENV));

        match (key_id, team_id, auth_key) {
            (None, None, None) => Ok(None),
            (Some(key_id), Some(team_id), Some(auth_key)) => Ok(Some(CatalogCredentials::new(
                key_id,
                team_id,
                resolve_pem(&auth_key)?,
            ))),
            (key_id, team_id, auth_key) => {
                warn!(
                    key_id = key_id.is_some(),
                    team_id = team_id.is_some(),
                    auth_key = auth_key.is_some(),
                    "Incomplete catalog credentials, enrichment disabled"
                );
                Ok(None)
            }
        }
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Accept inline PEM (with literal `\n` escapes, as env files tend to
/// carry them) or a path to a PEM file.
fn resolve_pem(value: &str) -> Result<String> {
    let value = value.trim();
    if value.starts_with("-----BEGIN") {
        return Ok(value.replace("\\n", "\n"));
    }
    fs::read_to_string(value).map_err(|e| {
        ChartkeepError::Configuration(format!("Failed to read catalog key {value:?}: {e}"))
    })
}
