//! Developer-token minting for the catalog API.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};

use crate::{ChartkeepError, Result};

/// Signing material for catalog developer tokens.
#[derive(Clone)]
pub struct CatalogCredentials {
    /// Key identifier, sent as the JWT `kid` header.
    pub key_id: String,
    /// Team identifier, sent as the `iss` claim.
    pub team_id: String,
    /// PKCS#8 PEM of the P-256 signing key.
    pub private_key: String,
}

impl CatalogCredentials {
    pub fn new(
        key_id: impl Into<String>,
        team_id: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Self {
        Self {
            key_id: key_id.into(),
            team_id: team_id.into(),
            private_key: private_key.into(),
        }
    }
}

impl fmt::Debug for CatalogCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogCredentials")
            .field("key_id", &self.key_id)
            .field("team_id", &self.team_id)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Claims carried by a developer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeveloperClaims {
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// Mints ES256 developer tokens.
///
/// The key is parsed on every mint, so a bad key surfaces as a
/// [`ChartkeepError::Credential`] when a token is needed, not at startup.
#[derive(Debug, Clone)]
pub struct TokenMinter {
    credentials: CatalogCredentials,
    lifetime: Duration,
}

impl TokenMinter {
    /// Default token lifetime (`exp - iat`).
    pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(12 * 60 * 60);

    pub fn new(credentials: CatalogCredentials) -> Self {
        Self {
            credentials,
            lifetime: Self::DEFAULT_LIFETIME,
        }
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Sign a token issued at `now`.
    pub fn mint(&self, now: DateTime<Utc>) -> Result<String> {
        let creds = &self.credentials;
        if creds.key_id.trim().is_empty() || creds.team_id.trim().is_empty() {
            return Err(ChartkeepError::Credential(
                "key id and team id are required".into(),
            ));
        }
        if creds.private_key.trim().is_empty() {
            return Err(ChartkeepError::Credential("signing key is empty".into()));
        }

        let key = EncodingKey::from_ec_pem(creds.private_key.as_bytes())
            .map_err(|e| ChartkeepError::Credential(format!("invalid signing key: {e}")))?;

        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(creds.key_id.clone());

        let iat = now.timestamp();
        let lifetime = i64::try_from(self.lifetime.as_secs()).unwrap_or(i64::MAX);
        let claims = DeveloperClaims {
            iss: creds.team_id.clone(),
            iat,
            exp: iat.saturating_add(lifetime),
        };

        encode(&header, &claims, &key)
            .map_err(|e| ChartkeepError::Credential(format!("signing failed: {e}")))
    }
}
