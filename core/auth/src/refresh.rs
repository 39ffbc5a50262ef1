//! Transparent refresh of expired credentials.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use oauth2::{RefreshToken, TokenResponse};
use tracing::info;

use dbferry_common::{Error, Result};

use crate::credential::{Credential, TokenType};
use crate::flow::AuthFlow;
use crate::store::CredentialStore;

/// Raw result of a refresh call. `refresh_token` is only present when the
/// provider rotated it.
#[derive(Debug, Clone)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Network seam for token refresh, pluggable so tests can count calls.
#[async_trait]
pub trait RefreshTransport: Send + Sync {
    /// Trade a refresh token for a fresh access token.
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse>;
}

#[async_trait]
impl RefreshTransport for AuthFlow {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse> {
        use oauth2::reqwest::async_http_client;

        let token = self
            .oauth_client()
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| Error::Auth(format!("Token refresh failed: {}", e)))?;

        Ok(RefreshResponse {
            access_token: token.access_token().secret().clone(),
            refresh_token: token.refresh_token().map(|t| t.secret().clone()),
            expires_at: token
                .expires_in()
                .and_then(|d| Duration::from_std(d).ok())
                .map(|d| Utc::now() + d),
        })
    }
}

/// Ensures a stored credential is usable, refreshing and re-persisting it
/// when it is not.
pub struct CredentialRefresher<'a, T: RefreshTransport> {
    transport: &'a T,
    store: &'a CredentialStore,
}

impl<'a, T: RefreshTransport> CredentialRefresher<'a, T> {
    /// Create a refresher over the given transport and store.
    pub fn new(transport: &'a T, store: &'a CredentialStore) -> Self {
        Self { transport, store }
    }

    /// Return a usable credential.
    ///
    /// A still-valid credential is returned unchanged without touching the
    /// network. Otherwise exactly one refresh call is made using only the
    /// stored refresh token, and the result is persisted before being
    /// returned: refresh tokens can rotate silently, and failing to
    /// re-persist would strand the next run.
    ///
    /// # Errors
    /// - `Auth` when the grant was revoked or the record has no refresh
    ///   token; recovery requires re-authorization via the consent flow.
    pub async fn ensure_valid(&self, stored: Credential) -> Result<Credential> {
        if stored.is_valid() {
            return Ok(stored);
        }

        if !stored.has_refresh_token() {
            return Err(Error::Auth(
                "Stored credential has no refresh token; re-run with --code to re-authorize"
                    .to_string(),
            ));
        }

        info!("Access token expired, refreshing");

        let response = self.transport.refresh(&stored.refresh_token).await?;

        let refreshed = Credential {
            access_token: response.access_token,
            // Keep the original refresh token unless the provider rotated it.
            refresh_token: response.refresh_token.unwrap_or(stored.refresh_token),
            expires_at: response.expires_at,
            token_type: TokenType::Bearer,
        };

        self.store.save(&refreshed)?;

        Ok(refreshed)
    }
}
