//! OAuth2 authorization-code flow.

use chrono::{Duration, Utc};
use oauth2::{
    basic::BasicClient, AuthUrl, AuthorizationCode, ClientId, ClientSecret, RedirectUrl, Scope,
    TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};

use dbferry_common::{Error, Result};

use crate::credential::{Credential, TokenType};
use crate::store::CredentialStore;

/// OAuth2 authorization endpoint.
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// OAuth2 token endpoint.
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Out-of-band redirect: the consent page displays the code for the
/// operator to paste back via --code.
const REDIRECT_URL: &str = "urn:ietf:wg:oauth:2.0:oob";
/// Google Drive scope limited to files this tool creates.
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// OAuth2 client settings, immutable for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub redirect_url: String,
    pub scope: String,
}

impl ClientConfig {
    /// Client settings for the Google endpoints.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            redirect_url: REDIRECT_URL.to_string(),
            scope: DRIVE_SCOPE.to_string(),
        }
    }
}

/// Result of resolving the credential for a run.
#[derive(Debug)]
pub enum AuthOutcome {
    /// No stored credential and no code: the operator must visit this URL,
    /// then re-invoke with the obtained code.
    ConsentNeeded(String),
    /// A credential is available. It may carry a stale access token; the
    /// refresher handles that, never the consent flow.
    Authorized(Credential),
}

/// Drives the authorization-code exchange against the configured endpoints.
pub struct AuthFlow {
    client: BasicClient,
    config: ClientConfig,
}

impl AuthFlow {
    /// Create a new flow controller.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            AuthUrl::new(config.auth_url.clone())
                .map_err(|e| Error::Config(format!("Invalid auth URL: {}", e)))?,
            Some(
                TokenUrl::new(config.token_url.clone())
                    .map_err(|e| Error::Config(format!("Invalid token URL: {}", e)))?,
            ),
        )
        .set_redirect_uri(
            RedirectUrl::new(config.redirect_url.clone())
                .map_err(|e| Error::Config(format!("Invalid redirect URL: {}", e)))?,
        );

        Ok(Self { client, config })
    }

    /// Get the current configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn oauth_client(&self) -> &BasicClient {
        &self.client
    }

    /// Build the consent URL. Pure URL construction, no network I/O.
    pub fn authorization_url(&self) -> String {
        let (auth_url, _csrf_token) = self
            .client
            .authorize_url(oauth2::CsrfToken::new_random)
            .add_scope(Scope::new(self.config.scope.clone()))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();

        auth_url.to_string()
    }

    /// Exchange a one-time authorization code for a credential.
    ///
    /// # Errors
    /// - Invalid or expired code (one-time codes are never retried)
    /// - Network errors
    pub async fn exchange_code(&self, code: &str) -> Result<Credential> {
        use oauth2::reqwest::async_http_client;

        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| Error::Auth(format!("Code exchange failed: {}", e)))?;

        let access_token = token.access_token().secret().clone();
        let refresh_token = token
            .refresh_token()
            .ok_or_else(|| {
                Error::Auth(
                    "No refresh token in exchange response. Ensure offline access and the \
                     consent prompt were requested."
                        .to_string(),
                )
            })?
            .secret()
            .clone();

        let expires_at = token
            .expires_in()
            .and_then(|d| Duration::from_std(d).ok())
            .map(|d| Utc::now() + d);

        Ok(Credential {
            access_token,
            refresh_token,
            expires_at,
            token_type: TokenType::Bearer,
        })
    }

    /// Resolve the credential for this run.
    ///
    /// A stored credential always wins, even when its access token is stale
    /// or absent: stale records route to the refresher. Only with no stored
    /// record does the code exchange (or the consent URL) come into play.
    pub async fn resolve(
        &self,
        store: &CredentialStore,
        code: Option<&str>,
    ) -> Result<AuthOutcome> {
        if let Some(credential) = store.load()? {
            return Ok(AuthOutcome::Authorized(credential));
        }

        let code = match code {
            Some(code) => code,
            None => return Ok(AuthOutcome::ConsentNeeded(self.authorization_url())),
        };

        let credential = self.exchange_code(code).await?;
        store.save(&credential)?;

        Ok(AuthOutcome::Authorized(credential))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_flow() -> AuthFlow {
        AuthFlow::new(ClientConfig::new("test_id", "test_secret")).unwrap()
    }

    #[test]
    fn test_authorization_url_embeds_client_scope_and_redirect() {
        let url = test_flow().authorization_url();

        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(url.contains("client_id=test_id"));
        assert!(url.contains("drive.file"));
        // Redirect target survives percent-encoding.
        assert!(url.contains("oob"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
    }

    #[test]
    fn test_invalid_endpoint_is_a_config_error() {
        let mut config = ClientConfig::new("id", "secret");
        config.auth_url = "not a url".to_string();

        match AuthFlow::new(config) {
            Err(Error::Config(_)) => {}
            Err(other) => panic!("expected Config error, got {}", other),
            Ok(_) => panic!("expected Config error, got Ok"),
        }
    }

    #[tokio::test]
    async fn test_resolve_without_code_needs_consent_and_stays_offline() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("cache.json"));

        // Endpoints that would fail instantly if contacted; consent-URL
        // construction must not touch them.
        let mut config = ClientConfig::new("test_id", "test_secret");
        config.token_url = "http://127.0.0.1:1/token".to_string();
        let flow = AuthFlow::new(config).unwrap();

        match flow.resolve(&store, None).await.unwrap() {
            AuthOutcome::ConsentNeeded(url) => {
                assert!(url.contains("client_id=test_id"));
                assert!(url.contains("drive.file"));
            }
            AuthOutcome::Authorized(_) => panic!("expected consent outcome"),
        }

        // No side effects: nothing was persisted.
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_prefers_stored_credential_even_when_stale() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("cache.json"));

        let stale = Credential {
            access_token: "stale".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: Some(Utc::now() - Duration::hours(1)),
            token_type: TokenType::Bearer,
        };
        store.save(&stale).unwrap();

        match test_flow().resolve(&store, None).await.unwrap() {
            AuthOutcome::Authorized(credential) => {
                assert_eq!(credential.access_token, "stale");
            }
            AuthOutcome::ConsentNeeded(_) => panic!("stale credential must not re-consent"),
        }
    }
}
