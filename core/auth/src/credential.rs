//! Credential record and validity rules.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Tokens this close to expiring are treated as already expired, so a
/// credential cannot go stale between the validity check and the API calls
/// that use it.
const EXPIRY_MARGIN_MINUTES: i64 = 5;

/// OAuth2 token type. Google only issues bearer tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    #[default]
    Bearer,
}

/// A delegated credential: a short-lived access token plus the long-lived
/// refresh token used to mint new ones.
///
/// Created by the authorization-code exchange, mutated by the refresher
/// (access token and expiry replaced, refresh token preserved unless the
/// provider rotates it), destroyed only by deleting the persisted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Access token for API requests.
    pub access_token: String,
    /// Refresh token for obtaining new access tokens.
    pub refresh_token: String,
    /// When the access token expires. Absent for refresh-only records.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub token_type: TokenType,
}

impl Credential {
    /// Whether the access token is still usable for API calls.
    ///
    /// Refresh-only records (no expiry) are never usable directly; they
    /// route to the refresher.
    pub fn is_valid(&self) -> bool {
        match self.expires_at {
            Some(at) => at > Utc::now() + Duration::minutes(EXPIRY_MARGIN_MINUTES),
            None => false,
        }
    }

    /// Whether this record can be refreshed without user interaction.
    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }
}
