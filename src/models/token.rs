//! Access token returned by the upstream `auth/token` endpoint.

use serde::Deserialize;

/// Short-lived bearer token. Never persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    #[serde(alias = "accessToken")]
    pub access_token: String,
    #[serde(default, alias = "tokenType")]
    pub token_type: String,
    #[serde(default, alias = "expiresInMinutes")]
    pub expires_in_minutes: i64,
}
