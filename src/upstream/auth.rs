//! Token exchange against the upstream `auth/token` endpoint.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Client, StatusCode, Url};
use thiserror::Error;
use tracing::{debug, warn};

use super::{BearerClient, UpstreamError};
use crate::config::UpstreamConfig;
use crate::models::AccessToken;

const TOKEN_PATH: &str = "auth/token";

/// Errors from the token request.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token request returned {0}")]
    Status(StatusCode),

    #[error("token request failed: {0}")]
    Transport(String),

    #[error("token response is malformed: {0}")]
    Malformed(String),

    #[error("token response has an empty access token")]
    EmptyToken,
}

/// Basic-auth header for the token endpoint, present only when both user and key are non-blank.
pub fn build_auth_header(config: &UpstreamConfig) -> Option<HeaderValue> {
    let user = config.api_user.as_deref().filter(|u| !u.trim().is_empty())?;
    let key = config.api_key.as_deref().filter(|k| !k.trim().is_empty())?;

    let encoded = STANDARD.encode(format!("{}:{}", user, key));
    let mut value = HeaderValue::from_str(&format!("Basic {}", encoded)).ok()?;
    value.set_sensitive(true);
    Some(value)
}

/// Obtains access tokens from the fleet API. No retries; callers decide.
#[derive(Debug, Clone)]
pub struct UpstreamAuthClient {
    http: Client,
    base_url: Url,
    token_url: Url,
    auth_header: Option<HeaderValue>,
}

impl UpstreamAuthClient {
    pub fn new(http: Client, config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let token_url = config
            .base_url
            .join(TOKEN_PATH)
            .map_err(|e| UpstreamError::Client(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            token_url,
            auth_header: build_auth_header(config),
        })
    }

    /// POST to the token endpoint and parse the returned token.
    pub async fn fetch_token(&self) -> Result<AccessToken, AuthError> {
        let mut request = self.http.post(self.token_url.clone());
        if let Some(header) = &self.auth_header {
            request = request.header(AUTHORIZATION, header.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "Cars API token request failed");
            return Err(AuthError::Status(status));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let token: AccessToken =
            serde_json::from_slice(&body).map_err(|e| AuthError::Malformed(e.to_string()))?;

        if token.access_token.trim().is_empty() {
            warn!("Cars API token is empty");
            return Err(AuthError::EmptyToken);
        }

        debug!(
            token_type = %token.token_type,
            expires_in_minutes = token.expires_in_minutes,
            "Cars API token acquired"
        );
        Ok(token)
    }

    /// Client for follow-up calls authenticated with `token`.
    pub fn bearer(&self, token: &AccessToken) -> Result<BearerClient, AuthError> {
        BearerClient::new(self.http.clone(), self.base_url.clone(), token)
    }
}
