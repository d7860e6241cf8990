//! Clients for the upstream fleet API.
//!
//! Every call that needs vehicle data first exchanges the configured
//! credentials for a short-lived bearer token, then lists vehicles with it.

mod auth;
mod fleet;

pub use auth::{build_auth_header, AuthError, UpstreamAuthClient};
pub use fleet::{FetchError, UpstreamFleetClient};

use reqwest::header::HeaderValue;
use reqwest::{Client, RequestBuilder, Url};
use thiserror::Error;

use crate::config::UpstreamConfig;
use crate::models::{AccessToken, Vehicle};

/// Failure of an auth-then-fetch round.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("invalid upstream client configuration: {0}")]
    Client(String),
}

/// HTTP client that attaches a bearer token to every request.
#[derive(Debug, Clone)]
pub struct BearerClient {
    http: Client,
    base_url: Url,
    bearer: HeaderValue,
}

impl BearerClient {
    pub fn new(http: Client, base_url: Url, token: &AccessToken) -> Result<Self, AuthError> {
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token.access_token))
            .map_err(|e| AuthError::Malformed(format!("token is not a valid header value: {}", e)))?;
        bearer.set_sensitive(true);

        Ok(Self {
            http,
            base_url,
            bearer,
        })
    }

    /// GET `path`, resolved against the upstream base URL.
    pub fn get(&self, path: &str) -> Result<RequestBuilder, FetchError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| FetchError::Transport(format!("invalid request path '{}': {}", path, e)))?;

        Ok(self
            .http
            .get(url)
            .header(reqwest::header::AUTHORIZATION, self.bearer.clone()))
    }
}

/// Token client and fleet client sharing one connection pool.
#[derive(Debug, Clone)]
pub struct FleetApi {
    auth: UpstreamAuthClient,
    fleet: UpstreamFleetClient,
}

impl FleetApi {
    /// Build both clients. The configured timeout applies to every upstream request.
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| UpstreamError::Client(e.to_string()))?;

        Ok(Self {
            auth: UpstreamAuthClient::new(http, config)?,
            fleet: UpstreamFleetClient::new(),
        })
    }

    /// Fresh token, then the vehicle listing (filtered by employee when given).
    pub async fn vehicles(&self, employee_id: Option<i64>) -> Result<Vec<Vehicle>, UpstreamError> {
        let token = self.auth.fetch_token().await?;
        let client = self.auth.bearer(&token)?;
        Ok(self.fleet.fetch_vehicles(&client, employee_id).await?)
    }
}
