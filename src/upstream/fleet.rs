//! Vehicle listing against the upstream `api/cars` endpoint.

use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, warn};

use super::BearerClient;
use crate::models::Vehicle;

const CARS_PATH: &str = "api/cars";

/// Errors from the vehicle listing request.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("vehicle listing returned {0}")]
    Status(StatusCode),

    #[error("vehicle listing request failed: {0}")]
    Transport(String),

    #[error("vehicle listing response is malformed: {0}")]
    Malformed(String),
}

/// Lists vehicles using a token-authenticated client.
#[derive(Debug, Clone, Default)]
pub struct UpstreamFleetClient;

impl UpstreamFleetClient {
    pub fn new() -> Self {
        Self
    }

    /// All vehicles, or only those owned by `employee_id`.
    ///
    /// A `null` body is an empty listing; anything else that fails to decode is
    /// [`FetchError::Malformed`].
    pub async fn fetch_vehicles(
        &self,
        client: &BearerClient,
        employee_id: Option<i64>,
    ) -> Result<Vec<Vehicle>, FetchError> {
        let mut request = client.get(CARS_PATH)?;
        if let Some(id) = employee_id {
            request = request.query(&[("employeeid", id)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, ?employee_id, "Cars API returned non-success status");
            return Err(FetchError::Status(status));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let vehicles: Option<Vec<Vehicle>> = serde_json::from_slice(&body).map_err(|e| {
            warn!(error = %e, ?employee_id, "Cars API response could not be parsed");
            FetchError::Malformed(e.to_string())
        })?;

        let vehicles = vehicles.unwrap_or_default();
        debug!(count = vehicles.len(), ?employee_id, "Retrieved cars from API");
        Ok(vehicles)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::{parse_base_url, UpstreamConfig};
    use crate::upstream::{AuthError, FleetApi, UpstreamError};

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/auth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok",
                "token_type": "bearer",
                "expires_in_minutes": 60
            })))
            .mount(server)
            .await;
    }

    fn api(server: &MockServer) -> FleetApi {
        FleetApi::new(&UpstreamConfig {
            base_url: parse_base_url(&server.uri()).unwrap(),
            api_user: None,
            api_key: None,
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_filtered_by_employee_with_bearer() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/cars"))
            .and(query_param("employeeid", "5"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 1, "size": "s", "doors": 3, "employeeid": 5, "trips": []}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let vehicles = api(&server).vehicles(Some(5)).await.unwrap();
        assert_eq!(vehicles.len(), 1);
        assert_eq!(vehicles[0].id, 1);
        assert_eq!(vehicles[0].employee_id, 5);
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/cars"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = api(&server).vehicles(None).await.unwrap_err();
        assert!(matches!(
            err,
            UpstreamError::Fetch(FetchError::Status(StatusCode::SERVICE_UNAVAILABLE))
        ));
    }

    #[tokio::test]
    async fn test_fetch_malformed_body() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/cars"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"cars\": 1}"))
            .mount(&server)
            .await;

        let err = api(&server).vehicles(None).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Fetch(FetchError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_fetch_null_body_is_empty() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/cars"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&server)
            .await;

        assert!(api(&server).vehicles(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_auth_failure_skips_listing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/token"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/cars"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let err = api(&server).vehicles(None).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Auth(AuthError::Status(StatusCode::FORBIDDEN))));
    }
}
