//! Bearer token authentication for the `/api` routes.
//!
//! Tokens are HS256 JWTs checked against the configured issuer, audience and
//! signing key. Expiry is enforced with zero clock leeway.

use std::sync::Arc;

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::config::JwtConfig;
use crate::errors::AppError;

/// Claims we read from a validated token.
#[derive(Debug, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    pub exp: u64,
}

/// Validates incoming bearer tokens.
pub struct JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.set_audience(&[&config.audience]);
        validation.leeway = 0;

        Self {
            key: DecodingKey::from_secret(config.signing_key.as_bytes()),
            validation,
        }
    }

    pub fn validate(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation).map(|data| data.claims)
    }
}

/// Auth layer function that takes the validator as a parameter.
///
/// With no validator configured every request passes (dev mode).
pub async fn jwt_auth_layer(
    validator: Option<Arc<JwtValidator>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(validator) = validator else {
        return next.run(request).await;
    };

    let bearer = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "));

    let Some(token) = bearer else {
        return unauthorized_response("Missing bearer token");
    };

    match validator.validate(token) {
        Ok(claims) => {
            tracing::debug!(sub = ?claims.sub, "Bearer token accepted");
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(error = %e, "Bearer token rejected");
            unauthorized_response("Invalid bearer token")
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    AppError::Unauthorized(message.to_string()).into_response()
}
