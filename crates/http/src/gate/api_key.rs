use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use shelf_authz::api_key_matches;
use tracing::debug;

use crate::error::AppError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// The shared secret clients present in `X-API-Key`.
#[derive(Clone)]
pub struct ApiKey(Arc<str>);

impl ApiKey {
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(****)")
    }
}

pub async fn require_api_key(
    State(expected): State<ApiKey>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .map(|value| value.to_str().unwrap_or_default());

    match presented {
        Some(key) if api_key_matches(key, &expected.0) => Ok(next.run(request).await),
        Some(_) => {
            debug!(path = %request.uri().path(), "invalid API key");
            Err(AppError::unauthorized("Invalid API key"))
        }
        None => {
            debug!(path = %request.uri().path(), "missing API key");
            Err(AppError::unauthorized("Missing API key"))
        }
    }
}
