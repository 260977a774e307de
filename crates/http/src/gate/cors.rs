use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use shelf_kernel::settings::CorsSettings;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::warn;

use crate::error::AppError;

/// Preflight and response CORS headers for the configured origin allow-list.
pub fn cors_layer(settings: &CorsSettings) -> anyhow::Result<CorsLayer> {
    let origins = parse_origins(&settings.allowed_origins)?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .max_age(Duration::from_secs(settings.max_age_secs)))
}

fn parse_origins(origins: &[String]) -> anyhow::Result<Vec<HeaderValue>> {
    origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .with_context(|| format!("invalid CORS origin '{}'", origin))
        })
        .collect()
}

/// Origins allowed to issue state-changing requests.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed: Arc<Vec<HeaderValue>>,
}

impl OriginPolicy {
    pub fn new(settings: &CorsSettings) -> anyhow::Result<Self> {
        Ok(Self {
            allowed: Arc::new(parse_origins(&settings.allowed_origins)?),
        })
    }

    /// Requests without an `Origin` header (non-browser clients) are allowed.
    pub fn permits(&self, method: &Method, origin: Option<&HeaderValue>) -> bool {
        let state_changing = [Method::POST, Method::PUT, Method::PATCH, Method::DELETE]
            .contains(method);
        match origin {
            Some(origin) if state_changing => self.allowed.iter().any(|allowed| allowed == origin),
            _ => true,
        }
    }
}

/// Rejects cross-origin writes from origins outside the allow-list with 403.
pub async fn guard_origin(
    State(policy): State<OriginPolicy>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let origin = request.headers().get(header::ORIGIN);
    if !policy.permits(request.method(), origin) {
        warn!(
            method = %request.method(),
            path = %request.uri().path(),
            origin = ?origin,
            "cross-origin request rejected"
        );
        return Err(AppError::forbidden("Origin not allowed"));
    }
    Ok(next.run(request).await)
}
