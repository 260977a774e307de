//! HTTP server facade for SHELF with Axum, request gating, error handling,
//! and OpenAPI support.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{routing::get, Json, Router};

use shelf_kernel::{settings::Settings, ModuleRegistry};

pub mod error;
pub mod extract;
pub mod gate;
pub mod router;

use gate::{ApiKey, OriginPolicy, RateLimit};
use router::RouterBuilder;

pub use error::AppError;
pub use extract::{JsonBody, QueryParams};
pub use gate::AuthenticatedUser;

/// Start the HTTP server and serve until `shutdown` resolves.
pub async fn start_server<F>(
    registry: &ModuleRegistry,
    settings: &Settings,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    tracing::info!(
        "starting HTTP server on {}:{}",
        settings.server.host,
        settings.server.port
    );

    let app = build_router(registry, settings).context("failed to build HTTP router")?;

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", settings.server.host, settings.server.port))
            .await
            .context("failed to bind to address")?;

    tracing::info!(
        "HTTP server listening on http://{}:{}",
        settings.server.host,
        settings.server.port
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Build the main HTTP router with all module routes mounted behind the
/// request gate.
pub fn build_router(registry: &ModuleRegistry, settings: &Settings) -> anyhow::Result<Router> {
    let rate_limit = RateLimit::new(
        Duration::from_millis(settings.rate_limit.period_ms),
        settings.rate_limit.burst,
    )?;
    let cors = gate::cors_layer(&settings.cors)?;
    let origin_policy = OriginPolicy::new(&settings.cors)?;
    let api_key = ApiKey::new(settings.auth.api_key.as_str());

    let mut router_builder = RouterBuilder::new()
        .mount_api(registry, get(api_root), api_key)
        .route("/healthz", get(health_check))
        .with_openapi(registry)
        .with_origin_guard(origin_policy)
        .with_cors(cors)
        .with_sanitizer(settings.server.body_limit_bytes);

    if settings.environment.is_production() {
        router_builder = router_builder.with_security_headers();
    }

    let router = router_builder
        .with_rate_limit(Arc::new(rate_limit))
        .with_timeout(settings.server.request_timeout_ms)
        .with_request_id()
        .with_tracing()
        .build();

    Ok(router)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

async fn api_root() -> Json<&'static str> {
    Json("ok")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        routing::post,
    };
    use serde_json::{json, Value};
    use shelf_kernel::{settings::Environment, Module};
    use tower::ServiceExt;

    use crate::extract::JsonBody;

    const API_KEY: &str = "test-api-key";

    struct EchoModule;

    #[async_trait]
    impl Module for EchoModule {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn routes(&self) -> Router {
            Router::new().route(
                "/echo",
                post(|JsonBody(body): JsonBody<Value>| async move { Json(body) }).get(
                    |uri: axum::http::Uri| async move {
                        uri.query().unwrap_or_default().to_string()
                    },
                ),
            )
        }
    }

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.auth.api_key = API_KEY.to_string();
        settings.auth.jwt_secret = "secret".to_string();
        settings
    }

    fn app(settings: &Settings) -> Router {
        let mut registry = ModuleRegistry::new();
        registry.register(Arc::new(EchoModule));
        build_router(&registry, settings).unwrap()
    }

    fn request(method: Method, uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("x-api-key", API_KEY)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_check_needs_no_credentials() {
        let response = app(&settings())
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn api_root_answers_ok() {
        let response = app(&settings())
            .oneshot(request(Method::GET, "/api/v1/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!("ok"));
    }

    #[tokio::test]
    async fn exhausted_bucket_rejects_before_api_key_check() {
        let mut settings = settings();
        settings.rate_limit.burst = 2;
        let app = app(&settings);

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(request(Method::GET, "/api/v1/").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .clone()
            .oneshot(Request::get("/api/v1/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
        assert_eq!(body_json(response).await["error"]["code"], "rate_limited");
    }

    #[tokio::test]
    async fn missing_api_key_is_unauthorized() {
        let response = app(&settings())
            .oneshot(Request::get("/api/v1/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"]["code"], "unauthorized");
    }

    #[tokio::test]
    async fn foreign_origin_write_is_forbidden_before_api_key_check() {
        let response = app(&settings())
            .oneshot(
                Request::post("/api/v1/echo")
                    .header(header::ORIGIN, "https://evil.example")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn allowed_origin_gets_cors_headers() {
        let response = app(&settings())
            .oneshot(
                request(Method::GET, "/api/v1/")
                    .header(header::ORIGIN, "http://localhost:8001")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:8001"
        );
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
            "true"
        );
    }

    #[tokio::test]
    async fn json_strings_reach_handlers_sanitized() {
        let response = app(&settings())
            .oneshot(
                request(Method::POST, "/api/v1/echo")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"title":"<script>alert(1)</script>Dune","author":"<b>Frank</b> Herbert"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"title": "Dune", "author": "Frank Herbert"})
        );
    }

    #[tokio::test]
    async fn json_variants_are_sanitized_too() {
        for content_type in ["Application/JSON", "application/merge-patch+json"] {
            let response = app(&settings())
                .oneshot(
                    request(Method::POST, "/api/v1/echo")
                        .header(header::CONTENT_TYPE, content_type)
                        .body(Body::from(r#"{"title":"<script>alert(1)</script>Dune"}"#))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{content_type}");
            assert_eq!(body_json(response).await, json!({"title": "Dune"}), "{content_type}");
        }
    }

    #[tokio::test]
    async fn query_values_reach_handlers_sanitized() {
        let response = app(&settings())
            .oneshot(
                request(Method::GET, "/api/v1/echo?q=%3Ci%3Ehi%3C%2Fi%3E")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"q=hi");
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let mut settings = settings();
        settings.server.body_limit_bytes = 16;
        let response = app(&settings)
            .oneshot(
                request(Method::POST, "/api/v1/echo")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"title":"a much longer title than allowed"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn security_headers_only_in_production() {
        let response = app(&settings())
            .oneshot(request(Method::GET, "/api/v1/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(!response.headers().contains_key("strict-transport-security"));

        let mut production = settings();
        production.environment = Environment::Production;
        let response = app(&production)
            .oneshot(request(Method::GET, "/api/v1/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            response.headers()["strict-transport-security"],
            "max-age=315360000; includeSubDomains"
        );
        assert_eq!(response.headers()["x-frame-options"], "DENY");
        assert_eq!(
            response.headers()["content-security-policy"],
            "default-src 'self'"
        );
    }

    #[tokio::test]
    async fn rejections_still_carry_security_headers_in_production() {
        let mut production = settings();
        production.environment = Environment::Production;
        let response = app(&production)
            .oneshot(Request::get("/api/v1/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    }
}
