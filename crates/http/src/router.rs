//! Router builder for SHELF HTTP server
//!
//! Layers wrap every route present when they are added, and the layer added
//! last runs first. Call the gate methods innermost first: origin guard,
//! CORS, sanitizer, security headers, rate limit.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware,
    routing::get,
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use uuid::{Timestamp, Uuid};

use shelf_kernel::ModuleRegistry;

use crate::gate::{
    enforce_rate_limit, guard_origin, require_api_key, sanitize_request, ApiKey, BodyLimit,
    OriginPolicy, RateLimit, SECURITY_HEADERS,
};

/// Prefix every module route is mounted under.
pub const API_PREFIX: &str = "/api/v1";

/// Builder for constructing the main HTTP router
pub struct RouterBuilder {
    router: Router,
}

impl RouterBuilder {
    /// Create a new router builder
    pub fn new() -> Self {
        Self {
            router: Router::new(),
        }
    }

    /// Add a route to the router
    pub fn route(mut self, path: &str, route: axum::routing::MethodRouter) -> Self {
        self.router = self.router.route(path, route);
        self
    }

    /// Mount module routes under [`API_PREFIX`], all behind the API key check.
    ///
    /// `root` answers both `/api/v1` and `/api/v1/`.
    pub fn mount_api(
        mut self,
        registry: &ModuleRegistry,
        root: axum::routing::MethodRouter,
        api_key: ApiKey,
    ) -> Self {
        let mut api = Router::new();
        for module in registry.modules() {
            tracing::info!(
                module = module.name(),
                "mounting module routes under {}",
                API_PREFIX
            );
            api = api.merge(module.routes());
        }

        // axum panics on a route layer over zero routes.
        if api.has_routes() {
            api = api.route_layer(middleware::from_fn_with_state(
                api_key.clone(),
                require_api_key,
            ));
        }
        let root = Router::new()
            .route(API_PREFIX, root.clone())
            .route(&format!("{}/", API_PREFIX), root)
            .route_layer(middleware::from_fn_with_state(api_key, require_api_key));

        self.router = self.router.nest(API_PREFIX, api).merge(root);
        self
    }

    /// Reject writes from origins outside the CORS allow-list
    pub fn with_origin_guard(mut self, policy: OriginPolicy) -> Self {
        self.router = self
            .router
            .layer(middleware::from_fn_with_state(policy, guard_origin));
        self
    }

    /// Add CORS middleware
    pub fn with_cors(mut self, cors: CorsLayer) -> Self {
        self.router = self.router.layer(cors);
        self
    }

    /// Strip markup from JSON bodies and query values
    pub fn with_sanitizer(mut self, body_limit: usize) -> Self {
        self.router = self.router.layer(middleware::from_fn_with_state(
            BodyLimit(body_limit),
            sanitize_request,
        ));
        self
    }

    /// Add the hardening response headers
    pub fn with_security_headers(mut self) -> Self {
        for &(name, value) in SECURITY_HEADERS {
            self.router = self.router.layer(SetResponseHeaderLayer::overriding(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            ));
        }
        self
    }

    /// Add the process-wide rate limiter
    pub fn with_rate_limit(mut self, limit: Arc<RateLimit>) -> Self {
        self.router = self
            .router
            .layer(middleware::from_fn_with_state(limit, enforce_rate_limit));
        self
    }

    /// Add tracing middleware
    pub fn with_tracing(mut self) -> Self {
        self.router = self.router.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(false))
                .on_request(DefaultOnRequest::new().level(tracing::Level::INFO))
                .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
        );
        self
    }

    /// Add request ID middleware
    pub fn with_request_id(mut self) -> Self {
        self.router = self
            .router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7));
        self
    }

    /// Add timeout middleware
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.router = self
            .router
            .layer(TimeoutLayer::new(Duration::from_millis(timeout_ms)));
        self
    }

    /// Add OpenAPI documentation by collecting specs from all modules
    pub fn with_openapi(mut self, registry: &ModuleRegistry) -> Self {
        let openapi_spec = merged_openapi(registry);

        let openapi_obj: utoipa::openapi::OpenApi = serde_json::from_value(openapi_spec.clone())
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "merged OpenAPI document is invalid, serving a stub");
                utoipa::openapi::OpenApiBuilder::new()
                    .info(
                        utoipa::openapi::InfoBuilder::new()
                            .title("SHELF API")
                            .version("1.0.0")
                            .build(),
                    )
                    .build()
            });

        self.router = self.router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", openapi_obj),
        );

        self.router = self.router.route(
            "/docs/openapi.json",
            get(move || async move { axum::Json(openapi_spec.clone()) }),
        );

        self
    }

    /// Build the final router
    pub fn build(self) -> Router {
        self.router
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Merge every module's OpenAPI fragment into one document. Module paths are
/// relative to [`API_PREFIX`].
fn merged_openapi(registry: &ModuleRegistry) -> serde_json::Value {
    let mut openapi_spec = serde_json::json!({
        "openapi": "3.1.0",
        "info": {
            "title": "SHELF API",
            "version": "1.0.0",
            "description": "Book catalogue REST API"
        },
        "paths": {},
        "components": {
            "schemas": {},
            "securitySchemes": {
                "ApiKeyAuth": {
                    "type": "apiKey",
                    "in": "header",
                    "name": "X-API-Key"
                },
                "JwtAuth": {
                    "type": "http",
                    "scheme": "bearer",
                    "bearerFormat": "JWT"
                }
            }
        },
        "security": [{ "ApiKeyAuth": [] }]
    });

    openapi_spec["components"]["schemas"]["ErrorResponse"] = serde_json::json!({
        "type": "object",
        "properties": {
            "error": {
                "type": "object",
                "properties": {
                    "code": { "type": "string" },
                    "message": { "type": "string" },
                    "details": { "type": "array", "items": { "type": "object" } },
                    "trace_id": { "type": "string" },
                    "timestamp": { "type": "string" }
                },
                "required": ["code", "message", "trace_id", "timestamp"]
            }
        },
        "required": ["error"]
    });

    openapi_spec["paths"]["/healthz"] = serde_json::json!({
        "get": {
            "summary": "Health check",
            "security": [],
            "responses": {
                "200": {
                    "description": "OK",
                    "content": { "text/plain": { "schema": { "type": "string" } } }
                }
            }
        }
    });

    openapi_spec["paths"][format!("{}/", API_PREFIX)] = serde_json::json!({
        "get": {
            "summary": "API root",
            "responses": {
                "200": {
                    "description": "OK",
                    "content": { "application/json": { "schema": { "type": "string" } } }
                },
                "401": { "$ref": "#/components/responses/Unauthorized" }
            }
        }
    });

    let error_content = serde_json::json!({
        "application/json": {
            "schema": { "$ref": "#/components/schemas/ErrorResponse" }
        }
    });
    for (name, description) in [
        ("BadRequest", "Malformed or invalid input"),
        ("Unauthorized", "Missing or invalid credentials"),
        ("NotFound", "No such record"),
        ("TooManyRequests", "Rate limit exceeded"),
    ] {
        openapi_spec["components"]["responses"][name] = serde_json::json!({
            "description": description,
            "content": error_content.clone()
        });
    }

    for module in registry.modules() {
        let Some(module_spec) = module.openapi() else {
            continue;
        };

        if let Some(paths) = module_spec.get("paths").and_then(|p| p.as_object()) {
            for (path, path_item) in paths {
                let prefixed_path = format!("{}{}", API_PREFIX, path);
                openapi_spec["paths"][prefixed_path] = path_item.clone();
            }
        }

        if let Some(schemas) = module_spec
            .get("components")
            .and_then(|c| c.get("schemas"))
            .and_then(|s| s.as_object())
        {
            for (schema_name, schema_def) in schemas {
                openapi_spec["components"]["schemas"][schema_name] = schema_def.clone();
            }
        }
    }

    openapi_spec
}

/// Time-ordered request ids
#[derive(Clone)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let timestamp = Timestamp::now(uuid::NoContext);
        let request_id = Uuid::new_v7(timestamp)
            .to_string()
            .parse::<HeaderValue>()
            .ok()?;
        Some(RequestId::new(request_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{body::Body, http::StatusCode};
    use shelf_kernel::Module;
    use tower::ServiceExt;

    struct EchoModule;

    #[async_trait]
    impl Module for EchoModule {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn routes(&self) -> Router {
            Router::new().route("/echo", get(|| async { "echo" }))
        }

        fn openapi(&self) -> Option<serde_json::Value> {
            Some(serde_json::json!({
                "paths": { "/echo": { "get": { "responses": { "200": { "description": "OK" } } } } },
                "components": { "schemas": { "Echo": { "type": "string" } } }
            }))
        }
    }

    fn registry() -> ModuleRegistry {
        let mut registry = ModuleRegistry::new();
        registry.register(Arc::new(EchoModule));
        registry
    }

    fn router() -> Router {
        RouterBuilder::new()
            .mount_api(&registry(), get(|| async { "ok" }), ApiKey::new("k"))
            .with_request_id()
            .build()
    }

    fn get_request(uri: &str, api_key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(key) = api_key {
            builder = builder.header("x-api-key", key);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn module_routes_are_mounted_under_api_prefix() {
        let response = router()
            .oneshot(get_request("/api/v1/echo", Some("k")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn api_root_answers_with_and_without_slash() {
        for uri in ["/api/v1", "/api/v1/"] {
            let response = router().oneshot(get_request(uri, Some("k"))).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
        }
    }

    #[tokio::test]
    async fn api_routes_require_the_key() {
        let response = router()
            .oneshot(get_request("/api/v1/echo", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router()
            .oneshot(get_request("/api/v1/", Some("wrong")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_api_path_is_not_found() {
        let response = router()
            .oneshot(get_request("/api/v1/nope", Some("k")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn openapi_paths_are_prefixed() {
        let spec = merged_openapi(&registry());
        assert!(spec["paths"]["/api/v1/echo"].is_object());
        assert!(spec["paths"]["/healthz"].is_object());
        assert_eq!(spec["components"]["schemas"]["Echo"]["type"], "string");
        assert!(spec["components"]["securitySchemes"]["JwtAuth"].is_object());
    }
}
