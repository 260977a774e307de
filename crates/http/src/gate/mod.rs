//! Request gating stages.
//!
//! Stages run outermost first: rate limit, security headers (production
//! only), XSS sanitizer, CORS, API key. Bearer tokens are checked last by the
//! [`AuthenticatedUser`](jwt::AuthenticatedUser) extractor on the handlers
//! that need it. A stage that rejects short-circuits everything inside it.

pub mod api_key;
pub mod cors;
pub mod jwt;
pub mod rate_limit;
pub mod sanitize;
pub mod security_headers;

pub use api_key::{require_api_key, ApiKey, API_KEY_HEADER};
pub use cors::{cors_layer, guard_origin, OriginPolicy};
pub use jwt::AuthenticatedUser;
pub use rate_limit::{enforce_rate_limit, RateLimit};
pub use sanitize::{sanitize_request, sanitize_text, BodyLimit};
pub use security_headers::SECURITY_HEADERS;
