use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use shelf_authz::TokenService;
use tracing::debug;

use crate::error::AppError;

/// Username of the bearer of a valid token.
///
/// Extracting it rejects the request with 401 when the `Authorization`
/// header is missing, is not a `Bearer` credential, or carries a token that
/// fails verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<TokenService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::unauthorized("Missing Authorization Header"))?;

        let token = value
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::unauthorized("Invalid Authorization Header"))?;

        let tokens = Arc::<TokenService>::from_ref(state);
        let subject = tokens.verify(token).map_err(|err| {
            debug!(error = %err, "bearer token rejected");
            AppError::from(err)
        })?;

        Ok(Self(subject))
    }
}
