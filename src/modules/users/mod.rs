pub mod models;

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use axum::{extract::State, routing::post, Json, Router};
use serde_json::json;
use shelf_authz::{hash_password, verify_password, AuthError, TokenService};
use shelf_db::UserStore;
use shelf_http::{AppError, JsonBody};
use shelf_kernel::{InitCtx, Migration, Module};
use tracing::{debug, info};

use models::{Credentials, MessageResponse, TokenResponse};

const INVALID_CREDENTIALS: &str = "Invalid username or password";

#[derive(Clone)]
pub struct UsersState {
    pub store: Arc<dyn UserStore>,
    pub tokens: Arc<TokenService>,
}

/// Registration and password login issuing bearer tokens
pub struct UsersModule {
    state: UsersState,
}

impl UsersModule {
    pub fn new(state: UsersState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for UsersModule {
    fn name(&self) -> &'static str {
        "users"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            token_ttl_secs = self.state.tokens.ttl().as_secs(),
            "users module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/login", post(login))
            .route("/register", post(register))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/login": {
                    "post": {
                        "summary": "Exchange credentials for a bearer token",
                        "tags": ["Users"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/Credentials" }
                                }
                            }
                        },
                        "responses": {
                            "200": {
                                "description": "Signed token",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Token" }
                                    }
                                }
                            },
                            "400": { "$ref": "#/components/responses/BadRequest" },
                            "401": { "$ref": "#/components/responses/Unauthorized" }
                        }
                    }
                },
                "/register": {
                    "post": {
                        "summary": "Register a user",
                        "tags": ["Users"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/Credentials" }
                                }
                            }
                        },
                        "responses": {
                            "200": {
                                "description": "Registered",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "object",
                                            "properties": { "message": { "type": "string" } }
                                        }
                                    }
                                }
                            },
                            "400": { "$ref": "#/components/responses/BadRequest" }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Credentials": {
                        "type": "object",
                        "properties": {
                            "username": { "type": "string" },
                            "password": { "type": "string", "format": "password" }
                        },
                        "required": ["username", "password"]
                    },
                    "Token": {
                        "type": "object",
                        "properties": { "token": { "type": "string" } },
                        "required": ["token"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: r#"
                CREATE TABLE IF NOT EXISTS users (
                    id            BIGSERIAL PRIMARY KEY,
                    username      TEXT NOT NULL UNIQUE CHECK (username <> ''),
                    password_hash TEXT NOT NULL,
                    created_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
                    updated_at    TIMESTAMPTZ NOT NULL DEFAULT now()
                );
                "#,
        }]
    }
}

/// Runs Argon2 work on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AuthError> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(work)
        .await
        .context("password hashing task failed")?;
    Ok(result?)
}

async fn login(
    State(state): State<UsersState>,
    JsonBody(credentials): JsonBody<Credentials>,
) -> Result<Json<TokenResponse>, AppError> {
    credentials.validate()?;

    let username = credentials.username.trim();
    let Some(user) = state.store.find_user(username).await? else {
        debug!(%username, "login for unknown user");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    };

    let hash = user.password_hash.clone();
    let password = credentials.password;
    let matches = blocking(move || verify_password(&password, &hash)).await?;
    if !matches {
        debug!(username = %user.username, "login with wrong password");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    }

    let token = state.tokens.issue(&user.username)?;
    info!(username = %user.username, "user logged in");
    Ok(Json(TokenResponse { token }))
}

async fn register(
    State(state): State<UsersState>,
    JsonBody(credentials): JsonBody<Credentials>,
) -> Result<Json<MessageResponse>, AppError> {
    credentials.validate()?;

    let password = credentials.password;
    let hash = blocking(move || hash_password(&password)).await?;
    let user = state
        .store
        .create_user(credentials.username.trim(), &hash)
        .await?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(Json(MessageResponse {
        message: "Registration successful",
    }))
}
