//! HTTP handlers for the Books module.

use std::sync::Arc;

use axum::{
    extract::{FromRef, Path, State},
    http::{HeaderName, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use shelf_authz::TokenService;
use shelf_db::{Book, BookStore, StoreError};
use shelf_http::{AppError, AuthenticatedUser, JsonBody, QueryParams};
use shelf_kernel::settings::PaginationSettings;
use tracing::info;

use super::listing::CachedListing;
use super::models::{CreateBook, Data, PageQuery, UpdateBook};

/// Reports whether a listing came from the cache.
pub const CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-cache");

/// Shared state for the books handlers.
#[derive(Clone)]
pub struct BooksState {
    pub store: Arc<dyn BookStore>,
    pub listing: CachedListing,
    pub tokens: Arc<TokenService>,
    pub pagination: PaginationSettings,
}

impl FromRef<BooksState> for Arc<TokenService> {
    fn from_ref(state: &BooksState) -> Self {
        state.tokens.clone()
    }
}

pub fn router(state: BooksState) -> Router {
    Router::new()
        .route("/books", get(list_books).post(create_book))
        .route(
            "/books/{id}",
            get(find_book).put(update_book).delete(delete_book),
        )
        .with_state(state)
}

fn book_error(err: StoreError) -> AppError {
    match err {
        StoreError::NotFound => AppError::not_found("book not found"),
        other => other.into(),
    }
}

/// Ids are positive; anything else cannot name a book.
fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::not_found("book not found"))
}

async fn list_books(
    State(state): State<BooksState>,
    QueryParams(query): QueryParams<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (offset, limit) = query.resolve(&state.pagination)?;
    let listing = state.listing.list(offset, limit).await?;

    Ok((
        [(CACHE_STATUS_HEADER, listing.cache.as_str())],
        Json(Data::new(listing.books)),
    ))
}

async fn create_book(
    State(state): State<BooksState>,
    AuthenticatedUser(username): AuthenticatedUser,
    JsonBody(input): JsonBody<CreateBook>,
) -> Result<(StatusCode, Json<Data<Book>>), AppError> {
    let book = state.store.create_book(input.validate()?).await?;
    let invalidated = state.listing.invalidate().await;

    info!(book_id = book.id, created_by = %username, invalidated, "book created");
    Ok((StatusCode::CREATED, Json(Data::new(book))))
}

async fn find_book(
    State(state): State<BooksState>,
    Path(id): Path<String>,
) -> Result<Json<Data<Book>>, AppError> {
    let id = parse_id(&id)?;
    let book = state.store.find_book(id).await.map_err(book_error)?;
    Ok(Json(Data::new(book)))
}

/// The book is looked up before the body is inspected, so an unknown id is
/// 404 even when the body is malformed.
async fn update_book(
    State(state): State<BooksState>,
    Path(id): Path<String>,
    body: Result<JsonBody<UpdateBook>, AppError>,
) -> Result<Json<Data<Book>>, AppError> {
    let id = parse_id(&id)?;
    let current = state.store.find_book(id).await.map_err(book_error)?;
    let JsonBody(input) = body?;

    let changes = input.into_changes();
    if changes.is_empty() {
        return Ok(Json(Data::new(current)));
    }

    let book = state
        .store
        .update_book(id, changes)
        .await
        .map_err(book_error)?;
    let invalidated = state.listing.invalidate().await;

    info!(book_id = book.id, invalidated, "book updated");
    Ok(Json(Data::new(book)))
}

async fn delete_book(
    State(state): State<BooksState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id)?;
    state.store.delete_book(id).await.map_err(book_error)?;
    let invalidated = state.listing.invalidate().await;

    info!(book_id = id, invalidated, "book deleted");
    Ok(StatusCode::NO_CONTENT)
}
