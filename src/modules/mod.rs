pub mod books;
pub mod users;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use shelf_authz::TokenService;
use shelf_kernel::{settings::Settings, ModuleRegistry};

use crate::backends::Backends;
use books::{BooksModule, BooksState, CachedListing};
use users::{UsersModule, UsersState};

/// Register the catalogue modules, wired to the given backends.
pub fn register_all(
    registry: &mut ModuleRegistry,
    backends: &Backends,
    settings: &Settings,
) -> anyhow::Result<()> {
    let tokens = Arc::new(
        TokenService::new(
            &settings.auth.jwt_secret,
            Duration::from_secs(settings.auth.token_ttl_secs),
        )
        .context("failed to configure token signing")?,
    );

    let listing = CachedListing::new(
        backends.books.clone(),
        backends.cache.clone(),
        Duration::from_secs(settings.cache.list_ttl_secs),
    );

    registry.register(Arc::new(UsersModule::new(UsersState {
        store: backends.users.clone(),
        tokens: tokens.clone(),
    })));
    registry.register(Arc::new(BooksModule::new(BooksState {
        store: backends.books.clone(),
        listing,
        tokens,
        pagination: settings.pagination.clone(),
    })));

    Ok(())
}
