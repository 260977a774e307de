//! Record store for SHELF: the [`BookStore`] and [`UserStore`] capabilities
//! and their drivers.
//!
//! [`PostgresStore`] is the production driver; [`MemoryStore`] keeps rows in
//! process so tests and local runs need no database.

mod error;
mod memory;
mod postgres;
pub mod records;

use async_trait::async_trait;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use records::{Book, BookChanges, NewBook, User};

/// CRUD over book rows.
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Books ordered by id, skipping `offset` and returning at most `limit`.
    async fn list_books(&self, offset: u64, limit: u64) -> Result<Vec<Book>, StoreError>;

    async fn find_book(&self, id: i64) -> Result<Book, StoreError>;

    async fn create_book(&self, book: NewBook) -> Result<Book, StoreError>;

    /// Apply the present fields of `changes`; absent fields keep their value.
    async fn update_book(&self, id: i64, changes: BookChanges) -> Result<Book, StoreError>;

    async fn delete_book(&self, id: i64) -> Result<(), StoreError>;
}

/// Account rows used by login and registration.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user. Fails with [`StoreError::Conflict`] if the username is
    /// taken.
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError>;

    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError>;
}
