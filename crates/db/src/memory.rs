use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::{Book, BookChanges, BookStore, NewBook, StoreError, User, UserStore};

#[derive(Default)]
struct Tables {
    books: BTreeMap<i64, Book>,
    users: HashMap<String, User>,
    next_book_id: i64,
    next_user_id: i64,
}

/// In-process store. Ids are assigned from a monotonic sequence starting at 1
/// and never reused, mirroring a `BIGSERIAL` column.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn book_count(&self) -> usize {
        self.tables.read().await.books.len()
    }
}

#[async_trait]
impl BookStore for MemoryStore {
    async fn list_books(&self, offset: u64, limit: u64) -> Result<Vec<Book>, StoreError> {
        let tables = self.tables.read().await;
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(tables
            .books
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_book(&self, id: i64) -> Result<Book, StoreError> {
        let tables = self.tables.read().await;
        tables.books.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn create_book(&self, book: NewBook) -> Result<Book, StoreError> {
        let mut tables = self.tables.write().await;
        tables.next_book_id += 1;
        let now = OffsetDateTime::now_utc();
        let book = Book {
            id: tables.next_book_id,
            title: book.title,
            author: book.author,
            created_at: now,
            updated_at: now,
        };
        tables.books.insert(book.id, book.clone());
        Ok(book)
    }

    async fn update_book(&self, id: i64, changes: BookChanges) -> Result<Book, StoreError> {
        let mut tables = self.tables.write().await;
        let book = tables.books.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(title) = changes.title {
            book.title = title;
        }
        if let Some(author) = changes.author {
            book.author = author;
        }
        book.updated_at = OffsetDateTime::now_utc();
        Ok(book.clone())
    }

    async fn delete_book(&self, id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables
            .books
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.users.contains_key(username) {
            return Err(StoreError::Conflict(format!(
                "username '{}' is already taken",
                username
            )));
        }

        tables.next_user_id += 1;
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: tables.next_user_id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.username.clone(), user.clone());
        Ok(user)
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(username).cloned())
    }
}
