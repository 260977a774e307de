use serde::{Deserialize, Serialize};
use serde_json::json;
use shelf_db::{BookChanges, NewBook};
use shelf_http::AppError;
use shelf_kernel::settings::PaginationSettings;

/// Response envelope: `{"data": ...}`.
#[derive(Debug, Serialize)]
pub struct Data<T> {
    pub data: T,
}

impl<T> Data<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Request model for creating a new book.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBook {
    /// Title of the book
    pub title: String,
    /// Author of the book
    pub author: String,
}

impl CreateBook {
    /// Both fields are required and must not be blank.
    pub fn validate(self) -> Result<NewBook, AppError> {
        let mut details = Vec::new();
        if self.title.trim().is_empty() {
            details.push(json!({"field": "title", "error": "required"}));
        }
        if self.author.trim().is_empty() {
            details.push(json!({"field": "author", "error": "required"}));
        }
        if !details.is_empty() {
            return Err(AppError::validation(details, "Invalid book"));
        }

        Ok(NewBook {
            title: self.title,
            author: self.author,
        })
    }
}

/// Request model for updating a book. Omitted or blank fields keep their
/// current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBook {
    pub title: Option<String>,
    pub author: Option<String>,
}

impl UpdateBook {
    pub fn into_changes(self) -> BookChanges {
        let present = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        BookChanges {
            title: present(self.title),
            author: present(self.author),
        }
    }
}

/// `?offset=&limit=` on the listing endpoint.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl PageQuery {
    /// Apply defaults and bounds, returning `(offset, limit)`.
    pub fn resolve(self, pagination: &PaginationSettings) -> Result<(u64, u64), AppError> {
        let offset = self.offset.unwrap_or(0);
        let limit = self.limit.unwrap_or(pagination.default_limit);

        if limit == 0 || limit > pagination.max_limit {
            return Err(AppError::validation(
                vec![json!({
                    "field": "limit",
                    "error": format!("must be between 1 and {}", pagination.max_limit)
                })],
                "Invalid limit",
            ));
        }

        Ok((offset, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn blank_fields_fail_validation() {
        let err = CreateBook {
            title: "  ".to_string(),
            author: "Ursula K. Le Guin".to_string(),
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        match err {
            AppError::Validation { details, .. } => {
                assert_eq!(details, vec![json!({"field": "title", "error": "required"})]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn valid_book_converts() {
        let book = CreateBook {
            title: "The Dispossessed".to_string(),
            author: "Ursula K. Le Guin".to_string(),
        }
        .validate()
        .unwrap();
        assert_eq!(book.title, "The Dispossessed");
    }

    #[test]
    fn blank_update_fields_are_ignored() {
        let changes = UpdateBook {
            title: Some("".to_string()),
            author: Some("Le Guin".to_string()),
        }
        .into_changes();
        assert_eq!(changes.title, None);
        assert_eq!(changes.author.as_deref(), Some("Le Guin"));
        assert!(UpdateBook::default().into_changes().is_empty());
    }

    #[test]
    fn page_defaults_apply() {
        let pagination = PaginationSettings::default();
        assert_eq!(PageQuery::default().resolve(&pagination).unwrap(), (0, 10));
        let query = PageQuery {
            offset: Some(20),
            limit: Some(100),
        };
        assert_eq!(query.resolve(&pagination).unwrap(), (20, 100));
    }

    #[test]
    fn page_limit_out_of_range_is_rejected() {
        let pagination = PaginationSettings::default();
        for limit in [0, 101] {
            let query = PageQuery {
                offset: None,
                limit: Some(limit),
            };
            assert!(query.resolve(&pagination).is_err(), "limit {limit}");
        }
    }
}
