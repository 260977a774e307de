use serde::{Deserialize, Serialize};
use serde_json::json;
use shelf_http::AppError;

/// Body of `/login` and `/register`.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut details = Vec::new();
        if self.username.trim().is_empty() {
            details.push(json!({"field": "username", "error": "required"}));
        }
        if self.password.is_empty() {
            details.push(json!({"field": "password", "error": "required"}));
        }
        if details.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation(details, "Invalid credentials"))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_password() {
        let credentials = Credentials {
            username: "alice".to_string(),
            password: "hunter2".to_string(),
        };
        let printed = format!("{:?}", credentials);
        assert!(printed.contains("alice"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn empty_fields_are_rejected() {
        let credentials = Credentials {
            username: " ".to_string(),
            password: String::new(),
        };
        match credentials.validate().unwrap_err() {
            AppError::Validation { details, .. } => assert_eq!(details.len(), 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
