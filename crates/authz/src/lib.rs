//! Authentication primitives: password hashing, signed bearer tokens and
//! shared-secret comparison.

mod error;
pub mod password;
pub mod secret;
pub mod token;

pub use error::AuthError;
pub use password::{hash_password, verify_password};
pub use secret::{api_key_matches, generate_secret};
pub use token::{Claims, TokenService};
