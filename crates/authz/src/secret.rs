use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use subtle::ConstantTimeEq;

/// Compare a presented API key with the configured one without leaking the
/// position of the first differing byte.
pub fn api_key_matches(presented: &str, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// 256 random bits, base64 encoded. Suitable for `auth.jwt_secret` and
/// `auth.api_key`.
pub fn generate_secret() -> String {
    let mut key = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut key);
    STANDARD.encode(key)
}
