//! API key generation and hashing.
//!
//! Keys are shown to their owner exactly once. Only the SHA-256 digest and
//! a short display prefix are persisted.

use rand::Rng;

/// Marker prepended to every key so leaked keys are easy to grep for.
pub const KEY_MARKER: &str = "kdr_";

/// Number of random alphanumeric characters after the marker.
pub const KEY_RANDOM_LENGTH: usize = 48;

/// Number of leading characters (marker included) stored for display.
pub const KEY_PREFIX_LENGTH: usize = 12;

/// Longest lifetime a caller may request.
pub const MAX_KEY_LIFETIME_DAYS: i64 = 365;

/// The result of generating a new API key.
pub struct GeneratedApiKey {
    /// The plaintext key (shown to the user exactly once, never stored).
    pub plaintext: String,
    /// The first [`KEY_PREFIX_LENGTH`] characters of the key for display.
    pub prefix: String,
    /// The SHA-256 hex digest of the plaintext key (stored in the database).
    pub hash: String,
}

pub fn generate_api_key() -> GeneratedApiKey {
    let random: String = rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(KEY_RANDOM_LENGTH)
        .map(char::from)
        .collect();
    let key = format!("{KEY_MARKER}{random}");

    GeneratedApiKey {
        prefix: extract_prefix(&key).to_string(),
        hash: hash_api_key(&key),
        plaintext: key,
    }
}

/// Compute the SHA-256 hex digest of an API key.
pub fn hash_api_key(key: &str) -> String {
    crate::hashing::sha256_hex(key.as_bytes())
}

/// Extract the display prefix from a plaintext API key.
pub fn extract_prefix(key: &str) -> &str {
    let end = key
        .char_indices()
        .nth(KEY_PREFIX_LENGTH)
        .map_or(key.len(), |(i, _)| i);
    &key[..end]
}

/// Cheap shape check before hitting the database.
pub fn looks_like_api_key(key: &str) -> bool {
    key.strip_prefix(KEY_MARKER).is_some_and(|rest| {
        rest.len() == KEY_RANDOM_LENGTH && rest.chars().all(|c| c.is_ascii_alphanumeric())
    })
}
