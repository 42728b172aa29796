//! Maps profile names to storage directory names.

use sha2::{Digest, Sha256};

/// Normalized form used for both name comparison and hashing, so two names
/// compare equal exactly when they share a storage directory.
pub fn normalize(name: &str) -> String {
    name.to_lowercase()
}

/// Case-insensitive name equality.
pub fn same_name(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// SHA-256 of the normalized name, hex encoded.
///
/// The output is 64 lowercase hex characters and therefore a valid path
/// segment on every filesystem.
pub fn dir_name(name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(name).as_bytes());
    hex::encode(hasher.finalize())
}
