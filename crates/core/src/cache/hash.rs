//! Queue entry key generation.

use sha2::{Digest, Sha256};

/// Namespace tag prepended to every queue entry key.
pub const ENTRY_KEY_PREFIX: &str = "lp_";

/// Compute the queue entry key for an already-normalized target URL.
///
/// The key is stable across processes, so a response can be matched back
/// to its entry from the request URL alone.
pub fn entry_key(normalized_url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_url.as_bytes());
    format!("{ENTRY_KEY_PREFIX}{}", hex::encode(hasher.finalize()))
}

/// Check whether a string has the shape of an entry key.
pub fn is_entry_key(key: &str) -> bool {
    key.strip_prefix(ENTRY_KEY_PREFIX)
        .is_some_and(|hex| hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}
