//! Request Fingerprints
//!
//! A cache key is the SHA-256 of the request headers and a bounded prefix of
//! the body. Header names are lower-cased and pairs sorted before hashing, so
//! the order in which a header map is iterated never changes the key.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Hex-encoded request fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the fingerprint of a request.
///
/// Only the first `body_prefix` bytes of `body` are hashed; `0` hashes the
/// whole body. Every field is length-prefixed so adjacent values cannot run
/// into each other.
pub fn derive_key<I, K, V>(headers: I, body: &[u8], body_prefix: usize) -> CacheKey
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<[u8]>,
{
    let mut pairs: Vec<(String, Vec<u8>)> = headers
        .into_iter()
        .map(|(name, value)| {
            (
                name.as_ref().to_ascii_lowercase(),
                value.as_ref().to_vec(),
            )
        })
        .collect();
    pairs.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update((pairs.len() as u64).to_le_bytes());
    for (name, value) in &pairs {
        update_field(&mut hasher, name.as_bytes());
        update_field(&mut hasher, value);
    }

    let body = match body_prefix {
        0 => body,
        cap => &body[..body.len().min(cap)],
    };
    update_field(&mut hasher, body);

    CacheKey(hex::encode(hasher.finalize()))
}

fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}
