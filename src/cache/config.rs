//! Result Cache Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{GovernanceError, Result};

/// Default maximum number of cached results
pub const DEFAULT_MAX_SIZE: usize = 1000;
/// Default entry time-to-live in milliseconds (5 minutes)
pub const DEFAULT_TTL_MS: u64 = 5 * 60 * 1000;
/// Default number of body bytes that feed the cache key
pub const DEFAULT_BODY_PREFIX_BYTES: usize = 1024;

/// Result cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable result caching on the HTTP surface
    pub enabled: bool,

    /// Maximum number of entries held at once
    pub max_size: usize,

    /// Entry time-to-live in milliseconds
    pub ttl_ms: u64,

    /// Body bytes hashed into the key (0 hashes the full body)
    pub body_prefix_bytes: usize,

    /// Request headers left out of the key (case-insensitive)
    pub ignored_headers: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: DEFAULT_MAX_SIZE,
            ttl_ms: DEFAULT_TTL_MS,
            body_prefix_bytes: DEFAULT_BODY_PREFIX_BYTES,
            ignored_headers: vec!["x-request-id".to_string(), "traceparent".to_string()],
        }
    }
}

impl CacheConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Overlay `PAGELENS_CACHE_*` variables onto this configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("PAGELENS_CACHE_ENABLED") {
            self.enabled = val.parse().unwrap_or(self.enabled);
        }

        if let Ok(val) = std::env::var("PAGELENS_CACHE_MAX_SIZE") {
            if let Ok(size) = val.parse() {
                self.max_size = size;
            }
        }

        if let Ok(val) = std::env::var("PAGELENS_CACHE_TTL_MS") {
            if let Ok(ttl) = val.parse() {
                self.ttl_ms = ttl;
            }
        }

        if let Ok(val) = std::env::var("PAGELENS_CACHE_BODY_PREFIX") {
            if let Ok(prefix) = val.parse() {
                self.body_prefix_bytes = prefix;
            }
        }
    }

    /// Entry time-to-live
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Whether a header takes part in the cache key
    pub fn is_keyed_header(&self, name: &str) -> bool {
        !self
            .ignored_headers
            .iter()
            .any(|ignored| ignored.eq_ignore_ascii_case(name))
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(GovernanceError::InvalidConfig(
                "cache.max_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
