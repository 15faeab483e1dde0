//! Result Cache Module
//!
//! Avoids recomputing analysis results for requests whose headers and body
//! prefix are unchanged, within a fixed time-to-live.
//!
//! - Keys are SHA-256 fingerprints of the header set and the first
//!   `body_prefix_bytes` of the body
//! - Entries expire lazily: a read that finds an expired entry removes it
//! - The store is bounded; inserting a new key at capacity evicts the oldest
//!   entry by insertion time
//! - There is no background sweep

pub mod config;
pub mod key;
pub mod store;

pub use config::CacheConfig;
pub use key::{derive_key, CacheKey};
pub use store::{CacheStats, ResultCache};
