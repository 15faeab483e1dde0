//! PageLens Gateway Library
//!
//! Request governance for the PageLens analysis API: per-tenant admission
//! control over fixed windows, and a bounded, time-limited cache of analysis
//! results keyed by request fingerprint.

pub mod analyzer;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod metrics;
pub mod rate_limit;

pub use cache::{CacheConfig, CacheKey, ResultCache};
pub use config::Config;
pub use error::{GovernanceError, Result};
pub use rate_limit::{AdmissionController, Decision, RateLimitConfig};
