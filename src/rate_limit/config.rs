//! Admission Control Configuration
//!
//! Quota, window length and janitor cadence for the admission controller.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{GovernanceError, Result};

/// Default per-tenant quota (requests per window)
pub const DEFAULT_TENANT_LIMIT: u32 = 100;
/// Default window length in seconds
pub const DEFAULT_WINDOW_SECS: u64 = 60;
/// Default janitor sweep interval in seconds
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 300;

/// Admission control configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable admission control on the HTTP surface
    pub enabled: bool,

    /// Quota applied to tenants without an override
    pub default_limit: u32,

    /// Fixed window length in seconds
    pub window_secs: u64,

    /// Janitor sweep interval in seconds (0 disables the janitor)
    pub cleanup_interval_secs: u64,

    /// Per-tenant quota overrides, keyed by tenant id
    pub tenant_overrides: HashMap<String, u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_limit: DEFAULT_TENANT_LIMIT,
            window_secs: DEFAULT_WINDOW_SECS,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
            tenant_overrides: HashMap::new(),
        }
    }
}

impl RateLimitConfig {
    /// Create a new admission control configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Overlay `PAGELENS_RATE_LIMIT_*` variables onto this configuration.
    /// Values that do not parse are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("PAGELENS_RATE_LIMIT_ENABLED") {
            self.enabled = val.parse().unwrap_or(self.enabled);
        }

        if let Ok(val) = std::env::var("PAGELENS_RATE_LIMIT_DEFAULT") {
            if let Ok(limit) = val.parse() {
                self.default_limit = limit;
            }
        }

        if let Ok(val) = std::env::var("PAGELENS_RATE_LIMIT_WINDOW_SECS") {
            if let Ok(secs) = val.parse() {
                self.window_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("PAGELENS_RATE_LIMIT_CLEANUP_SECS") {
            if let Ok(secs) = val.parse() {
                self.cleanup_interval_secs = secs;
            }
        }
    }

    /// Window length
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Janitor sweep interval, `None` when the janitor is disabled
    pub fn cleanup_interval(&self) -> Option<Duration> {
        (self.cleanup_interval_secs > 0).then(|| Duration::from_secs(self.cleanup_interval_secs))
    }

    /// Configured quota for a tenant, or 0 when the default applies
    pub fn limit_for(&self, tenant_id: &str) -> u32 {
        self.tenant_overrides.get(tenant_id).copied().unwrap_or(0)
    }

    /// Disable admission control (for testing)
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Reject values that would make the controller meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.default_limit == 0 {
            return Err(GovernanceError::InvalidConfig(
                "rate_limit.default_limit must be > 0".to_string(),
            ));
        }
        if self.window_secs == 0 {
            return Err(GovernanceError::InvalidConfig(
                "rate_limit.window_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
