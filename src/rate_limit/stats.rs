//! Admission Control Diagnostics
//!
//! Serializable snapshots of the controller state for the admin endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate view over all tracked tenants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerStats {
    /// Timestamp of snapshot generation
    pub generated_at: DateTime<Utc>,

    /// Number of tenant windows held in memory
    pub tracked_tenants: usize,

    /// Quota applied to tenants without an override
    pub default_limit: u32,

    /// Window length in seconds
    pub window_secs: u64,

    /// Per-tenant windows, ordered by tenant id
    pub tenants: Vec<TenantSnapshot>,
}

/// Copy of one tenant window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSnapshot {
    pub tenant: String,
    pub count: u64,
    pub limit: u32,
    pub remaining: u32,
    pub window_start: DateTime<Utc>,
    pub reset_at: DateTime<Utc>,

    /// Window has elapsed but the janitor has not removed it yet
    pub expired: bool,
}

impl ControllerStats {
    /// Tenants currently being rejected
    pub fn rejecting_tenants(&self) -> usize {
        self.tenants
            .iter()
            .filter(|t| !t.expired && t.count >= u64::from(t.limit))
            .count()
    }

    /// Requests counted across all active windows
    pub fn active_requests(&self) -> u64 {
        self.tenants
            .iter()
            .filter(|t| !t.expired)
            .map(|t| t.count)
            .sum()
    }

    /// Look up one tenant
    pub fn tenant(&self, tenant: &str) -> Option<&TenantSnapshot> {
        self.tenants.iter().find(|t| t.tenant == tenant)
    }
}
