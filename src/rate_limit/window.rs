//! Tenant Windows and Admission Decisions
//!
//! A tenant window is a fixed-window request counter. The counter is reset to
//! zero only when the window has fully elapsed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::clock::{add_duration, elapsed_between};

/// Request counter for one tenant
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TenantWindow {
    /// Requests observed in the current window, rejected ones included
    pub count: u64,

    /// Start of the current window
    pub window_start: DateTime<Utc>,

    /// Effective quota last applied to this tenant
    pub limit: u32,
}

impl TenantWindow {
    pub fn new(now: DateTime<Utc>, limit: u32) -> Self {
        Self {
            count: 0,
            window_start: now,
            limit,
        }
    }

    /// True once `now - window_start >= window`
    pub fn is_elapsed(&self, now: DateTime<Utc>, window: Duration) -> bool {
        elapsed_between(self.window_start, now) >= window
    }

    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.count = 0;
        self.window_start = now;
    }

    pub fn remaining(&self) -> u32 {
        // Bounded by `limit`, so the narrowing is lossless.
        u64::from(self.limit).saturating_sub(self.count) as u32
    }

    pub fn reset_at(&self, window: Duration) -> DateTime<Utc> {
        add_duration(self.window_start, window)
    }
}

/// Outcome of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the request may proceed
    pub allowed: bool,

    /// Effective quota for the tenant
    pub limit: u32,

    /// Requests left in the current window
    pub remaining: u32,

    /// End of the current window
    pub reset_at: DateTime<Utc>,
}

impl Decision {
    /// Time left until the window resets, zero if already past
    pub fn retry_after(&self, now: DateTime<Utc>) -> Duration {
        elapsed_between(now, self.reset_at)
    }

    /// `retry_after` rounded up to whole seconds
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        let wait = self.retry_after(now);
        let secs = wait.as_secs();
        if wait.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }

    /// Window end as unix seconds, for the `x-ratelimit-reset` header
    pub fn reset_epoch_secs(&self) -> i64 {
        self.reset_at.timestamp()
    }
}
