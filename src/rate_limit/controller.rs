//! Admission Controller
//!
//! Fixed-window request quotas per tenant. One mutex guards the whole window
//! map, so decisions for a tenant are serialized. A background janitor drops
//! windows that have fully elapsed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::RateLimitConfig;
use super::stats::{ControllerStats, TenantSnapshot};
use super::window::{Decision, TenantWindow};
use crate::clock::{Clock, SystemClock};
use crate::error::{GovernanceError, Result};
use crate::metrics;

/// Per-tenant admission controller
#[derive(Debug)]
pub struct AdmissionController {
    inner: Arc<ControllerInner>,
    janitor: Mutex<Option<Janitor>>,
}

#[derive(Debug)]
struct ControllerInner {
    windows: Mutex<HashMap<String, TenantWindow>>,
    default_limit: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
}

#[derive(Debug)]
struct Janitor {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl AdmissionController {
    /// Create a controller on the system clock.
    ///
    /// Must be called inside a tokio runtime when the janitor is enabled.
    pub fn new(config: &RateLimitConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a controller on a custom clock and start its janitor.
    pub fn with_clock(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let inner = Arc::new(ControllerInner {
            windows: Mutex::new(HashMap::new()),
            default_limit: config.default_limit,
            window: config.window(),
            clock,
        });

        let janitor = match config.cleanup_interval() {
            Some(period) => Some(Janitor::spawn(Arc::clone(&inner), period)?),
            None => None,
        };

        info!(
            default_limit = config.default_limit,
            window_secs = config.window_secs,
            janitor = janitor.is_some(),
            "Admission controller started"
        );

        Ok(Self {
            inner,
            janitor: Mutex::new(janitor),
        })
    }

    /// Count a request against `tenant_key` and decide whether it may proceed.
    ///
    /// `tenant_limit == 0` selects the default quota. A rejected request still
    /// consumes a slot, so retrying inside the window never frees capacity.
    pub fn check_and_consume(&self, tenant_key: &str, tenant_limit: u32) -> Decision {
        let limit = if tenant_limit == 0 {
            self.inner.default_limit
        } else {
            tenant_limit
        };
        let now = self.inner.clock.now();

        let (decision, count, tracked) = {
            let mut windows = self.inner.lock_windows();
            let window = windows
                .entry(tenant_key.to_owned())
                .or_insert_with(|| TenantWindow::new(now, limit));

            if window.is_elapsed(now, self.inner.window) {
                window.reset(now);
            }
            window.limit = limit;
            window.count = window.count.saturating_add(1);

            let decision = Decision {
                allowed: window.count <= u64::from(limit),
                limit,
                remaining: window.remaining(),
                reset_at: window.reset_at(self.inner.window),
            };
            (decision, window.count, windows.len())
        };

        metrics::TRACKED_TENANTS.set(tracked as i64);
        if decision.allowed {
            metrics::ADMISSIONS_TOTAL.with_label_values(&["allowed"]).inc();
            debug!(
                tenant = tenant_key,
                count,
                remaining = decision.remaining,
                "Request admitted"
            );
        } else {
            metrics::ADMISSIONS_TOTAL.with_label_values(&["rejected"]).inc();
            warn!(
                tenant = tenant_key,
                count,
                limit,
                reset_at = %decision.reset_at,
                "Tenant quota exhausted"
            );
        }

        decision
    }

    /// Snapshot of every tracked tenant window
    pub fn stats(&self) -> ControllerStats {
        let now = self.inner.clock.now();
        let copied: Vec<(String, TenantWindow)> = {
            let windows = self.inner.lock_windows();
            windows
                .iter()
                .map(|(tenant, window)| (tenant.clone(), window.clone()))
                .collect()
        };

        let mut tenants: Vec<TenantSnapshot> = copied
            .into_iter()
            .map(|(tenant, window)| TenantSnapshot {
                expired: window.is_elapsed(now, self.inner.window),
                count: window.count,
                limit: window.limit,
                remaining: window.remaining(),
                window_start: window.window_start,
                reset_at: window.reset_at(self.inner.window),
                tenant,
            })
            .collect();
        tenants.sort_by(|a, b| a.tenant.cmp(&b.tenant));

        ControllerStats {
            generated_at: now,
            tracked_tenants: tenants.len(),
            default_limit: self.inner.default_limit,
            window_secs: self.inner.window.as_secs(),
            tenants,
        }
    }

    /// Remove windows that have fully elapsed. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.inner.sweep_expired()
    }

    /// Number of tenant windows currently held
    pub fn tracked_tenants(&self) -> usize {
        self.inner.lock_windows().len()
    }

    /// Quota applied when a tenant has no override
    pub fn default_limit(&self) -> u32 {
        self.inner.default_limit
    }

    /// Window length
    pub fn window(&self) -> Duration {
        self.inner.window
    }

    /// Current time according to the controller's clock
    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.inner.clock.now()
    }

    /// Whether the janitor task is still running
    pub fn is_janitor_running(&self) -> bool {
        self.lock_janitor()
            .as_ref()
            .map(|j| !j.handle.is_finished())
            .unwrap_or(false)
    }

    /// Stop the janitor and wait for it to exit. Idempotent.
    pub async fn shutdown(&self) {
        let janitor = self.lock_janitor().take();
        if let Some(janitor) = janitor {
            let _ = janitor.shutdown_tx.send(true);
            if let Err(e) = janitor.handle.await {
                if !e.is_cancelled() {
                    warn!("Admission janitor ended abnormally: {}", e);
                }
            }
            info!("Admission janitor stopped");
        }
    }

    fn lock_janitor(&self) -> MutexGuard<'_, Option<Janitor>> {
        self.janitor.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for AdmissionController {
    fn drop(&mut self) {
        if let Some(janitor) = self.lock_janitor().take() {
            janitor.handle.abort();
        }
    }
}

impl ControllerInner {
    // Every critical section leaves the map consistent, so a poisoned lock is
    // still safe to use.
    fn lock_windows(&self) -> MutexGuard<'_, HashMap<String, TenantWindow>> {
        self.windows.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let (removed, remaining) = {
            let mut windows = self.lock_windows();
            let before = windows.len();
            windows.retain(|_, w| !w.is_elapsed(now, self.window));
            (before - windows.len(), windows.len())
        };

        metrics::TRACKED_TENANTS.set(remaining as i64);
        if removed > 0 {
            metrics::WINDOWS_SWEPT_TOTAL.inc_by(removed as u64);
            debug!(removed, remaining, "Swept elapsed tenant windows");
        }
        removed
    }
}

impl Janitor {
    fn spawn(inner: Arc<ControllerInner>, period: Duration) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| GovernanceError::RuntimeUnavailable("admission janitor"))?;
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        inner.sweep_expired();
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        Ok(Self {
            shutdown_tx,
            handle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};

    fn manual_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ))
    }

    fn config(default_limit: u32, window_secs: u64) -> RateLimitConfig {
        RateLimitConfig {
            default_limit,
            window_secs,
            cleanup_interval_secs: 0,
            ..RateLimitConfig::default()
        }
    }

    #[test]
    fn test_limit_then_reject() {
        let controller =
            AdmissionController::with_clock(&config(3, 60), manual_clock()).unwrap();

        for expected_remaining in [2, 1, 0] {
            let decision = controller.check_and_consume("tenant-a", 0);
            assert!(decision.allowed);
            assert_eq!(decision.limit, 3);
            assert_eq!(decision.remaining, expected_remaining);
        }

        let decision = controller.check_and_consume("tenant-a", 0);
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[test]
    fn test_rejected_requests_still_count() {
        let controller =
            AdmissionController::with_clock(&config(1, 60), manual_clock()).unwrap();

        controller.check_and_consume("tenant-a", 0);
        controller.check_and_consume("tenant-a", 0);
        controller.check_and_consume("tenant-a", 0);

        let stats = controller.stats();
        assert_eq!(stats.tenants[0].count, 3);
        assert_eq!(stats.tenants[0].remaining, 0);
    }

    #[test]
    fn test_window_elapses_and_resets() {
        let clock = manual_clock();
        let controller = AdmissionController::with_clock(&config(2, 60), clock.clone()).unwrap();

        controller.check_and_consume("tenant-a", 0);
        controller.check_and_consume("tenant-a", 0);
        assert!(!controller.check_and_consume("tenant-a", 0).allowed);

        clock.advance(Duration::from_secs(60));
        let decision = controller.check_and_consume("tenant-a", 0);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 1);
        assert_eq!(controller.stats().tenants[0].count, 1);
        assert_eq!(decision.reset_at, clock.now() + chrono::Duration::seconds(60));
    }

    #[test]
    fn test_window_still_active_just_before_boundary() {
        let clock = manual_clock();
        let controller = AdmissionController::with_clock(&config(1, 60), clock.clone()).unwrap();

        controller.check_and_consume("tenant-a", 0);
        clock.advance(Duration::from_millis(59_999));
        assert!(!controller.check_and_consume("tenant-a", 0).allowed);
    }

    #[test]
    fn test_tenants_are_isolated() {
        let controller =
            AdmissionController::with_clock(&config(1, 60), manual_clock()).unwrap();

        assert!(controller.check_and_consume("tenant-a", 0).allowed);
        assert!(!controller.check_and_consume("tenant-a", 0).allowed);
        assert!(controller.check_and_consume("tenant-b", 0).allowed);
        assert_eq!(controller.tracked_tenants(), 2);
    }

    #[test]
    fn test_tenant_limit_overrides_default() {
        let controller =
            AdmissionController::with_clock(&config(10, 3600), manual_clock()).unwrap();

        let remaining: Vec<u32> = (0..5)
            .map(|_| controller.check_and_consume("tenant-a", 5))
            .inspect(|d| assert!(d.allowed))
            .map(|d| d.remaining)
            .collect();
        assert_eq!(remaining, vec![4, 3, 2, 1, 0]);

        let decision = controller.check_and_consume("tenant-a", 5);
        assert!(!decision.allowed);
        assert_eq!(decision.limit, 5);
        assert_eq!(decision.remaining, 0);
        assert!(decision.retry_after_secs(controller.now()) > 0);
    }

    #[test]
    fn test_empty_tenant_key_is_a_tenant() {
        let controller =
            AdmissionController::with_clock(&config(1, 60), manual_clock()).unwrap();

        assert!(controller.check_and_consume("", 0).allowed);
        assert!(!controller.check_and_consume("", 0).allowed);
    }

    #[test]
    fn test_sweep_removes_only_elapsed_windows() {
        let clock = manual_clock();
        let controller = AdmissionController::with_clock(&config(5, 60), clock.clone()).unwrap();

        controller.check_and_consume("old", 0);
        clock.advance(Duration::from_secs(30));
        controller.check_and_consume("fresh", 0);
        clock.advance(Duration::from_secs(30));

        assert_eq!(controller.sweep_expired(), 1);
        let stats = controller.stats();
        assert_eq!(stats.tracked_tenants, 1);
        assert_eq!(stats.tenants[0].tenant, "fresh");
    }

    #[test]
    fn test_stats_snapshot() {
        let controller =
            AdmissionController::with_clock(&config(10, 60), manual_clock()).unwrap();

        controller.check_and_consume("tenant-b", 4);
        controller.check_and_consume("tenant-a", 0);
        controller.check_and_consume("tenant-a", 0);

        let stats = controller.stats();
        assert_eq!(stats.default_limit, 10);
        assert_eq!(stats.window_secs, 60);
        assert_eq!(stats.tracked_tenants, 2);
        assert_eq!(stats.tenants[0].tenant, "tenant-a");
        assert_eq!(stats.tenants[0].count, 2);
        assert_eq!(stats.tenants[0].remaining, 8);
        assert_eq!(stats.tenants[1].limit, 4);
        assert_eq!(stats.tenants[1].remaining, 3);
        assert!(!stats.tenants[0].expired);
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let err = AdmissionController::with_clock(&config(0, 60), manual_clock()).unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidConfig(_)));
    }

    #[test]
    fn test_janitor_requires_runtime() {
        let config = RateLimitConfig {
            cleanup_interval_secs: 1,
            ..RateLimitConfig::default()
        };
        let err = AdmissionController::new(&config).unwrap_err();
        assert!(matches!(err, GovernanceError::RuntimeUnavailable(_)));
    }

    #[tokio::test]
    async fn test_janitor_sweeps_and_stops() {
        let clock = manual_clock();
        let config = RateLimitConfig {
            default_limit: 5,
            window_secs: 1,
            cleanup_interval_secs: 1,
            ..RateLimitConfig::default()
        };
        let controller = AdmissionController::with_clock(&config, clock.clone()).unwrap();
        assert!(controller.is_janitor_running());

        controller.check_and_consume("tenant-a", 0);
        clock.advance(Duration::from_secs(2));

        tokio::time::timeout(Duration::from_secs(5), async {
            while controller.tracked_tenants() > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .expect("janitor did not sweep the elapsed window");

        controller.shutdown().await;
        assert!(!controller.is_janitor_running());

        // A second shutdown is a no-op.
        controller.shutdown().await;
    }
}
