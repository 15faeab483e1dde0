// Prometheus metrics for the PageLens gateway
//
// Exposes metrics on the /metrics HTTP endpoint:
// - Admission decisions (counter, by outcome)
// - Tracked tenant windows (gauge)
// - Result cache lookups, evictions and size

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Registry, TextEncoder};
use std::sync::{Arc, Once};

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    // Admission control metrics
    pub static ref ADMISSIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("admissions_total", "Admission decisions by outcome"),
        &["outcome"]
    ).expect("Failed to create admissions metric");

    pub static ref TRACKED_TENANTS: IntGauge = IntGauge::new(
        "tracked_tenant_windows",
        "Number of tenant windows currently held in memory"
    ).expect("Failed to create tracked tenants metric");

    pub static ref WINDOWS_SWEPT_TOTAL: IntCounter = IntCounter::new(
        "tenant_windows_swept_total",
        "Total number of elapsed tenant windows removed by the janitor"
    ).expect("Failed to create windows swept metric");

    // Result cache metrics
    pub static ref CACHE_LOOKUPS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("result_cache_lookups_total", "Result cache lookups by outcome"),
        &["outcome"]
    ).expect("Failed to create cache lookups metric");

    pub static ref CACHE_EVICTIONS_TOTAL: IntCounter = IntCounter::new(
        "result_cache_evictions_total",
        "Entries evicted to make room for new results"
    ).expect("Failed to create cache evictions metric");

    pub static ref CACHE_ENTRIES: IntGauge = IntGauge::new(
        "result_cache_entries",
        "Entries physically present in the result cache"
    ).expect("Failed to create cache entries metric");
}

static INIT: Once = Once::new();

/// Register all collectors with the registry. Safe to call more than once.
pub fn init() {
    INIT.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(ADMISSIONS_TOTAL.clone()),
            Box::new(TRACKED_TENANTS.clone()),
            Box::new(WINDOWS_SWEPT_TOTAL.clone()),
            Box::new(CACHE_LOOKUPS_TOTAL.clone()),
            Box::new(CACHE_EVICTIONS_TOTAL.clone()),
            Box::new(CACHE_ENTRIES.clone()),
        ];
        for collector in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                tracing::warn!("Failed to register metric: {}", e);
            }
        }
    });
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}
