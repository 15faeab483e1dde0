// HTTP server for the governed API
//
// Routes under /v1 pass through tenant resolution and admission control;
// /health and /metrics are always reachable.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers::{
    analyze_handler, clear_cache_handler, governance_stats_handler, health_handler,
    metrics_handler,
};
use super::middleware::{admission_middleware, tenant_middleware};
use crate::analyzer::{AnalysisReport, Analyzer, NoopAnalyzer};
use crate::cache::{CacheConfig, ResultCache};
use crate::config::Config;
use crate::metrics;
use crate::rate_limit::{AdmissionController, RateLimitConfig};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<AdmissionController>,
    pub cache: Arc<ResultCache<AnalysisReport>>,
    pub analyzer: Arc<dyn Analyzer>,
    pub rate_limit: Arc<RateLimitConfig>,
    pub cache_config: Arc<CacheConfig>,
    pub metrics_enabled: bool,
}

impl AppState {
    /// Build the controller and cache described by `config`.
    ///
    /// Must run inside a tokio runtime when the admission janitor is enabled.
    pub fn from_config(config: &Config, analyzer: Arc<dyn Analyzer>) -> Result<Self> {
        let controller = AdmissionController::new(&config.rate_limit)
            .context("Failed to start admission controller")?;
        let cache = ResultCache::new(&config.cache).context("Failed to create result cache")?;

        Ok(Self {
            controller: Arc::new(controller),
            cache: Arc::new(cache),
            analyzer,
            rate_limit: Arc::new(config.rate_limit.clone()),
            cache_config: Arc::new(config.cache.clone()),
            metrics_enabled: config.server.metrics_enabled,
        })
    }
}

/// Assemble the application router.
pub fn router(state: AppState) -> Router {
    let governed = Router::new()
        .route("/v1/analyze", post(analyze_handler))
        .route("/v1/admin/governance", get(governance_stats_handler))
        .route("/v1/admin/cache/clear", post(clear_cache_handler))
        // Layers run outermost-last: tenant resolution precedes admission.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admission_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            tenant_middleware,
        ));

    let mut app = Router::new()
        .route("/health", get(health_handler))
        .merge(governed);

    if state.metrics_enabled {
        app = app.route("/metrics", get(metrics_handler));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Run the gateway until Ctrl-C, then stop the admission janitor.
pub async fn serve(config: Config) -> Result<()> {
    metrics::init();

    let state = AppState::from_config(&config, Arc::new(NoopAnalyzer))?;
    let controller = Arc::clone(&state.controller);
    let app = router(state);

    let addr = config.server.bind_addr()?;
    info!("Starting PageLens gateway on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Gateway server error")?;

    controller.shutdown().await;
    info!("PageLens gateway stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
