//! HTTP surface
//!
//! Exposes the governance layer over axum: tenant resolution, admission
//! headers and 429 responses, cached analysis, and admin and metrics
//! endpoints.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod server;

pub use error::{ApiError, ErrorCode};
pub use handlers::{CacheCleared, GovernanceStats};
pub use middleware::{TenantContext, TENANT_HEADER};
pub use server::{router, serve, AppState};
