//! Admission Control Module
//!
//! Per-tenant request quotas over a fixed window.
//!
//! # Features
//!
//! - Fixed-window counters keyed by tenant
//! - Per-tenant quota overrides with a process-wide default
//! - Rejected requests still consume a slot in the window
//! - Background janitor that drops elapsed windows
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Admission Controller                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  check_and_consume()        stats()        sweep_expired()   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │     Mutex<HashMap<tenant, TenantWindow>>             │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! │                         ▲                                    │
//! │                 janitor (tokio task)                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod controller;
pub mod stats;
pub mod window;

pub use config::RateLimitConfig;
pub use controller::AdmissionController;
pub use stats::{ControllerStats, TenantSnapshot};
pub use window::Decision;
