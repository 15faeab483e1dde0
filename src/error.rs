//! Governance Error Types
//!
//! Admission decisions and cache lookups never fail; these errors only come
//! out of constructors, when configuration is rejected up front.

/// Error types for building the governance stores
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GovernanceError {
    /// Configuration value rejected at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The janitor needs a running tokio runtime
    #[error("No tokio runtime available to run the {0} task")]
    RuntimeUnavailable(&'static str),
}

/// Result alias for governance constructors
pub type Result<T> = std::result::Result<T, GovernanceError>;
