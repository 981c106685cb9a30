//! Error types for the cache
//!
//! Provides unified error handling using thiserror. Steady-state cache
//! operations never fail; errors only surface at construction, configuration
//! loading and shutdown.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// TTL is enabled but there is no tokio runtime to host the sweeper
    #[error("Runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    /// An environment variable is present but cannot be parsed
    #[error("Invalid config: {var}={value:?}")]
    InvalidConfig { var: String, value: String },

    /// The background sweep task terminated abnormally
    #[error("Sweeper failed: {0}")]
    SweeperFailed(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
