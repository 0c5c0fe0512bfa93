//! Error types for Horizon Stack core.

use thiserror::Error;

/// Errors raised while constructing core services.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The background pool could not be created.
    #[error("failed to create background pool: {0}")]
    PoolCreation(String),
}

/// A specialized Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
