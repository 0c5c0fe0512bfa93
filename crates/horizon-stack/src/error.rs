//! Error types for Horizon Stack.
//!
//! Mutations never fail; they degrade to a no-op that still fires its
//! completion. Only the surfaces that parse input or create resources
//! return errors.

use horizon_stack_core::CoreError;
use thiserror::Error;

/// Errors from fallible Horizon Stack operations.
#[derive(Debug, Error)]
pub enum StackError {
    /// Component models could not be decoded from JSON.
    #[error("failed to decode component models: {0}")]
    Json(#[from] serde_json::Error),

    /// Controller configuration could not be parsed.
    #[error("invalid controller configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// The execution contexts could not be created.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The decoded document had an unexpected shape.
    #[error("invalid component document: {0}")]
    InvalidDocument(String),
}

/// A specialized Result type for Horizon Stack operations.
pub type Result<T> = std::result::Result<T, StackError>;
