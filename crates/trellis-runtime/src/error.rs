//! Runtime error types.

use thiserror::Error;

pub use crate::config::{ConfigError, ConfigResult};

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded, validated or resolved.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Resolver definitions could not be built.
    #[error("Definition error: {0}")]
    Definition(#[from] trellis_core::DefinitionError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
