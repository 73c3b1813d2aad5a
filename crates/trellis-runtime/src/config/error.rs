//! Errors raised while loading or validating a [`TrellisConfig`](super::TrellisConfig).

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("config file {0} does not exist")]
    FileNotFound(PathBuf),

    /// Figment failed to read a source or extract the schema.
    #[error("cannot read configuration: {0}")]
    ParseError(String),

    /// The explicit file has an extension no enabled format reads.
    #[error("unsupported config file format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("invalid configuration: {message}")]
    ValidationError { message: String },

    /// A field required by another setting is absent.
    #[error("`{field}` must be set")]
    MissingField { field: String },

    /// `definitions.middlewares` names a middleware that was never registered.
    #[error("middleware `{0}` is not registered")]
    UnknownMiddleware(String),

    /// `definitions.error_handler` names a handler that was never registered.
    #[error("error handler `{0}` is not registered")]
    UnknownErrorHandler(String),
}

impl ConfigError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
