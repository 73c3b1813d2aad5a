//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{DefinitionsConfig, LogOutput, LoggingConfig, TrellisConfig};

/// Validates the entire configuration.
///
/// Whether configured names refer to registered middlewares is checked later,
/// when definitions are built.
pub fn validate_config(config: &TrellisConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_definitions_config(&config.definitions)?;
    Ok(())
}

/// Validates logging settings.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if logging.filters.keys().any(|target| target.trim().is_empty()) {
        return Err(ConfigError::validation("Log filter targets cannot be empty"));
    }

    Ok(())
}

/// Validates global middleware and error handler names.
fn validate_definitions_config(definitions: &DefinitionsConfig) -> ConfigResult<()> {
    if definitions.middlewares.iter().any(|name| name.trim().is_empty()) {
        return Err(ConfigError::validation("Middleware names cannot be empty"));
    }

    if definitions
        .error_handler
        .as_deref()
        .is_some_and(|name| name.trim().is_empty())
    {
        return Err(ConfigError::validation("Error handler name cannot be empty"));
    }

    Ok(())
}
