//! Configuration module for the Trellis runtime.
//!
//! This module provides figment-based configuration loading and validation
//! for logging and process-wide resolver definition settings.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    DefinitionsConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, SpanEventConfig,
    TrellisConfig,
};
pub use validation::validate_config;
