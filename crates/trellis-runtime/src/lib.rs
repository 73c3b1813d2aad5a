//! Trellis Runtime - configuration, logging and orchestration.
//!
//! This crate provides:
//! - Layered configuration loading (`ConfigLoader`, `TrellisConfig`)
//! - Logging setup on top of `tracing-subscriber` (`LoggingBuilder`)
//! - Runtime orchestration (`TrellisRuntime`): named middlewares and error
//!   handlers, resolver instances, and building definitions from them
//!
//! ```ignore
//! use trellis_runtime::TrellisRuntime;
//! use trellis_framework::ResolverHandle;
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut runtime = TrellisRuntime::new();
//!     runtime
//!         .register_error_handler("report", report)
//!         .add_resolver(ResolverHandle::new(Issues::default()));
//!
//!     let handler = runtime.build()?;
//!     // hand `handler` to the host
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

// Re-exports
pub use config::{
    ConfigError, ConfigLoader, ConfigResult, DefinitionsConfig, LoggingConfig, TrellisConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::TrellisRuntime;

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, event, info, instrument, span, trace, warn};
}
