//! Runtime orchestration.
//!
//! [`TrellisRuntime`] ties configuration, logging and definition building
//! together. Middlewares and error handlers are registered under names, and
//! the configuration's `definitions` section picks which of them apply
//! globally.
//!
//! ```rust,ignore
//! use trellis_runtime::TrellisRuntime;
//!
//! // trellis.toml:
//! //   [definitions]
//! //   middlewares = ["require_license"]
//! //   error_handler = "report"
//!
//! let mut runtime = TrellisRuntime::new();
//! runtime
//!     .register_middleware("require_license", require_license)
//!     .register_error_handler("report", report)
//!     .add_resolver(ResolverHandle::new(Issues::new(store)));
//!
//! let handler = runtime.build()?;
//! ```

use std::collections::HashMap;

use tracing::{debug, info, warn};

use trellis_core::{
    BoxedErrorHandler, BoxedMiddleware, ErrorHandler, Middleware, boxed_error_handler,
    boxed_middleware,
};
use trellis_framework::{DefinitionsBuilder, DefinitionsHandler, ResolverInstance};

use crate::config::{ConfigError, ConfigLoader, TrellisConfig, validate_config};
use crate::error::RuntimeResult;
use crate::logging;

/// Owns resolver instances and named middlewares, and builds definitions
/// from them according to the configuration.
pub struct TrellisRuntime {
    config: TrellisConfig,
    middlewares: HashMap<String, BoxedMiddleware>,
    error_handlers: HashMap<String, BoxedErrorHandler>,
    resolvers: Vec<Box<dyn ResolverInstance>>,
}

impl Default for TrellisRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl TrellisRuntime {
    /// Creates a runtime with automatic configuration loading.
    ///
    /// Searches the current directory for a configuration file and
    /// initializes logging from it. Falls back to defaults if loading fails.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .with_current_dir()
            .load()
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                TrellisConfig::default()
            });

        Self::from_config(&config)
    }

    /// Creates a runtime from configuration, initializing logging from it.
    pub fn from_config(config: &TrellisConfig) -> Self {
        logging::init_from_config(&config.logging);

        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            "Runtime initialized from configuration"
        );

        Self {
            config: config.clone(),
            middlewares: HashMap::new(),
            error_handlers: HashMap::new(),
            resolvers: Vec::new(),
        }
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &TrellisConfig {
        &self.config
    }

    /// Registers a middleware under `name`.
    pub fn register_middleware<M: Middleware>(&mut self, name: impl Into<String>, middleware: M) -> &mut Self {
        let name = name.into();
        if self
            .middlewares
            .insert(name.clone(), boxed_middleware(middleware))
            .is_some()
        {
            warn!(name = %name, "Replacing previously registered middleware");
        }
        self
    }

    /// Registers an error handler under `name`.
    pub fn register_error_handler<H: ErrorHandler>(&mut self, name: impl Into<String>, handler: H) -> &mut Self {
        let name = name.into();
        if self
            .error_handlers
            .insert(name.clone(), boxed_error_handler(handler))
            .is_some()
        {
            warn!(name = %name, "Replacing previously registered error handler");
        }
        self
    }

    /// Adds a resolver instance, usually a `ResolverHandle`.
    pub fn add_resolver<R: ResolverInstance + 'static>(&mut self, resolver: R) -> &mut Self {
        debug!(class = resolver.class_name(), "Adding resolver");
        self.resolvers.push(Box::new(resolver));
        self
    }

    /// Number of resolver instances added so far.
    pub fn resolver_count(&self) -> usize {
        self.resolvers.len()
    }

    /// Validates the configuration, resolves the configured global middlewares
    /// and error handler, and builds an in-process [`DefinitionsHandler`].
    pub fn build(&self) -> RuntimeResult<DefinitionsHandler> {
        validate_config(&self.config)?;
        let (middlewares, error_handler) = self.resolve_globals()?;

        let mut builder = DefinitionsBuilder::new().middlewares(middlewares);
        for resolver in &self.resolvers {
            builder = builder.resolver(&**resolver);
        }
        if let Some(handler) = error_handler {
            builder = builder.boxed_error_handler(handler);
        }
        let handler = builder.build()?;

        info!(
            resolvers = self.resolvers.len(),
            functions = handler.keys().count(),
            "Resolver definitions ready"
        );
        Ok(handler)
    }

    fn resolve_globals(&self) -> Result<(Vec<BoxedMiddleware>, Option<BoxedErrorHandler>), ConfigError> {
        let definitions = &self.config.definitions;

        let middlewares = definitions
            .middlewares
            .iter()
            .map(|name| {
                self.middlewares
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownMiddleware(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let error_handler = definitions
            .error_handler
            .as_ref()
            .map(|name| {
                self.error_handlers
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownErrorHandler(name.clone()))
            })
            .transpose()?;

        Ok((middlewares, error_handler))
    }
}
