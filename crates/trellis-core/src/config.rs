//! Resolver configuration types.
//!
//! - [`ResolverConfig`] – resolver-wide defaults, the class-level annotation.
//! - [`ResolverFnConfig`] – per-method configuration, the method-level annotation.
//! - [`MethodEntry`] – a normalized method configuration bound to a method name.
//! - [`ClassConfig`] – the configuration an instance actually dispatches with:
//!   its class defaults plus the global overrides written by the registry
//!   builder.

use std::fmt;

use crate::middleware::{
    BoxedErrorHandler, BoxedMiddleware, ErrorHandler, Middleware, boxed_error_handler,
    boxed_middleware,
};

// =============================================================================
// ResolverConfig
// =============================================================================

/// Resolver-wide defaults shared by every resolver function of a type.
///
/// ```rust,ignore
/// ResolverConfig::new()
///     .middleware(require_license)
///     .error_handler(report);
/// ```
#[derive(Clone, Default)]
pub struct ResolverConfig {
    /// Middlewares run after each method's own middlewares.
    pub middlewares: Vec<BoxedMiddleware>,
    /// Error handler used when a method has none of its own.
    pub error_handler: Option<BoxedErrorHandler>,
}

impl ResolverConfig {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware.
    pub fn middleware<M: Middleware>(mut self, middleware: M) -> Self {
        self.middlewares.push(boxed_middleware(middleware));
        self
    }

    /// Appends already boxed middlewares, keeping their order.
    pub fn middlewares(mut self, middlewares: impl IntoIterator<Item = BoxedMiddleware>) -> Self {
        self.middlewares.extend(middlewares);
        self
    }

    /// Sets the error handler.
    pub fn error_handler<H: ErrorHandler>(mut self, handler: H) -> Self {
        self.error_handler = Some(boxed_error_handler(handler));
        self
    }

    /// Sets an already boxed error handler.
    pub fn boxed_error_handler(mut self, handler: BoxedErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }
}

impl fmt::Debug for ResolverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverConfig")
            .field("middlewares", &self.middlewares.len())
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}

// =============================================================================
// ResolverFnConfig
// =============================================================================

/// Configuration of a single resolver function.
///
/// A bare key converts into a configuration with no middlewares and no error
/// handler:
///
/// ```rust,ignore
/// let config: ResolverFnConfig = "get-issues".into();
/// ```
#[derive(Clone)]
pub struct ResolverFnConfig {
    /// Handler key the function is registered under.
    pub key: String,
    /// Middlewares run before any resolver-wide middleware.
    pub middlewares: Vec<BoxedMiddleware>,
    /// Error handler with the highest precedence.
    pub error_handler: Option<BoxedErrorHandler>,
}

impl ResolverFnConfig {
    /// Creates a configuration for `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            middlewares: Vec::new(),
            error_handler: None,
        }
    }

    /// Appends a middleware.
    pub fn middleware<M: Middleware>(mut self, middleware: M) -> Self {
        self.middlewares.push(boxed_middleware(middleware));
        self
    }

    /// Appends already boxed middlewares, keeping their order.
    pub fn middlewares(mut self, middlewares: impl IntoIterator<Item = BoxedMiddleware>) -> Self {
        self.middlewares.extend(middlewares);
        self
    }

    /// Sets the error handler.
    pub fn error_handler<H: ErrorHandler>(mut self, handler: H) -> Self {
        self.error_handler = Some(boxed_error_handler(handler));
        self
    }

    /// Sets an already boxed error handler.
    pub fn boxed_error_handler(mut self, handler: BoxedErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// A configuration is valid when its key is non-empty.
    pub fn is_valid(&self) -> bool {
        !self.key.is_empty()
    }
}

impl From<&str> for ResolverFnConfig {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ResolverFnConfig {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

impl fmt::Debug for ResolverFnConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverFnConfig")
            .field("key", &self.key)
            .field("middlewares", &self.middlewares.len())
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}

// =============================================================================
// MethodEntry
// =============================================================================

/// A resolver function's configuration, tied to the method it wraps.
#[derive(Clone)]
pub struct MethodEntry {
    /// Handler key.
    pub key: String,
    /// Method-level middlewares.
    pub middlewares: Vec<BoxedMiddleware>,
    /// Method-level error handler.
    pub error_handler: Option<BoxedErrorHandler>,
    /// Name of the wrapped method.
    pub method_name: &'static str,
}

impl MethodEntry {
    /// Normalizes `config` into an entry for `method_name`.
    pub fn new(config: impl Into<ResolverFnConfig>, method_name: &'static str) -> Self {
        let ResolverFnConfig {
            key,
            middlewares,
            error_handler,
        } = config.into();
        Self {
            key,
            middlewares,
            error_handler,
            method_name,
        }
    }
}

impl fmt::Debug for MethodEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodEntry")
            .field("key", &self.key)
            .field("method_name", &self.method_name)
            .field("middlewares", &self.middlewares.len())
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}

// =============================================================================
// GlobalOverrides
// =============================================================================

/// Process-wide middlewares and error handler supplied at build time.
///
/// They have the lowest precedence.
#[derive(Clone, Default)]
pub struct GlobalOverrides {
    /// Middlewares run after method and resolver middlewares.
    pub middlewares: Vec<BoxedMiddleware>,
    /// Error handler used when neither method nor resolver has one.
    pub error_handler: Option<BoxedErrorHandler>,
}

impl fmt::Debug for GlobalOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalOverrides")
            .field("middlewares", &self.middlewares.len())
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}

// =============================================================================
// ClassConfig
// =============================================================================

/// The stored configuration of a resolver instance.
#[derive(Clone, Default)]
pub struct ClassConfig {
    /// Resolver-level middlewares.
    pub middlewares: Vec<BoxedMiddleware>,
    /// Resolver-level error handler.
    pub error_handler: Option<BoxedErrorHandler>,
    /// Global middlewares, written only by the registry builder.
    pub global_middlewares: Vec<BoxedMiddleware>,
    /// Global error handler, written only by the registry builder.
    pub global_error_handler: Option<BoxedErrorHandler>,
}

impl ClassConfig {
    /// Replaces the global part wholesale, keeping the resolver's own settings.
    pub fn set_globals(&mut self, globals: &GlobalOverrides) {
        self.global_middlewares.clone_from(&globals.middlewares);
        self.global_error_handler.clone_from(&globals.error_handler);
    }

    /// Merges the middleware chain for `entry`: method, then resolver, then global.
    pub fn chain_for(&self, entry: &MethodEntry) -> Vec<BoxedMiddleware> {
        let mut chain = Vec::with_capacity(
            entry.middlewares.len() + self.middlewares.len() + self.global_middlewares.len(),
        );
        chain.extend(entry.middlewares.iter().cloned());
        chain.extend(self.middlewares.iter().cloned());
        chain.extend(self.global_middlewares.iter().cloned());
        chain
    }

    /// Selects the error handler for `entry`: method, then resolver, then global.
    pub fn error_handler_for(&self, entry: &MethodEntry) -> Option<BoxedErrorHandler> {
        entry
            .error_handler
            .as_ref()
            .or(self.error_handler.as_ref())
            .or(self.global_error_handler.as_ref())
            .cloned()
    }
}

impl From<ResolverConfig> for ClassConfig {
    fn from(config: ResolverConfig) -> Self {
        Self {
            middlewares: config.middlewares,
            error_handler: config.error_handler,
            global_middlewares: Vec::new(),
            global_error_handler: None,
        }
    }
}

impl fmt::Debug for ClassConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassConfig")
            .field("middlewares", &self.middlewares.len())
            .field("error_handler", &self.error_handler.is_some())
            .field("global_middlewares", &self.global_middlewares.len())
            .field("global_error_handler", &self.global_error_handler.is_some())
            .finish()
    }
}
