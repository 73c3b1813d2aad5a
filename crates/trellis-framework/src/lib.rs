//! # Trellis Framework
//!
//! Dispatch and registration for Trellis resolvers.
//!
//! This layer provides:
//! - [`MethodService`], a tower service binding a resolver method to its instance
//! - [`DispatchLayer`] / [`DispatchService`], the wrapper running middlewares,
//!   the method and error recovery around each resolver function
//! - [`ResolverHandle`], a resolver instance plus its stored configuration
//! - [`DefinitionsBuilder`], which applies global middlewares and error
//!   handlers and defines every resolver function with a [`Platform`]
//! - [`LocalResolver`] / [`DefinitionsHandler`], an in-process platform

pub mod builder;
pub mod definitions;
pub mod dispatcher;
pub mod handler;
pub mod instance;

pub use builder::{DefinitionsBuilder, GetDefinitionsParams, get_definitions_for_class};
pub use definitions::{BoxedResolverService, DefinitionsHandler, LocalResolver, Platform};
pub use dispatcher::{DispatchLayer, DispatchService, Dispatcher};
pub use handler::{BoxedMethodService, MethodService};
pub use instance::{ResolverHandle, ResolverInstance};
