//! # Trellis Core
//!
//! Core types for the Trellis resolver framework.
//!
//! This crate holds everything a resolver author touches without pulling in
//! the dispatch machinery:
//!
//! - **Requests & replies**: [`Request`], [`RequestContext`], [`ResolverContext`],
//!   [`InvokePayload`], [`Reply`]
//! - **Errors**: [`HandlerError`], [`DefinitionError`], [`InvokeError`]
//! - **Middleware**: the [`Middleware`] and [`ErrorHandler`] traits, implemented
//!   for async closures
//! - **Configuration**: [`ResolverConfig`], [`ResolverFnConfig`], [`MethodEntry`],
//!   [`ClassConfig`], [`GlobalOverrides`]
//! - **Resolvers**: the [`Resolver`] trait and [`ResolverFn`]
//!
//! The dispatch wrapper, resolver handles and the registry builder live in
//! `trellis-framework`.

pub mod config;
pub mod error;
pub mod middleware;
pub mod request;
pub mod resolver;

pub use config::{ClassConfig, GlobalOverrides, MethodEntry, ResolverConfig, ResolverFnConfig};
pub use error::{DefinitionError, DefinitionResult, HandlerError, InvokeError, InvokeResult};
pub use middleware::{
    BoxedErrorHandler, BoxedMiddleware, ErrorHandler, HandlerOutput, Middleware,
    MiddlewareOutcome, boxed_error_handler, boxed_middleware,
};
pub use request::{InvokeCall, InvokePayload, Reply, Request, RequestContext, ResolverContext};
pub use resolver::{MethodFn, Resolver, ResolverFn};

/// Re-exported for generated code and downstream convenience.
pub use serde_json::{Value, json};
