//! # Trellis
//!
//! Decorator-style middlewares and error handlers for serverless resolver
//! functions.
//!
//! ## Overview
//!
//! A resolver is a plain type whose methods are exposed to a platform as
//! resolver functions under string keys. Trellis wraps each of them so that,
//! before the method body runs, a chain of middlewares gets the chance to
//! short-circuit the request, and so that any failure is turned into a
//! response by the most specific error handler available.
//!
//! ```text
//!            ┌─────────────────────── dispatch ───────────────────────┐
//! request ──▶│ method mws ─▶ resolver mws ─▶ global mws ─▶ method body │──▶ reply
//!            └──────────────┬──────────────────────────────┬──────────┘
//!                           │ error                        │ error
//!                           ▼                              ▼
//!              method handler > resolver handler > global handler
//! ```
//!
//! - **Middlewares** run in order; the first one returning a value ends the
//!   request with that value.
//! - **Error handlers** receive the error and the request, enriched with the
//!   key, class and method of the failing function.
//! - **Global** middlewares and error handler are supplied when definitions
//!   are built and have the lowest precedence.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use trellis::prelude::*;
//!
//! async fn require_license(req: Request) -> Option<Value> {
//!     let licensed = req.context().get("license").is_some_and(|l| l == "ACTIVE");
//!     (!licensed).then(|| json!({ "error": "unlicensed" }))
//! }
//!
//! async fn report(err: HandlerError, req: Request) -> Value {
//!     json!({ "error": err.to_string(), "function": req.resolver().map(|r| r.key.clone()) })
//! }
//!
//! struct Issues;
//!
//! #[resolver(middlewares = [require_license], error_handler = report)]
//! impl Issues {
//!     #[resolver_fn("get-issues")]
//!     async fn get_issues(&self, req: Request) -> Result<Vec<String>, HandlerError> {
//!         Ok(vec![format!("ISS-{}", req.payload_as::<u32>()?)])
//!     }
//! }
//!
//! let issues = ResolverHandle::new(Issues);
//! let handler = DefinitionsBuilder::new().resolver(&issues).build()?;
//! let reply = handler.invoke(InvokePayload::new("get-issues", json!(1))).await?;
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use trellis_core as core;
pub use trellis_framework as framework;
pub use trellis_runtime as runtime;

pub use trellis_macros::{resolver, resolver_fn};

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use trellis::prelude::*;
/// ```
pub mod prelude {
    // Annotations
    pub use trellis_macros::{resolver, resolver_fn};

    // Requests, replies and errors
    pub use trellis_core::{
        HandlerError, InvokePayload, Reply, Request, RequestContext, ResolverContext, Value, json,
    };

    // Configuration types for hand-written resolvers
    pub use trellis_core::{Resolver, ResolverConfig, ResolverFn, ResolverFnConfig};

    // Middleware and error handler traits
    pub use trellis_core::{ErrorHandler, Middleware};

    // Handles and definitions
    pub use trellis_framework::{
        DefinitionsBuilder, DefinitionsHandler, GetDefinitionsParams, ResolverHandle,
        get_definitions_for_class,
    };

    // Runtime
    pub use trellis_runtime::TrellisRuntime;
}
