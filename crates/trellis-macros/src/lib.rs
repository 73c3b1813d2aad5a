//! Procedural macros for the Trellis resolver framework.
//!
//! This crate provides:
//!
//! - `#[resolver(...)]` - Implements `Resolver` for the type of an impl block
//! - `#[resolver_fn(...)]` - Marks a method of that impl block as a resolver function
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis::prelude::*;
//!
//! struct Issues {
//!     store: Store,
//! }
//!
//! #[resolver(middlewares = [require_license], error_handler = report)]
//! impl Issues {
//!     #[resolver_fn("get-issues")]
//!     async fn get_issues(&self, req: Request) -> Result<Vec<Issue>, HandlerError> {
//!         self.store.list(req.payload_as()?).await
//!     }
//!
//!     #[resolver_fn(key = "delete-issue", middlewares = [require_admin])]
//!     async fn delete_issue(&self, req: Request) -> Result<(), HandlerError> {
//!         self.store.delete(req.payload_as()?).await
//!     }
//!
//!     // Not a resolver function; left untouched.
//!     fn helper(&self) {}
//! }
//! ```
//!
//! Generated code refers to the `trellis` facade crate, which must be a
//! dependency of the crate using these macros.

mod resolver;

use proc_macro::TokenStream;
use syn::{ItemImpl, parse_macro_input};

/// Implements `Resolver` for the type of an inherent impl block.
///
/// Every method marked `#[resolver_fn]` becomes a resolver function, in
/// declaration order. The attribute's own options become the resolver-wide
/// defaults.
///
/// # Attributes
///
/// - `middlewares = [a, b]` - Resolver-wide middlewares
/// - `error_handler = h` - Resolver-wide error handler
/// - `name = "..."` - Override the class name reported to error handlers
#[proc_macro_attribute]
pub fn resolver(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut args = resolver::ResolverArgs::default();
    let parser = syn::meta::parser(|meta| args.parse_meta(meta));
    parse_macro_input!(attr with parser);
    let item = parse_macro_input!(item as ItemImpl);

    match resolver::expand(args, item) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Marks a method as a resolver function.
///
/// Only meaningful inside an impl block annotated with `#[resolver]`, which
/// consumes it. Used anywhere else it is a compile error.
#[proc_macro_attribute]
pub fn resolver_fn(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut out: TokenStream = syn::Error::new(
        proc_macro2::Span::call_site(),
        "#[resolver_fn] can only be used on methods inside a #[resolver] impl block",
    )
    .to_compile_error()
    .into();
    out.extend(item);
    out
}
