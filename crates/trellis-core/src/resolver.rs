//! The [`Resolver`] trait.
//!
//! A resolver is a user type grouping related resolver functions under shared
//! defaults. Implementations are usually generated by the `#[resolver]`
//! attribute, but writing one by hand is straightforward:
//!
//! ```rust,ignore
//! struct Issues {
//!     store: Store,
//! }
//!
//! impl Issues {
//!     async fn list(&self, req: Request) -> Result<Vec<Issue>, HandlerError> {
//!         self.store.list(req.payload_as()?).await
//!     }
//! }
//!
//! impl Resolver for Issues {
//!     fn config() -> ResolverConfig {
//!         ResolverConfig::new().middleware(require_license)
//!     }
//!
//!     fn resolver_fns() -> Vec<ResolverFn<Self>> {
//!         vec![ResolverFn::new("list-issues", "list", |this: Arc<Self>, req| async move {
//!             this.list(req).await
//!         })]
//!     }
//! }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::config::{MethodEntry, ResolverConfig, ResolverFnConfig};
use crate::error::HandlerError;
use crate::middleware::HandlerOutput;
use crate::request::Request;

/// A method bound to a resolver instance, type-erased over its output.
pub type MethodFn<T> =
    Arc<dyn Fn(Arc<T>, Request) -> BoxFuture<'static, Result<Value, HandlerError>> + Send + Sync>;

/// A user type whose methods are exposed as resolver functions.
pub trait Resolver: Send + Sync + Sized + 'static {
    /// Name of the resolver type, reported to error handlers.
    ///
    /// Defaults to the unqualified type name.
    fn class_name() -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Resolver-wide defaults. Defaults to no middlewares and no error handler.
    fn config() -> ResolverConfig {
        ResolverConfig::default()
    }

    /// The resolver functions of this type, in declaration order.
    fn resolver_fns() -> Vec<ResolverFn<Self>>;
}

/// One resolver function: its configuration plus the method it wraps.
pub struct ResolverFn<T> {
    entry: MethodEntry,
    method: MethodFn<T>,
}

impl<T: Send + Sync + 'static> ResolverFn<T> {
    /// Declares a resolver function.
    ///
    /// `config` may be a bare key or a full [`ResolverFnConfig`]; `method`
    /// receives the shared instance and the request.
    pub fn new<C, F, Fut>(config: C, method_name: &'static str, method: F) -> Self
    where
        C: Into<ResolverFnConfig>,
        F: Fn(Arc<T>, Request) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: HandlerOutput,
    {
        Self {
            entry: MethodEntry::new(config, method_name),
            method: Arc::new(
                move |this: Arc<T>, req: Request| -> BoxFuture<'static, Result<Value, HandlerError>> {
                    method(this, req).map(HandlerOutput::into_output).boxed()
                },
            ),
        }
    }

    /// Returns the normalized configuration.
    pub fn entry(&self) -> &MethodEntry {
        &self.entry
    }

    /// Returns the bound method.
    pub fn method(&self) -> &MethodFn<T> {
        &self.method
    }
}

impl<T> Clone for ResolverFn<T> {
    fn clone(&self) -> Self {
        Self {
            entry: self.entry.clone(),
            method: Arc::clone(&self.method),
        }
    }
}

impl<T> fmt::Debug for ResolverFn<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverFn")
            .field("entry", &self.entry)
            .finish_non_exhaustive()
    }
}

/// `my_crate::module::Issues<u8>` → `Issues`.
fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Pinger;

    impl Resolver for Pinger {
        fn resolver_fns() -> Vec<ResolverFn<Self>> {
            vec![ResolverFn::new("ping", "ping", |_this: Arc<Self>, _req| async {
                json!({ "ok": true })
            })]
        }
    }

    #[test]
    fn test_default_class_name_and_config() {
        assert_eq!(Pinger::class_name(), "Pinger");
        let config = Pinger::config();
        assert!(config.middlewares.is_empty());
        assert!(config.error_handler.is_none());
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("a::b::Issues"), "Issues");
        assert_eq!(short_type_name("a::Wrapper<b::Inner>"), "Wrapper");
        assert_eq!(short_type_name("Plain"), "Plain");
    }

    #[tokio::test]
    async fn test_bound_method_runs() {
        let fns = Pinger::resolver_fns();
        assert_eq!(fns[0].entry().key, "ping");

        let out = (fns[0].method())(Arc::new(Pinger), Request::default())
            .await
            .unwrap();
        assert_eq!(out, json!({ "ok": true }));
    }
}
