//! The registry builder.
//!
//! [`DefinitionsBuilder`] collects resolver instances and the global
//! middlewares and error handler, writes those globals into every instance's
//! stored configuration and defines each resolver function with a
//! [`Platform`].
//!
//! Each build replaces the globals of the instances it touches wholesale: an
//! instance passed to two builds dispatches with the globals of the later one.
//!
//! ```rust,ignore
//! let issues = ResolverHandle::new(Issues::new(store));
//! let handler = DefinitionsBuilder::new()
//!     .resolver(&issues)
//!     .middleware(require_license)
//!     .error_handler(report)
//!     .build()?;
//! ```

use tower::util::BoxCloneSyncService;
use tracing::debug;

use trellis_core::{
    BoxedErrorHandler, BoxedMiddleware, DefinitionError, DefinitionResult, ErrorHandler,
    GlobalOverrides, Middleware, boxed_error_handler, boxed_middleware,
};

use crate::definitions::{DefinitionsHandler, LocalResolver, Platform};
use crate::instance::ResolverInstance;

/// Builds resolver definitions from resolver instances.
#[derive(Default)]
pub struct DefinitionsBuilder<'a> {
    resolvers: Vec<&'a dyn ResolverInstance>,
    globals: GlobalOverrides,
}

impl<'a> DefinitionsBuilder<'a> {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a resolver instance.
    pub fn resolver(mut self, resolver: &'a dyn ResolverInstance) -> Self {
        self.resolvers.push(resolver);
        self
    }

    /// Adds several resolver instances, keeping their order.
    pub fn resolvers(mut self, resolvers: impl IntoIterator<Item = &'a dyn ResolverInstance>) -> Self {
        self.resolvers.extend(resolvers);
        self
    }

    /// Appends a global middleware.
    pub fn middleware<M: Middleware>(mut self, middleware: M) -> Self {
        self.globals.middlewares.push(boxed_middleware(middleware));
        self
    }

    /// Appends already boxed global middlewares, keeping their order.
    pub fn middlewares(mut self, middlewares: impl IntoIterator<Item = BoxedMiddleware>) -> Self {
        self.globals.middlewares.extend(middlewares);
        self
    }

    /// Sets the global error handler.
    pub fn error_handler<H: ErrorHandler>(mut self, handler: H) -> Self {
        self.globals.error_handler = Some(boxed_error_handler(handler));
        self
    }

    /// Sets an already boxed global error handler.
    pub fn boxed_error_handler(mut self, handler: BoxedErrorHandler) -> Self {
        self.globals.error_handler = Some(handler);
        self
    }

    /// Builds an in-process [`DefinitionsHandler`].
    pub fn build(self) -> DefinitionResult<DefinitionsHandler> {
        self.build_with(LocalResolver::new())
    }

    /// Defines every resolver function with `platform` and returns its definitions.
    ///
    /// Fails on the first resolver function with an empty key, or when the
    /// platform rejects a definition. The globals are only written into the
    /// instances once every function is defined, so a failed build leaves
    /// them as they were.
    pub fn build_with<P: Platform>(self, mut platform: P) -> DefinitionResult<P::Definitions> {
        let dispatchers = self
            .resolvers
            .iter()
            .map(|resolver| (resolver, resolver.dispatchers()))
            .collect::<Vec<_>>();

        for (resolver, fns) in &dispatchers {
            if let Some(blank) = fns.iter().find(|d| d.entry().key.is_empty()) {
                return Err(DefinitionError::EmptyKey {
                    class_name: resolver.class_name().to_owned(),
                    method_name: blank.entry().method_name.to_owned(),
                });
            }
        }

        let mut defined = 0usize;
        for (resolver, fns) in dispatchers {
            for dispatcher in fns {
                let key = dispatcher.entry().key.clone();
                debug!(
                    key = %key,
                    class = resolver.class_name(),
                    method = dispatcher.entry().method_name,
                    "defining resolver function"
                );
                platform.define(&key, BoxCloneSyncService::new(dispatcher))?;
                defined += 1;
            }
        }

        for resolver in &self.resolvers {
            resolver.set_globals(&self.globals);
        }

        debug!(
            resolvers = self.resolvers.len(),
            functions = defined,
            "resolver definitions built"
        );
        Ok(platform.get_definitions())
    }
}

/// Arguments of [`get_definitions_for_class`].
#[derive(Default)]
pub struct GetDefinitionsParams<'a> {
    /// Resolver instances to define.
    pub resolvers: Vec<&'a dyn ResolverInstance>,
    /// Global middlewares.
    pub middlewares: Vec<BoxedMiddleware>,
    /// Global error handler.
    pub error_handler: Option<BoxedErrorHandler>,
}

/// Builds an in-process [`DefinitionsHandler`] in one call.
pub fn get_definitions_for_class(params: GetDefinitionsParams<'_>) -> DefinitionResult<DefinitionsHandler> {
    let GetDefinitionsParams {
        resolvers,
        middlewares,
        error_handler,
    } = params;

    let mut builder = DefinitionsBuilder::new()
        .resolvers(resolvers)
        .middlewares(middlewares);
    if let Some(handler) = error_handler {
        builder = builder.boxed_error_handler(handler);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use serde_json::{Value, json};
    use trellis_core::{
        HandlerError, InvokePayload, Request, Resolver, ResolverConfig, ResolverFn, ResolverFnConfig,
    };

    use crate::instance::ResolverHandle;

    struct Issues;

    impl Resolver for Issues {
        fn resolver_fns() -> Vec<ResolverFn<Self>> {
            vec![
                ResolverFn::new("get-issues", "get_issues", |_this: Arc<Self>, _req| async {
                    json!(["ISS-1"])
                }),
                ResolverFn::new("fail", "fail", |_this: Arc<Self>, _req| async {
                    Err::<Value, _>(HandlerError::msg("boom"))
                }),
            ]
        }
    }

    struct Licensed;

    impl Resolver for Licensed {
        fn config() -> ResolverConfig {
            ResolverConfig::new().error_handler(|_err: HandlerError, _req: Request| async {
                json!("class handled")
            })
        }

        fn resolver_fns() -> Vec<ResolverFn<Self>> {
            vec![ResolverFn::new("licensed-fail", "fail", |_this: Arc<Self>, _req| async {
                Err::<Value, _>(HandlerError::msg("boom"))
            })]
        }
    }

    struct Blank;

    impl Resolver for Blank {
        fn resolver_fns() -> Vec<ResolverFn<Self>> {
            vec![ResolverFn::new(ResolverFnConfig::new(""), "blank", |_this: Arc<Self>, _req| async {})]
        }
    }

    async fn value_of(handler: &DefinitionsHandler, key: &str) -> Value {
        let reply = handler.invoke(InvokePayload::new(key, json!({}))).await.unwrap();
        reply.into_result().unwrap()
    }

    #[tokio::test]
    async fn test_build_defines_every_function() {
        let issues = ResolverHandle::new(Issues);
        let licensed = ResolverHandle::new(Licensed);

        let handler = DefinitionsBuilder::new()
            .resolver(&issues)
            .resolver(&licensed)
            .build()
            .unwrap();

        assert_eq!(
            handler.keys().collect::<Vec<_>>(),
            ["get-issues", "fail", "licensed-fail"]
        );
        assert_eq!(value_of(&handler, "get-issues").await, json!(["ISS-1"]));
        assert_eq!(value_of(&handler, "licensed-fail").await, json!("class handled"));
    }

    #[tokio::test]
    async fn test_global_middleware_applies_to_all_resolvers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counting = {
            let calls = Arc::clone(&calls);
            move |_req: Request| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {}
            }
        };

        let issues = ResolverHandle::new(Issues);
        let licensed = ResolverHandle::new(Licensed);
        let handler = DefinitionsBuilder::new()
            .resolvers([&issues as &dyn ResolverInstance, &licensed])
            .middleware(counting)
            .build()
            .unwrap();

        value_of(&handler, "get-issues").await;
        value_of(&handler, "licensed-fail").await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_class_handler_beats_global_handler() {
        let issues = ResolverHandle::new(Issues);
        let licensed = ResolverHandle::new(Licensed);

        let handler = DefinitionsBuilder::new()
            .resolver(&issues)
            .resolver(&licensed)
            .error_handler(|_err: HandlerError, _req: Request| async { json!("global handled") })
            .build()
            .unwrap();

        assert_eq!(value_of(&handler, "fail").await, json!("global handled"));
        assert_eq!(value_of(&handler, "licensed-fail").await, json!("class handled"));
    }

    #[tokio::test]
    async fn test_later_build_replaces_globals() {
        let issues = ResolverHandle::new(Issues);

        let first = DefinitionsBuilder::new()
            .resolver(&issues)
            .middleware(|_req: Request| async { json!("first") })
            .error_handler(|_err: HandlerError, _req: Request| async { json!("first handler") })
            .build()
            .unwrap();
        assert_eq!(issues.config().global_middlewares.len(), 1);

        let second = DefinitionsBuilder::new().resolver(&issues).build().unwrap();

        let config = issues.config();
        assert!(config.global_middlewares.is_empty());
        assert!(config.global_error_handler.is_none());

        // Both handlers dispatch through the same instance config.
        assert_eq!(value_of(&second, "get-issues").await, json!(["ISS-1"]));
        assert_eq!(value_of(&first, "get-issues").await, json!(["ISS-1"]));
        let reply = second.invoke(InvokePayload::new("fail", json!({}))).await.unwrap();
        assert!(reply.is_error());
    }

    #[tokio::test]
    async fn test_builds_do_not_touch_other_instances() {
        let a = ResolverHandle::new(Issues);
        let b = ResolverHandle::new(Licensed);

        DefinitionsBuilder::new()
            .resolver(&a)
            .middleware(|_req: Request| async { json!("blocked") })
            .build()
            .unwrap();
        let handler = DefinitionsBuilder::new().resolver(&b).build().unwrap();

        assert_eq!(a.config().global_middlewares.len(), 1);
        assert!(b.config().global_middlewares.is_empty());
        assert_eq!(value_of(&handler, "licensed-fail").await, json!("class handled"));
    }

    #[test]
    fn test_empty_key_rejected() {
        let blank = ResolverHandle::new(Blank);
        let err = DefinitionsBuilder::new().resolver(&blank).build().unwrap_err();
        assert_eq!(
            err,
            DefinitionError::EmptyKey {
                class_name: "Blank".into(),
                method_name: "blank".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_failed_build_leaves_globals_untouched() {
        let issues = ResolverHandle::new(Issues);
        let blank = ResolverHandle::new(Blank);

        let err = DefinitionsBuilder::new()
            .resolver(&issues)
            .resolver(&blank)
            .middleware(|_req: Request| async { json!("hijacked") })
            .build()
            .unwrap_err();
        assert!(matches!(err, DefinitionError::EmptyKey { .. }));

        assert!(issues.config().global_middlewares.is_empty());
        let reply = issues.invoke("get_issues", Request::default()).await.unwrap();
        assert_eq!(reply.value(), Some(&json!(["ISS-1"])));
    }

    #[test]
    fn test_duplicate_key_keeps_previous_globals() {
        let a = ResolverHandle::new(Issues);
        let b = ResolverHandle::new(Issues);

        DefinitionsBuilder::new()
            .resolver(&a)
            .error_handler(|_err: HandlerError, _req: Request| async { json!("kept") })
            .build()
            .unwrap();

        let err = DefinitionsBuilder::new()
            .resolver(&a)
            .resolver(&b)
            .middleware(|_req: Request| async { json!("hijacked") })
            .build()
            .unwrap_err();
        assert_eq!(err, DefinitionError::DuplicateKey("get-issues".into()));

        let config = a.config();
        assert!(config.global_middlewares.is_empty());
        assert!(config.global_error_handler.is_some());
        assert!(b.config().global_middlewares.is_empty());
    }

    #[tokio::test]
    async fn test_same_type_instances_keep_their_own_globals() {
        fn counting(calls: &Arc<AtomicUsize>) -> impl Fn(Request) -> std::future::Ready<()> + Send + Sync + 'static {
            let calls = Arc::clone(calls);
            move |_req: Request| {
                calls.fetch_add(1, Ordering::SeqCst);
                std::future::ready(())
            }
        }

        let first_calls = Arc::new(AtomicUsize::new(0));
        let second_calls = Arc::new(AtomicUsize::new(0));
        let first = ResolverHandle::new(Issues);
        let second = ResolverHandle::new(Issues);

        let first_handler = DefinitionsBuilder::new()
            .resolver(&first)
            .middleware(counting(&first_calls))
            .error_handler(|_err: HandlerError, _req: Request| async { json!("first") })
            .build()
            .unwrap();
        let second_handler = DefinitionsBuilder::new()
            .resolver(&second)
            .middleware(counting(&second_calls))
            .error_handler(|_err: HandlerError, _req: Request| async { json!("second") })
            .build()
            .unwrap();

        assert_eq!(value_of(&first_handler, "fail").await, json!("first"));
        assert_eq!(value_of(&second_handler, "fail").await, json!("second"));
        assert_eq!(value_of(&first_handler, "get-issues").await, json!(["ISS-1"]));

        assert_eq!(first_calls.load(Ordering::SeqCst), 2);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.config().global_middlewares.len(), 1);
        assert_eq!(second.config().global_middlewares.len(), 1);
    }

    #[test]
    fn test_duplicate_key_across_resolvers_rejected() {
        let a = ResolverHandle::new(Issues);
        let b = ResolverHandle::new(Issues);
        let err = DefinitionsBuilder::new()
            .resolver(&a)
            .resolver(&b)
            .build()
            .unwrap_err();
        assert_eq!(err, DefinitionError::DuplicateKey("get-issues".into()));
    }

    #[tokio::test]
    async fn test_get_definitions_for_class() {
        let issues = ResolverHandle::new(Issues);
        let handler = get_definitions_for_class(GetDefinitionsParams {
            resolvers: vec![&issues as &dyn ResolverInstance],
            middlewares: Vec::new(),
            error_handler: Some(boxed_error_handler(|err: HandlerError, _req: Request| async move {
                json!({ "message": err.to_string() })
            })),
        })
        .unwrap();

        assert_eq!(value_of(&handler, "fail").await, json!({ "message": "boom" }));
    }
}
