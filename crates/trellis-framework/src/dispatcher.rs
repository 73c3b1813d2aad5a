//! The dispatch wrapper.
//!
//! [`DispatchLayer`] wraps a method service into a [`DispatchService`], which
//! implements the whole lifecycle of one resolver function invocation:
//!
//! 1. Snapshot the resolver's stored [`ClassConfig`] and merge the middleware
//!    chain (method, then resolver, then global).
//! 2. Run each middleware in order. The first one returning a value
//!    short-circuits the request and that value becomes the response.
//! 3. Otherwise run the method itself.
//! 4. On failure, hand the error to the most specific error handler with a
//!    request carrying the [`ResolverContext`]. If that handler fails as well,
//!    or no handler exists, the failure is logged and the original error is
//!    returned as a [`Reply::Error`].
//!
//! The service's error type is [`Infallible`]: failures never escape a
//! dispatch, they are always returned as values. Panics in middlewares,
//! methods and error handlers are caught and treated as errors.

use std::convert::Infallible;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde_json::Value;
use tower::{Layer, Service, ServiceExt};
use tracing::{Instrument, debug, debug_span, error};

use trellis_core::{
    BoxedErrorHandler, BoxedMiddleware, ClassConfig, HandlerError, MethodEntry, Reply, Request,
    ResolverContext,
};

use crate::handler::BoxedMethodService;

/// A dispatch wrapper around a type-erased method service.
pub type Dispatcher = DispatchService<BoxedMethodService>;

// =============================================================================
// DispatchLayer
// =============================================================================

/// A tower [`Layer`] producing [`DispatchService`]s for one resolver function.
#[derive(Clone)]
pub struct DispatchLayer {
    entry: Arc<MethodEntry>,
    class_name: &'static str,
    config: Arc<RwLock<ClassConfig>>,
}

impl DispatchLayer {
    /// Creates a layer for `entry`, reading resolver-wide settings from
    /// `config` at every call.
    pub fn new(entry: MethodEntry, class_name: &'static str, config: Arc<RwLock<ClassConfig>>) -> Self {
        Self {
            entry: Arc::new(entry),
            class_name,
            config,
        }
    }
}

impl<S> Layer<S> for DispatchLayer {
    type Service = DispatchService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DispatchService {
            inner,
            entry: Arc::clone(&self.entry),
            class_name: self.class_name,
            config: Arc::clone(&self.config),
        }
    }
}

// =============================================================================
// DispatchService
// =============================================================================

/// A resolver function ready to be registered with a platform.
pub struct DispatchService<S> {
    inner: S,
    entry: Arc<MethodEntry>,
    class_name: &'static str,
    config: Arc<RwLock<ClassConfig>>,
}

impl<S: Clone> Clone for DispatchService<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            entry: Arc::clone(&self.entry),
            class_name: self.class_name,
            config: Arc::clone(&self.config),
        }
    }
}

impl<S> DispatchService<S> {
    /// Returns the configuration this function was declared with.
    pub fn entry(&self) -> &MethodEntry {
        &self.entry
    }

    /// Returns the handler key.
    pub fn key(&self) -> &str {
        &self.entry.key
    }

    /// Returns the name of the resolver type.
    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    /// Snapshots what this call will run with. The lock is released on return.
    fn plan(&self) -> Plan {
        let config = self.config.read();
        Plan {
            chain: config.chain_for(&self.entry),
            error_handler: config.error_handler_for(&self.entry),
            resolver: ResolverContext {
                key: self.entry.key.clone(),
                class_name: self.class_name.to_owned(),
                method_name: self.entry.method_name.to_owned(),
            },
        }
    }
}

impl<S> DispatchService<S>
where
    S: Service<Request, Response = Value, Error = HandlerError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    /// Runs one invocation to completion.
    pub async fn dispatch(&self, req: Request) -> Reply {
        self.plan().run(self.inner.clone(), req).await
    }
}

impl<S> Service<Request> for DispatchService<S>
where
    S: Service<Request, Response = Value, Error = HandlerError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Reply;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Reply, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Readiness of the inner service is awaited per call so that its
        // errors flow through the error handlers like any other failure.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let plan = self.plan();
        let inner = self.inner.clone();
        async move { Ok(plan.run(inner, req).await) }.boxed()
    }
}

// =============================================================================
// Plan
// =============================================================================

struct Plan {
    chain: Vec<BoxedMiddleware>,
    error_handler: Option<BoxedErrorHandler>,
    resolver: ResolverContext,
}

impl Plan {
    async fn run<S>(self, mut inner: S, req: Request) -> Reply
    where
        S: Service<Request, Response = Value, Error = HandlerError> + Send,
        S::Future: Send,
    {
        let span = debug_span!(
            "resolver_fn",
            key = %self.resolver.key,
            class = %self.resolver.class_name,
            method = %self.resolver.method_name,
        );

        async move {
            match self.run_chain(&mut inner, &req).await {
                Ok(value) => Reply::Value(value),
                Err(err) => self.recover(err, &req).await,
            }
        }
        .instrument(span)
        .await
    }

    async fn run_chain<S>(&self, inner: &mut S, req: &Request) -> Result<Value, HandlerError>
    where
        S: Service<Request, Response = Value, Error = HandlerError> + Send,
        S::Future: Send,
    {
        for (index, middleware) in self.chain.iter().enumerate() {
            let outcome = catch_panic(async { middleware.call(req.clone()).await }).await?;
            if let Some(response) = outcome {
                debug!(index, "middleware short-circuited the request");
                return Ok(response);
            }
        }

        catch_panic(async { inner.ready().await?.call(req.clone()).await }).await
    }

    async fn recover(&self, err: HandlerError, req: &Request) -> Reply {
        let Some(handler) = &self.error_handler else {
            error!(
                key = %self.resolver.key,
                class = %self.resolver.class_name,
                method = %self.resolver.method_name,
                error = %err,
                "resolver function failed and no error handler is configured"
            );
            return Reply::Error(err);
        };

        let enriched = req.enriched(self.resolver.clone());
        let handled = catch_panic(async { handler.handle(err.clone(), enriched).await }).await;

        match handled {
            Ok(value) => Reply::Value(value),
            Err(handler_err) => {
                error!(
                    key = %self.resolver.key,
                    class = %self.resolver.class_name,
                    method = %self.resolver.method_name,
                    error = %handler_err,
                    original = %err,
                    "error handler failed, returning the original error"
                );
                Reply::Error(err)
            }
        }
    }
}

async fn catch_panic<F, T>(fut: F) -> Result<T, HandlerError>
where
    F: Future<Output = Result<T, HandlerError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(HandlerError::from_panic(payload)),
    }
}
