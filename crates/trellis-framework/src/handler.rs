//! Method services.
//!
//! [`MethodService<T>`] is the innermost building block of a dispatch stack:
//! it binds one resolver method to one resolver instance and implements
//! `tower::Service<Request>`. Middleware handling and error recovery are
//! stacked on top of it by [`DispatchLayer`](crate::dispatcher::DispatchLayer).

use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use tower::Service;
use tower::util::BoxCloneSyncService;

use trellis_core::{HandlerError, MethodFn, Request};

/// A type-erased method service, as wrapped by [`Dispatcher`](crate::Dispatcher).
pub type BoxedMethodService = BoxCloneSyncService<Request, Value, HandlerError>;

/// A tower [`Service`] calling one method on one resolver instance.
pub struct MethodService<T> {
    instance: Arc<T>,
    method: MethodFn<T>,
}

impl<T> MethodService<T> {
    /// Binds `method` to `instance`.
    pub fn new(instance: Arc<T>, method: MethodFn<T>) -> Self {
        Self { instance, method }
    }
}

impl<T> Clone for MethodService<T> {
    fn clone(&self) -> Self {
        Self {
            instance: Arc::clone(&self.instance),
            method: Arc::clone(&self.method),
        }
    }
}

impl<T> Service<Request> for MethodService<T>
where
    T: Send + Sync + 'static,
{
    type Response = Value;
    type Error = HandlerError;
    type Future = BoxFuture<'static, Result<Value, HandlerError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let instance = Arc::clone(&self.instance);
        let method = Arc::clone(&self.method);
        // The user method is entered on first poll, never inside `call`.
        async move { method(instance, req).await }.boxed()
    }
}
