//! Middleware and error-handler traits.
//!
//! Both traits are implemented automatically for async closures and
//! functions, in the same spirit as Axum's handler traits:
//!
//! ```rust,ignore
//! // Runs before the resolver function; returning a value short-circuits.
//! async fn require_license(req: Request) -> Option<Value> {
//!     match req.context().get("license") {
//!         Some(_) => None,
//!         None => Some(json!({ "error": "unlicensed" })),
//!     }
//! }
//!
//! // Turns a failure into a response.
//! async fn report(error: HandlerError, req: Request) -> Value {
//!     json!({ "failed": req.resolver().map(|r| r.key.clone()), "reason": error.to_string() })
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;

use crate::error::HandlerError;
use crate::request::Request;

// ============================================================================
// MiddlewareOutcome
// ============================================================================

/// Conversion from a middleware's return value into "continue or respond".
///
/// `Ok(None)` continues the chain; `Ok(Some(v))` short-circuits with `v`.
/// Falsy JSON values (`null`, `false`, `0` and `""`) count as "no response".
pub trait MiddlewareOutcome: Send + 'static {
    /// Normalizes the outcome.
    fn into_outcome(self) -> Result<Option<Value>, HandlerError>;
}

/// Whether a middleware result stops the chain.
///
/// Arrays and objects are truthy even when empty.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

impl MiddlewareOutcome for () {
    fn into_outcome(self) -> Result<Option<Value>, HandlerError> {
        Ok(None)
    }
}

impl MiddlewareOutcome for Value {
    fn into_outcome(self) -> Result<Option<Value>, HandlerError> {
        Ok(Some(self).filter(is_truthy))
    }
}

impl MiddlewareOutcome for Option<Value> {
    fn into_outcome(self) -> Result<Option<Value>, HandlerError> {
        Ok(self.filter(is_truthy))
    }
}

impl<T, E> MiddlewareOutcome for Result<T, E>
where
    T: MiddlewareOutcome,
    E: Into<HandlerError> + Send + 'static,
{
    fn into_outcome(self) -> Result<Option<Value>, HandlerError> {
        self.map_err(Into::into)?.into_outcome()
    }
}

// ============================================================================
// HandlerOutput
// ============================================================================

/// Conversion from a resolver method's (or error handler's) return value into
/// a JSON response.
pub trait HandlerOutput: Send + 'static {
    /// Produces the response value.
    fn into_output(self) -> Result<Value, HandlerError>;
}

impl HandlerOutput for () {
    fn into_output(self) -> Result<Value, HandlerError> {
        Ok(Value::Null)
    }
}

impl HandlerOutput for Value {
    fn into_output(self) -> Result<Value, HandlerError> {
        Ok(self)
    }
}

impl<T, E> HandlerOutput for Result<T, E>
where
    T: Serialize + Send + 'static,
    E: Into<HandlerError> + Send + 'static,
{
    fn into_output(self) -> Result<Value, HandlerError> {
        let value = self.map_err(Into::into)?;
        Ok(serde_json::to_value(value)?)
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// A function given the chance to short-circuit a request before the
/// resolver function body runs.
pub trait Middleware: Send + Sync + 'static {
    /// Runs the middleware.
    fn call(&self, req: Request) -> BoxFuture<'static, Result<Option<Value>, HandlerError>>;
}

impl<F, Fut> Middleware for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: MiddlewareOutcome,
{
    fn call(&self, req: Request) -> BoxFuture<'static, Result<Option<Value>, HandlerError>> {
        (self)(req).map(MiddlewareOutcome::into_outcome).boxed()
    }
}

/// A shared, type-erased middleware.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Boxes a middleware for storage in a chain.
pub fn boxed_middleware<M: Middleware>(middleware: M) -> BoxedMiddleware {
    Arc::new(middleware)
}

// ============================================================================
// ErrorHandler
// ============================================================================

/// A function that turns a resolver failure into a response.
///
/// The request it receives carries a [`ResolverContext`](crate::ResolverContext)
/// identifying the failing resolver function.
pub trait ErrorHandler: Send + Sync + 'static {
    /// Handles `error` raised while serving `req`.
    fn handle(&self, error: HandlerError, req: Request) -> BoxFuture<'static, Result<Value, HandlerError>>;
}

impl<F, Fut> ErrorHandler for F
where
    F: Fn(HandlerError, Request) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: HandlerOutput,
{
    fn handle(&self, error: HandlerError, req: Request) -> BoxFuture<'static, Result<Value, HandlerError>> {
        (self)(error, req).map(HandlerOutput::into_output).boxed()
    }
}

/// A shared, type-erased error handler.
pub type BoxedErrorHandler = Arc<dyn ErrorHandler>;

/// Boxes an error handler.
pub fn boxed_error_handler<H: ErrorHandler>(handler: H) -> BoxedErrorHandler {
    Arc::new(handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_truthy() {
        for falsy in [json!(null), json!(false), json!(0), json!(0.0), json!(-0.0), json!("")] {
            assert!(!is_truthy(&falsy), "{falsy} should be falsy");
        }
        for truthy in [json!(true), json!(1), json!(-2.5), json!("0"), json!([]), json!({})] {
            assert!(is_truthy(&truthy), "{truthy} should be truthy");
        }
    }

    #[test]
    fn test_falsy_outcomes_continue() {
        assert_eq!(json!(false).into_outcome().unwrap(), None);
        assert_eq!(Some(json!(0)).into_outcome().unwrap(), None);
        assert_eq!(Ok::<_, HandlerError>(json!("")).into_outcome().unwrap(), None);
        assert_eq!(json!([]).into_outcome().unwrap(), Some(json!([])));
    }

    #[tokio::test]
    async fn test_closure_middleware_outcomes() {
        let pass = |_req: Request| async {};
        let respond = |_req: Request| async { Some(json!({ "blocked": true })) };
        let null = |_req: Request| async { Value::Null };
        let fail = |_req: Request| async { Err::<(), _>(HandlerError::msg("no")) };

        assert_eq!(pass.call(Request::default()).await.unwrap(), None);
        assert_eq!(
            respond.call(Request::default()).await.unwrap(),
            Some(json!({ "blocked": true }))
        );
        assert_eq!(null.call(Request::default()).await.unwrap(), None);
        assert!(fail.call(Request::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_error_handler_output() {
        let handler = |error: HandlerError, _req: Request| async move {
            json!({ "reason": error.to_string() })
        };
        let out = handler
            .handle(HandlerError::msg("bad"), Request::default())
            .await
            .unwrap();
        assert_eq!(out, json!({ "reason": "bad" }));

        let silent = |_e: HandlerError, _req: Request| async {};
        let out = silent
            .handle(HandlerError::msg("bad"), Request::default())
            .await
            .unwrap();
        assert_eq!(out, Value::Null);
    }

    #[test]
    fn test_result_output_serializes() {
        #[derive(Serialize)]
        struct Issue {
            id: u32,
        }

        let out: Result<Issue, HandlerError> = Ok(Issue { id: 3 });
        assert_eq!(out.into_output().unwrap(), json!({ "id": 3 }));
    }
}
