//! Platform registration.
//!
//! A [`Platform`] receives each resolver function under its key and finally
//! yields whatever the host runtime needs as its definitions. This crate ships
//! one implementation, [`LocalResolver`], whose definitions are an in-process
//! [`DefinitionsHandler`] routing [`InvokePayload`]s by function key.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use tower::util::BoxCloneSyncService;
use tower::{Service, ServiceExt};
use tracing::debug;

use trellis_core::{
    DefinitionError, DefinitionResult, InvokeError, InvokePayload, InvokeResult, Reply, Request,
};

/// A registered resolver function, as handed to a [`Platform`].
pub type BoxedResolverService = BoxCloneSyncService<Request, Reply, Infallible>;

/// The host-side registry resolver functions are defined on.
pub trait Platform {
    /// What [`get_definitions`](Platform::get_definitions) yields.
    type Definitions;

    /// Registers `service` under `key`.
    fn define(&mut self, key: &str, service: BoxedResolverService) -> DefinitionResult<()>;

    /// Finalizes the registry.
    fn get_definitions(self) -> Self::Definitions;
}

// =============================================================================
// LocalResolver
// =============================================================================

/// An in-process platform.
#[derive(Default)]
pub struct LocalResolver {
    functions: HashMap<String, BoxedResolverService>,
    keys: Vec<String>,
}

impl LocalResolver {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of defined functions.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if nothing has been defined yet.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Platform for LocalResolver {
    type Definitions = DefinitionsHandler;

    fn define(&mut self, key: &str, service: BoxedResolverService) -> DefinitionResult<()> {
        if self.functions.contains_key(key) {
            return Err(DefinitionError::DuplicateKey(key.to_owned()));
        }
        self.functions.insert(key.to_owned(), service);
        self.keys.push(key.to_owned());
        Ok(())
    }

    fn get_definitions(self) -> DefinitionsHandler {
        DefinitionsHandler {
            functions: Arc::new(self.functions),
            keys: self.keys.into(),
        }
    }
}

// =============================================================================
// DefinitionsHandler
// =============================================================================

/// Routes invocations to the resolver functions of a [`LocalResolver`].
///
/// Cheap to clone; clones share the same functions.
#[derive(Clone)]
pub struct DefinitionsHandler {
    functions: Arc<HashMap<String, BoxedResolverService>>,
    keys: Arc<[String]>,
}

impl DefinitionsHandler {
    /// Defined keys, in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Returns `true` if `key` is defined.
    pub fn contains(&self, key: &str) -> bool {
        self.functions.contains_key(key)
    }

    /// Invokes the function named by the envelope.
    pub async fn invoke(&self, payload: InvokePayload) -> InvokeResult<Reply> {
        let (key, req) = payload.into_request();
        self.call(&key, req).await
    }

    /// Invokes the function defined under `key`.
    pub async fn call(&self, key: &str, req: Request) -> InvokeResult<Reply> {
        let service = self
            .functions
            .get(key)
            .cloned()
            .ok_or_else(|| InvokeError::UnknownFunction(key.to_owned()))?;

        debug!(key, "invoking resolver function");
        let Ok(reply) = service.oneshot(req).await;
        Ok(reply)
    }

    /// Decodes a raw invocation envelope, invokes it and serializes the reply.
    pub async fn call_json(&self, envelope: Value) -> InvokeResult<Value> {
        let payload: InvokePayload = serde_json::from_value(envelope)?;
        let reply = self.invoke(payload).await?;
        Ok(serde_json::to_value(&reply)?)
    }
}

impl std::fmt::Debug for DefinitionsHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefinitionsHandler")
            .field("keys", &self.keys)
            .finish()
    }
}

impl Service<InvokePayload> for DefinitionsHandler {
    type Response = Reply;
    type Error = InvokeError;
    type Future = BoxFuture<'static, InvokeResult<Reply>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, payload: InvokePayload) -> Self::Future {
        let this = self.clone();
        async move { this.invoke(payload).await }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trellis_core::HandlerError;

    fn echo() -> BoxedResolverService {
        BoxCloneSyncService::new(tower::service_fn(|req: Request| async move {
            Ok::<_, Infallible>(Reply::Value(json!({
                "payload": req.payload().clone(),
                "jobId": req.context().get("jobId").cloned(),
            })))
        }))
    }

    fn failing() -> BoxedResolverService {
        BoxCloneSyncService::new(tower::service_fn(|_req: Request| async {
            Ok::<_, Infallible>(Reply::Error(HandlerError::msg("boom")))
        }))
    }

    fn handler() -> DefinitionsHandler {
        let mut platform = LocalResolver::new();
        platform.define("echo", echo()).unwrap();
        platform.define("fail", failing()).unwrap();
        platform.get_definitions()
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut platform = LocalResolver::new();
        platform.define("echo", echo()).unwrap();
        let err = platform.define("echo", echo()).unwrap_err();
        assert_eq!(err, DefinitionError::DuplicateKey("echo".into()));
        assert_eq!(platform.len(), 1);
    }

    #[test]
    fn test_keys_in_registration_order() {
        let handler = handler();
        assert_eq!(handler.keys().collect::<Vec<_>>(), ["echo", "fail"]);
        assert!(handler.contains("fail"));
        assert!(!handler.contains("missing"));
    }

    #[tokio::test]
    async fn test_unknown_function() {
        let err = handler()
            .invoke(InvokePayload::new("missing", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::UnknownFunction(ref key) if key == "missing"));
    }

    #[tokio::test]
    async fn test_call_json_routes_envelope() {
        let out = handler()
            .call_json(json!({
                "call": { "functionKey": "echo", "payload": { "n": 1 }, "jobId": "job-9" },
                "context": { "accountId": "a-1" }
            }))
            .await
            .unwrap();
        assert_eq!(out, json!({ "payload": { "n": 1 }, "jobId": "job-9" }));
    }

    #[tokio::test]
    async fn test_call_json_missing_payload_defaults_to_object() {
        let out = handler()
            .call_json(json!({ "call": { "functionKey": "echo" }, "context": {} }))
            .await
            .unwrap();
        assert_eq!(out["payload"], json!({}));
    }

    #[tokio::test]
    async fn test_call_json_serializes_errors() {
        let out = handler()
            .call_json(json!({ "call": { "functionKey": "fail" }, "context": {} }))
            .await
            .unwrap();
        assert_eq!(out, json!({ "error": { "message": "boom" } }));
    }

    #[tokio::test]
    async fn test_call_json_invalid_envelope() {
        let err = handler().call_json(json!({ "nope": true })).await.unwrap_err();
        assert!(matches!(err, InvokeError::InvalidPayload(_)));
    }

    #[tokio::test]
    async fn test_service_impl() {
        let reply = handler()
            .oneshot(InvokePayload::new("echo", json!([1, 2])))
            .await
            .unwrap();
        assert_eq!(reply.value().unwrap()["payload"], json!([1, 2]));
    }
}
