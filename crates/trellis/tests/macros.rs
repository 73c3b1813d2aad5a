use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Deserialize;
use trellis::prelude::*;

// =============================================================================
// Fixtures
// =============================================================================

async fn require_license(req: Request) -> Option<Value> {
    let licensed = req.context().get("license") == Some(&json!("ACTIVE"));
    (!licensed).then(|| json!({ "error": "unlicensed" }))
}

async fn require_admin(req: Request) -> Option<Value> {
    let admin = req.context().get("role") == Some(&json!("admin"));
    (!admin).then(|| json!({ "error": "forbidden" }))
}

async fn class_report(err: HandlerError, req: Request) -> Value {
    let resolver = req.resolver().cloned();
    json!({
        "handledBy": "class",
        "error": err.to_string(),
        "key": resolver.as_ref().map(|r| r.key.clone()),
        "className": resolver.as_ref().map(|r| r.class_name.clone()),
        "methodName": resolver.map(|r| r.method_name),
    })
}

async fn method_report(err: HandlerError, _req: Request) -> Value {
    json!({ "handledBy": "method", "error": err.to_string() })
}

#[derive(Deserialize)]
struct IssueQuery {
    id: u32,
}

#[derive(Default)]
struct Issues {
    loads: AtomicUsize,
}

#[resolver(middlewares = [require_license], error_handler = class_report)]
impl Issues {
    #[resolver_fn("get-issue")]
    async fn get_issue(&self, req: Request) -> Result<Value, HandlerError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let query: IssueQuery = req.payload_as()?;
        Ok(json!({ "key": format!("ISS-{}", query.id) }))
    }

    #[resolver_fn(key = "delete-issue", middlewares = [require_admin], error_handler = method_report)]
    async fn delete_issue(&self, _req: Request) -> Result<Value, HandlerError> {
        Err(HandlerError::msg("read-only project"))
    }

    #[resolver_fn("count")]
    fn count(&self) -> Value {
        json!(self.loads.load(Ordering::SeqCst))
    }

    #[resolver_fn("echo")]
    fn echo(&self, req: Request) -> Value {
        req.payload().clone()
    }

    fn helper(&self) -> &'static str {
        "not a resolver function"
    }
}

struct Renamed;

#[resolver(name = "IssueResolver")]
impl Renamed {
    #[resolver_fn("renamed-fail")]
    async fn fail(&self, _req: Request) -> Result<(), HandlerError> {
        Err(HandlerError::msg("boom"))
    }
}

fn licensed(key: &str, payload: Value) -> InvokePayload {
    InvokePayload::new(key, payload).context_field("license", json!("ACTIVE"))
}

fn build(issues: &ResolverHandle<Issues>) -> DefinitionsHandler {
    DefinitionsBuilder::new().resolver(issues).build().unwrap()
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_generated_resolver_impl() {
    assert_eq!(Issues::class_name(), "Issues");
    assert_eq!(Renamed::class_name(), "IssueResolver");

    let config = Issues::config();
    assert_eq!(config.middlewares.len(), 1);
    assert!(config.error_handler.is_some());

    let fns = Issues::resolver_fns();
    let keys: Vec<_> = fns.iter().map(|f| f.entry().key.as_str()).collect();
    assert_eq!(keys, ["get-issue", "delete-issue", "count", "echo"]);

    let delete = fns[1].entry();
    assert_eq!(delete.method_name, "delete_issue");
    assert_eq!(delete.middlewares.len(), 1);
    assert!(delete.error_handler.is_some());

    assert_eq!(Issues::default().helper(), "not a resolver function");
}

#[tokio::test]
async fn test_licensed_request_reaches_method() {
    let issues = ResolverHandle::new(Issues::default());
    let handler = build(&issues);

    let reply = handler
        .invoke(licensed("get-issue", json!({ "id": 7 })))
        .await
        .unwrap();
    assert_eq!(reply.value(), Some(&json!({ "key": "ISS-7" })));
    assert_eq!(issues.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_class_middleware_short_circuits() {
    let issues = ResolverHandle::new(Issues::default());
    let handler = build(&issues);

    let reply = handler
        .invoke(InvokePayload::new("get-issue", json!({ "id": 7 })))
        .await
        .unwrap();
    assert_eq!(reply.value(), Some(&json!({ "error": "unlicensed" })));
    assert_eq!(issues.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_method_middleware_runs_before_class_middleware() {
    let issues = ResolverHandle::new(Issues::default());
    let handler = build(&issues);

    // Unlicensed and not an admin: the method-level check answers first.
    let reply = handler
        .invoke(InvokePayload::new("delete-issue", json!({})))
        .await
        .unwrap();
    assert_eq!(reply.value(), Some(&json!({ "error": "forbidden" })));
}

#[tokio::test]
async fn test_method_error_handler_wins() {
    let issues = ResolverHandle::new(Issues::default());
    let handler = build(&issues);

    let payload = licensed("delete-issue", json!({})).context_field("role", json!("admin"));
    let reply = handler.invoke(payload).await.unwrap();
    assert_eq!(
        reply.value(),
        Some(&json!({ "handledBy": "method", "error": "read-only project" }))
    );
}

#[tokio::test]
async fn test_class_error_handler_gets_resolver_context() {
    let issues = ResolverHandle::new(Issues::default());
    let handler = build(&issues);

    let reply = handler
        .invoke(licensed("get-issue", json!({ "id": "not a number" })))
        .await
        .unwrap();
    let value = reply.value().unwrap();
    assert_eq!(value["handledBy"], json!("class"));
    assert_eq!(value["key"], json!("get-issue"));
    assert_eq!(value["className"], json!("Issues"));
    assert_eq!(value["methodName"], json!("get_issue"));
}

#[tokio::test]
async fn test_sync_methods() {
    let issues = ResolverHandle::new(Issues::default());
    let handler = build(&issues);

    let echoed = handler
        .invoke(licensed("echo", json!([1, 2, 3])))
        .await
        .unwrap();
    assert_eq!(echoed.value(), Some(&json!([1, 2, 3])));

    let count = handler.invoke(licensed("count", json!({}))).await.unwrap();
    assert_eq!(count.value(), Some(&json!(0)));
}

#[tokio::test]
async fn test_renamed_class_without_handler_returns_error() {
    let renamed = ResolverHandle::new(Renamed);
    let handler = DefinitionsBuilder::new().resolver(&renamed).build().unwrap();

    let reply = handler
        .invoke(InvokePayload::new("renamed-fail", json!({})))
        .await
        .unwrap();
    assert_eq!(reply.error().map(ToString::to_string).as_deref(), Some("boom"));
}

#[tokio::test]
async fn test_global_handler_for_renamed_class() {
    let seen = Arc::new(std::sync::Mutex::new(None));
    let handler_seen = Arc::clone(&seen);

    let renamed = ResolverHandle::new(Renamed);
    let handler = DefinitionsBuilder::new()
        .resolver(&renamed)
        .error_handler(move |_err: HandlerError, req: Request| {
            if let Ok(mut slot) = handler_seen.lock() {
                *slot = req.resolver().map(|r| r.class_name.clone());
            }
            async { json!("global") }
        })
        .build()
        .unwrap();

    let reply = handler
        .invoke(InvokePayload::new("renamed-fail", json!({})))
        .await
        .unwrap();
    assert_eq!(reply.value(), Some(&json!("global")));
    assert_eq!(seen.lock().unwrap().as_deref(), Some("IssueResolver"));
}

#[tokio::test]
async fn test_builds_are_isolated() {
    let issues = ResolverHandle::new(Issues::default());
    let renamed = ResolverHandle::new(Renamed);

    let first = DefinitionsBuilder::new()
        .resolver(&renamed)
        .error_handler(|_err: HandlerError, _req: Request| async { json!("first") })
        .build()
        .unwrap();
    let second = build(&issues);

    // The second build never saw `renamed`, so its globals are untouched.
    let reply = first
        .invoke(InvokePayload::new("renamed-fail", json!({})))
        .await
        .unwrap();
    assert_eq!(reply.value(), Some(&json!("first")));
    assert!(!second.contains("renamed-fail"));
    assert!(issues.config().global_error_handler.is_none());
}
