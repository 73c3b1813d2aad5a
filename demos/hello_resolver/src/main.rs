//! Hello Resolver Example
//!
//! A small issue tracker exposed as resolver functions. Each invocation below
//! travels through the same path a platform would drive:
//!
//! ```text
//! envelope ─▶ DefinitionsHandler ─▶ method mws ─▶ class mws ─▶ global mws ─▶ method
//! ```
//!
//! - `require_license` guards every function of the resolver
//! - `require_admin` additionally guards `delete-issue`
//! - failures are reported by the class handler, or by the global `report`
//!   handler registered on the runtime
//!
//! # Usage
//!
//! ```bash
//! cargo run --package hello-resolver
//! ```

use std::collections::BTreeMap;

use anyhow::Result;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;
use trellis::prelude::*;
use trellis::runtime::ConfigLoader;

// ============================================================================
// Middlewares and error handlers
// ============================================================================

/// Rejects invocations without an active license.
async fn require_license(req: Request) -> Option<Value> {
    let licensed = req.context().get("license") == Some(&json!("ACTIVE"));
    (!licensed).then(|| json!({ "error": "This app requires an active license" }))
}

/// Rejects invocations from non-admin accounts.
async fn require_admin(req: Request) -> Option<Value> {
    let admin = req.context().get("role") == Some(&json!("admin"));
    (!admin).then(|| json!({ "error": "Only admins can do that" }))
}

/// Class-wide error handler.
async fn issue_error(err: HandlerError, req: Request) -> Value {
    json!({
        "error": err.to_string(),
        "function": req.resolver().map(|r| r.key.clone()),
    })
}

/// Global error handler, picked by name from the configuration.
async fn report(err: HandlerError, req: Request) -> Value {
    let origin = req
        .resolver()
        .map(|r| format!("{}::{}", r.class_name, r.method_name))
        .unwrap_or_default();
    json!({ "error": err.to_string(), "origin": origin })
}

// ============================================================================
// Resolvers
// ============================================================================

/// A tiny in-memory issue store.
#[derive(Default)]
struct IssueStore {
    issues: Mutex<BTreeMap<u32, String>>,
}

impl IssueStore {
    fn insert(&self, id: u32, title: impl Into<String>) {
        self.issues.lock().insert(id, title.into());
    }

    fn get(&self, id: u32) -> Option<String> {
        self.issues.lock().get(&id).cloned()
    }

    fn remove(&self, id: u32) -> Option<String> {
        self.issues.lock().remove(&id)
    }

    fn snapshot(&self) -> BTreeMap<u32, String> {
        self.issues.lock().clone()
    }
}

#[derive(Deserialize)]
struct IssueId {
    id: u32,
}

struct Issues {
    store: IssueStore,
}

#[resolver(middlewares = [require_license], error_handler = issue_error)]
impl Issues {
    #[resolver_fn("get-issue")]
    async fn get_issue(&self, req: Request) -> Result<Value, HandlerError> {
        let IssueId { id } = req.payload_as()?;
        let title = self
            .store
            .get(id)
            .ok_or_else(|| HandlerError::msg(format!("issue {id} not found")))?;
        Ok(json!({ "id": id, "title": title }))
    }

    #[resolver_fn("list-issues")]
    fn list_issues(&self) -> Value {
        json!(self.store.snapshot())
    }

    #[resolver_fn(key = "delete-issue", middlewares = [require_admin])]
    async fn delete_issue(&self, req: Request) -> Result<Value, HandlerError> {
        let IssueId { id } = req.payload_as()?;
        match self.store.remove(id) {
            Some(title) => Ok(json!({ "deleted": title })),
            None => Err(HandlerError::msg(format!("issue {id} not found"))),
        }
    }
}

struct Health;

#[resolver(name = "HealthResolver")]
impl Health {
    #[resolver_fn("ping")]
    fn ping(&self) -> Value {
        json!("pong")
    }

    #[resolver_fn("crash")]
    async fn crash(&self) -> Result<Value, HandlerError> {
        Err(HandlerError::msg("health check failed"))
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Configuration comes from trellis.toml / TRELLIS_* when present.
    let mut config = ConfigLoader::new().with_current_dir().load()?;
    config
        .definitions
        .error_handler
        .get_or_insert_with(|| "report".to_string());

    let store = IssueStore::default();
    store.insert(1, "Login button is misaligned");
    store.insert(2, "Dark mode flickers on startup");

    let mut runtime = TrellisRuntime::from_config(&config);
    runtime
        .register_middleware("require_license", require_license)
        .register_error_handler("report", report)
        .add_resolver(ResolverHandle::new(Issues { store }))
        .add_resolver(ResolverHandle::new(Health));

    let handler = runtime.build()?;
    info!(functions = ?handler.keys().collect::<Vec<_>>(), "Definitions built");

    let admin = BTreeMap::from([("license", "ACTIVE"), ("role", "admin")]);
    let user = BTreeMap::from([("license", "ACTIVE")]);
    let unlicensed = BTreeMap::new();

    let calls = [
        ("get-issue", json!({ "id": 1 }), &user),
        ("get-issue", json!({ "id": 1 }), &unlicensed),
        ("get-issue", json!({ "id": 42 }), &user),
        ("delete-issue", json!({ "id": 2 }), &user),
        ("delete-issue", json!({ "id": 2 }), &admin),
        ("list-issues", json!({}), &user),
        ("ping", json!({}), &unlicensed),
        ("crash", json!({}), &unlicensed),
    ];

    for (key, payload, context) in calls {
        let envelope = json!({
            "call": { "functionKey": key, "payload": payload },
            "context": context,
        });
        let response = handler.call_json(envelope).await?;
        info!(key, context = ?context, %response, "Invocation finished");
    }

    Ok(())
}
