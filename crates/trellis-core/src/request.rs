//! Requests, invocation envelopes and replies.
//!
//! A [`Request`] is what middlewares, resolver methods and error handlers
//! receive. It is backed by an `Arc`, so handing a copy to every middleware in
//! a chain costs a reference-count bump rather than a deep clone of the
//! payload.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::HandlerError;

// =============================================================================
// ResolverContext
// =============================================================================

/// Identifies the resolver function that failed.
///
/// Attached to the request context under `resolver` before an error handler
/// is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverContext {
    /// The handler key the function was registered under.
    pub key: String,
    /// Name of the resolver type.
    pub class_name: String,
    /// Name of the annotated method.
    pub method_name: String,
}

// =============================================================================
// RequestContext
// =============================================================================

/// The context half of a request.
///
/// The platform owns the shape of `fields`; this layer only ever adds the
/// `resolver` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Platform-defined context fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,

    /// Set when the request is handed to an error handler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolver: Option<ResolverContext>,
}

impl RequestContext {
    /// Returns a platform context field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

// =============================================================================
// Request
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
struct RequestParts {
    payload: Value,
    context: RequestContext,
}

/// A resolver request: a JSON payload plus its context.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    parts: Arc<RequestParts>,
}

impl Request {
    /// Creates a request with the given payload and an empty context.
    pub fn new(payload: Value) -> Self {
        Self::with_context(payload, RequestContext::default())
    }

    /// Creates a request from a payload and a full context.
    pub fn with_context(payload: Value, context: RequestContext) -> Self {
        Self {
            parts: Arc::new(RequestParts { payload, context }),
        }
    }

    /// Adds a platform context field (builder pattern).
    pub fn context_field(mut self, key: impl Into<String>, value: Value) -> Self {
        Arc::make_mut(&mut self.parts)
            .context
            .fields
            .insert(key.into(), value);
        self
    }

    /// Returns the raw payload.
    pub fn payload(&self) -> &Value {
        &self.parts.payload
    }

    /// Deserializes the payload into `T`.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        Ok(T::deserialize(&self.parts.payload)?)
    }

    /// Returns the request context.
    pub fn context(&self) -> &RequestContext {
        &self.parts.context
    }

    /// Returns the resolver context, if one has been attached.
    pub fn resolver(&self) -> Option<&ResolverContext> {
        self.parts.context.resolver.as_ref()
    }

    /// Returns a copy of this request whose context carries `resolver`.
    ///
    /// Payload and platform fields are preserved.
    pub fn enriched(&self, resolver: ResolverContext) -> Self {
        let mut parts = RequestParts::clone(&self.parts);
        parts.context.resolver = Some(resolver);
        Self {
            parts: Arc::new(parts),
        }
    }

    /// Returns `true` if both requests share the same storage.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.parts, &other.parts)
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new(Value::Object(Map::new()))
    }
}

// =============================================================================
// InvokePayload
// =============================================================================

/// The `call` half of an invocation envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeCall {
    /// Key of the resolver function to run.
    pub function_key: String,

    /// Request payload; treated as `{}` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    /// Identifier of the async job that issued the call, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

/// The invocation envelope a platform hands to a definitions handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokePayload {
    /// What to call.
    pub call: InvokeCall,

    /// Platform context for this call.
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl InvokePayload {
    /// Creates an envelope for `function_key` with the given payload.
    pub fn new(function_key: impl Into<String>, payload: Value) -> Self {
        Self {
            call: InvokeCall {
                function_key: function_key.into(),
                payload: Some(payload),
                job_id: None,
            },
            context: Map::new(),
        }
    }

    /// Adds a context field (builder pattern).
    pub fn context_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Splits the envelope into the function key and the request to dispatch.
    ///
    /// A missing payload becomes `{}`; a job id is copied into the request
    /// context as `jobId`.
    pub fn into_request(self) -> (String, Request) {
        let InvokePayload { call, mut context } = self;
        if let Some(job_id) = call.job_id {
            context.insert("jobId".to_string(), Value::String(job_id));
        }
        let payload = call.payload.unwrap_or_else(|| Value::Object(Map::new()));
        let request = Request::with_context(
            payload,
            RequestContext {
                fields: context,
                resolver: None,
            },
        );
        (call.function_key, request)
    }
}

// =============================================================================
// Reply
// =============================================================================

/// What a dispatched resolver function returns to the platform.
///
/// Failures are ordinary values here: a reply is either the response value or
/// the error that could not be (or was not) handled.
#[derive(Debug, Clone)]
pub enum Reply {
    /// A successful response, or the value returned by an error handler.
    Value(Value),
    /// An unhandled error, or the original error when its handler failed.
    Error(HandlerError),
}

impl Reply {
    /// Returns `true` if this reply carries an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Returns the response value, if any.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            Self::Error(_) => None,
        }
    }

    /// Returns the error, if any.
    pub fn error(&self) -> Option<&HandlerError> {
        match self {
            Self::Value(_) => None,
            Self::Error(e) => Some(e),
        }
    }

    /// Converts the reply into a `Result`.
    pub fn into_result(self) -> Result<Value, HandlerError> {
        match self {
            Self::Value(v) => Ok(v),
            Self::Error(e) => Err(e),
        }
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<HandlerError> for Reply {
    fn from(error: HandlerError) -> Self {
        Self::Error(error)
    }
}

/// Values serialize as themselves; errors as `{"error": {"message": ...}}`.
impl Serialize for Reply {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => v.serialize(serializer),
            Self::Error(e) => {
                let mut body = Map::new();
                body.insert("message".to_string(), Value::String(e.to_string()));
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", &body)?;
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_enriched_keeps_payload_and_fields() {
        let req = Request::new(json!({ "id": 7 })).context_field("accountId", json!("abc"));
        let enriched = req.enriched(ResolverContext {
            key: "load".into(),
            class_name: "Issues".into(),
            method_name: "load".into(),
        });

        assert_eq!(enriched.payload(), req.payload());
        assert_eq!(enriched.context().get("accountId"), Some(&json!("abc")));
        assert_eq!(enriched.resolver().map(|r| r.key.as_str()), Some("load"));
        assert!(req.resolver().is_none());
    }

    #[test]
    fn test_payload_as() {
        #[derive(Deserialize)]
        struct Query {
            id: u32,
        }

        let req = Request::new(json!({ "id": 7 }));
        let query: Query = req.payload_as().unwrap();
        assert_eq!(query.id, 7);

        let bad = Request::new(json!("not an object"));
        assert!(bad.payload_as::<Query>().is_err());
    }

    #[test]
    fn test_invoke_payload_decoding() {
        let envelope: InvokePayload = serde_json::from_value(json!({
            "call": { "functionKey": "ping", "jobId": "job-1" },
            "context": { "cloudId": "c-1" }
        }))
        .unwrap();

        let (key, req) = envelope.into_request();
        assert_eq!(key, "ping");
        assert_eq!(req.payload(), &json!({}));
        assert_eq!(req.context().get("cloudId"), Some(&json!("c-1")));
        assert_eq!(req.context().get("jobId"), Some(&json!("job-1")));
    }

    #[test]
    fn test_resolver_context_serializes_camel_case() {
        let ctx = RequestContext {
            fields: Map::new(),
            resolver: Some(ResolverContext {
                key: "k".into(),
                class_name: "C".into(),
                method_name: "m".into(),
            }),
        };
        assert_eq!(
            serde_json::to_value(&ctx).unwrap(),
            json!({ "resolver": { "key": "k", "className": "C", "methodName": "m" } })
        );
    }

    #[test]
    fn test_reply_serialization() {
        let ok = Reply::Value(json!({ "ok": true }));
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({ "ok": true }));

        let err = Reply::Error(HandlerError::msg("denied"));
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({ "error": { "message": "denied" } })
        );
    }
}
