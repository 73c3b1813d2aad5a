//! Error types shared across the Trellis crates.
//!
//! Three families live here:
//!
//! - [`HandlerError`] – the type-erased error raised by user middlewares,
//!   resolver methods and error handlers. The dispatch wrapper recovers it
//!   into a [`Reply`](crate::Reply), it is never propagated as a service error.
//! - [`DefinitionError`] – configuration errors raised while registering
//!   resolver functions with a platform.
//! - [`InvokeError`] – errors produced while decoding or routing an
//!   invocation envelope.

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

// =============================================================================
// HandlerError
// =============================================================================

/// An error raised by a middleware, a resolver method or an error handler.
///
/// `HandlerError` is cheap to clone: the underlying error is shared, so the
/// error passed to an error handler and the error returned as the reply can be
/// the very same value. Use [`ptr_eq`](Self::ptr_eq) to check identity.
///
/// Any `std::error::Error + Send + Sync + 'static` converts into it, so `?`
/// works inside resolver methods:
///
/// ```rust,ignore
/// async fn load(&self, req: Request) -> Result<Value, HandlerError> {
///     let query: Query = req.payload_as()?;
///     Ok(self.store.find(&query).await?)
/// }
/// ```
#[derive(Clone)]
pub struct HandlerError {
    inner: Arc<dyn StdError + Send + Sync + 'static>,
}

impl HandlerError {
    /// Wraps an existing error.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(error),
        }
    }

    /// Creates an error from a plain message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Self::new(MessageError(message.to_string()))
    }

    /// Creates an error from a panic payload caught while running user code.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::new(PanicError(message))
    }

    /// Returns `true` if this error was produced by a caught panic.
    pub fn is_panic(&self) -> bool {
        self.inner.is::<PanicError>()
    }

    /// Attempts to downcast the inner error to a concrete type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    /// Returns `true` if both values share the same underlying error.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.inner), Arc::as_ptr(&other.inner))
    }

    /// Returns the inner error as a standard error trait object.
    pub fn as_std(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.inner
    }
}

impl<E> From<E> for HandlerError
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandlerError").field(&self.inner).finish()
    }
}

impl AsRef<dyn StdError + Send + Sync + 'static> for HandlerError {
    fn as_ref(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.as_std()
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
struct MessageError(String);

#[derive(Debug, Error)]
#[error("panicked: {0}")]
struct PanicError(String);

// =============================================================================
// DefinitionError
// =============================================================================

/// Configuration errors raised while building resolver definitions.
///
/// These are fatal to the build call that raised them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DefinitionError {
    /// A resolver function was declared with an empty key.
    #[error("resolver function '{class_name}::{method_name}' has an empty key")]
    EmptyKey {
        /// Name of the resolver type.
        class_name: String,
        /// Name of the annotated method.
        method_name: String,
    },

    /// The same key was registered twice with one platform.
    #[error("resolver function key '{0}' is already defined")]
    DuplicateKey(String),
}

/// Result type for definition operations.
pub type DefinitionResult<T> = Result<T, DefinitionError>;

// =============================================================================
// InvokeError
// =============================================================================

/// Errors that can occur while routing an invocation to a resolver function.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// No resolver function is registered under the requested key.
    #[error("no resolver function defined for key '{0}'")]
    UnknownFunction(String),

    /// The resolver has no annotated method with the requested name.
    #[error("resolver '{class_name}' has no resolver function named '{method_name}'")]
    UnknownMethod {
        /// Name of the resolver type.
        class_name: String,
        /// Requested method name.
        method_name: String,
    },

    /// The invocation envelope could not be decoded.
    #[error("invalid invocation payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Result type for invocation routing.
pub type InvokeResult<T> = Result<T, InvokeError>;
