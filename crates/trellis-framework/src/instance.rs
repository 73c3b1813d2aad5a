//! Resolver handles.
//!
//! A [`ResolverHandle<T>`] owns one resolver instance together with its
//! stored [`ClassConfig`]. The config starts out as the resolver's declared
//! defaults and is later given the global overrides by the registry builder.
//! Every dispatcher created from a handle shares that config, so it is read
//! at invocation time rather than captured when the dispatcher is made.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::RwLock;
use tower::Layer;
use tower::util::BoxCloneSyncService;

use trellis_core::{
    ClassConfig, GlobalOverrides, InvokeError, InvokeResult, MethodEntry, Reply, Request, Resolver,
    ResolverFn,
};

use crate::dispatcher::{DispatchLayer, Dispatcher};
use crate::handler::MethodService;

/// A resolver instance together with its stored configuration.
///
/// Cloning a handle is cheap and shares both the instance and the config.
pub struct ResolverHandle<T: Resolver> {
    instance: Arc<T>,
    config: Arc<RwLock<ClassConfig>>,
    fns: Arc<[ResolverFn<T>]>,
}

impl<T: Resolver> ResolverHandle<T> {
    /// Wraps a resolver instance.
    pub fn new(instance: T) -> Self {
        Self::from_arc(Arc::new(instance))
    }

    /// Wraps an already shared resolver instance.
    pub fn from_arc(instance: Arc<T>) -> Self {
        Self {
            instance,
            config: Arc::new(RwLock::new(ClassConfig::from(T::config()))),
            fns: T::resolver_fns().into(),
        }
    }

    /// Returns the shared instance.
    pub fn instance(&self) -> &Arc<T> {
        &self.instance
    }

    /// Returns a snapshot of the stored configuration.
    pub fn config(&self) -> ClassConfig {
        self.config.read().clone()
    }

    /// Replaces the global overrides, keeping the resolver's own settings.
    pub fn set_globals(&self, globals: &GlobalOverrides) {
        self.config.write().set_globals(globals);
    }

    /// Returns the configuration of every resolver function, in declaration order.
    pub fn entries(&self) -> Vec<MethodEntry> {
        self.fns.iter().map(|f| f.entry().clone()).collect()
    }

    /// Returns the dispatcher for the method named `method_name`.
    pub fn dispatcher(&self, method_name: &str) -> Option<Dispatcher> {
        self.fns
            .iter()
            .find(|f| f.entry().method_name == method_name)
            .map(|f| self.wrap(f))
    }

    /// Returns a dispatcher per resolver function, in declaration order.
    pub fn dispatchers(&self) -> Vec<Dispatcher> {
        self.fns.iter().map(|f| self.wrap(f)).collect()
    }

    /// Invokes the method named `method_name` directly, bypassing any platform.
    pub async fn invoke(&self, method_name: &str, req: Request) -> InvokeResult<Reply> {
        let dispatcher = self
            .dispatcher(method_name)
            .ok_or_else(|| InvokeError::UnknownMethod {
                class_name: T::class_name().to_owned(),
                method_name: method_name.to_owned(),
            })?;
        Ok(dispatcher.dispatch(req).await)
    }

    fn wrap(&self, f: &ResolverFn<T>) -> Dispatcher {
        let method = MethodService::new(Arc::clone(&self.instance), Arc::clone(f.method()));
        DispatchLayer::new(f.entry().clone(), T::class_name(), Arc::clone(&self.config))
            .layer(BoxCloneSyncService::new(method))
    }
}

impl<T: Resolver> Clone for ResolverHandle<T> {
    fn clone(&self) -> Self {
        Self {
            instance: Arc::clone(&self.instance),
            config: Arc::clone(&self.config),
            fns: Arc::clone(&self.fns),
        }
    }
}

impl<T: Resolver> Deref for ResolverHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.instance
    }
}

impl<T: Resolver> fmt::Debug for ResolverHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverHandle")
            .field("class_name", &T::class_name())
            .field("config", &*self.config.read())
            .field("fns", &self.fns)
            .finish()
    }
}

// =============================================================================
// ResolverInstance
// =============================================================================

/// Object-safe view of a [`ResolverHandle`], used by the registry builder.
pub trait ResolverInstance: Send + Sync {
    /// Name of the resolver type.
    fn class_name(&self) -> &'static str;

    /// Snapshot of the stored configuration.
    fn config(&self) -> ClassConfig;

    /// Replaces the global overrides.
    fn set_globals(&self, globals: &GlobalOverrides);

    /// Resolver function configurations, in declaration order.
    fn entries(&self) -> Vec<MethodEntry>;

    /// One dispatcher per resolver function, in declaration order.
    fn dispatchers(&self) -> Vec<Dispatcher>;
}

impl<T: Resolver> ResolverInstance for ResolverHandle<T> {
    fn class_name(&self) -> &'static str {
        T::class_name()
    }

    fn config(&self) -> ClassConfig {
        ResolverHandle::config(self)
    }

    fn set_globals(&self, globals: &GlobalOverrides) {
        ResolverHandle::set_globals(self, globals);
    }

    fn entries(&self) -> Vec<MethodEntry> {
        ResolverHandle::entries(self)
    }

    fn dispatchers(&self) -> Vec<Dispatcher> {
        ResolverHandle::dispatchers(self)
    }
}
