//! Dependency resolution for externally supplied parameters
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::arguments::{service_handle, ServiceHandle};
use crate::descriptor::ServiceKey;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("INJECT/UNBOUND: no binding for {service}{}", binding_suffix(.binding))]
    Unbound {
        service: String,
        binding: Option<String>,
    },

    #[error("INJECT/FACTORY: factory for {service} failed: {message}")]
    Factory { service: String, message: String },
}

fn binding_suffix(binding: &Option<String>) -> String {
    match binding {
        Some(name) => format!(" named {:?}", name),
        None => String::new(),
    }
}

/// Source of externally supplied constructor arguments
///
/// Called once per externally supplied parameter per candidate attempt.
/// Shared between concurrent runs; must behave as read-only.
pub trait DependencyResolver: Send + Sync {
    fn resolve(&self, key: &ServiceKey, binding: Option<&str>) -> Result<ServiceHandle, ResolveError>;
}

/// Resolver with no bindings
#[derive(Debug, Clone, Copy, Default)]
pub struct NoServices;

impl DependencyResolver for NoServices {
    fn resolve(&self, key: &ServiceKey, binding: Option<&str>) -> Result<ServiceHandle, ResolveError> {
        Err(ResolveError::Unbound {
            service: key.name(),
            binding: binding.map(str::to_string),
        })
    }
}

type Factory = dyn Fn() -> anyhow::Result<ServiceHandle> + Send + Sync;

#[derive(Clone)]
enum Binding {
    Singleton(ServiceHandle),
    Factory(Arc<Factory>),
}

type BindingKey = (TypeId, Option<String>);

/// Stock dependency container
///
/// Named lookups fall back to the unnamed binding of the same type.
#[derive(Clone, Default)]
pub struct Container {
    bindings: HashMap<BindingKey, Binding>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a shared instance
    pub fn bind<T: ?Sized + Send + Sync + 'static>(mut self, service: Arc<T>) -> Self {
        self.bindings
            .insert((TypeId::of::<T>(), None), Binding::Singleton(service_handle(service)));
        self
    }

    /// Bind a shared instance under a name
    pub fn bind_named<T: ?Sized + Send + Sync + 'static>(mut self, name: impl Into<String>, service: Arc<T>) -> Self {
        self.bindings.insert(
            (TypeId::of::<T>(), Some(name.into())),
            Binding::Singleton(service_handle(service)),
        );
        self
    }

    /// Bind a factory invoked on every resolution
    pub fn bind_factory<T, F>(mut self, factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn() -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
    {
        let factory: Arc<Factory> = Arc::new(move || factory().map(service_handle));
        self.bindings
            .insert((TypeId::of::<T>(), None), Binding::Factory(factory));
        self
    }

    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.bindings.contains_key(&(TypeId::of::<T>(), None))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    fn lookup(&self, key: &ServiceKey, binding: Option<&str>) -> Option<&Binding> {
        if let Some(name) = binding {
            if let Some(found) = self.bindings.get(&(key.id(), Some(name.to_string()))) {
                return Some(found);
            }
        }
        self.bindings.get(&(key.id(), None))
    }
}

impl DependencyResolver for Container {
    fn resolve(&self, key: &ServiceKey, binding: Option<&str>) -> Result<ServiceHandle, ResolveError> {
        match self.lookup(key, binding) {
            Some(Binding::Singleton(handle)) => Ok(Arc::clone(handle)),
            Some(Binding::Factory(factory)) => factory().map_err(|e| ResolveError::Factory {
                service: key.name(),
                message: format!("{:#}", e),
            }),
            None => Err(ResolveError::Unbound {
                service: key.name(),
                binding: binding.map(str::to_string),
            }),
        }
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Container")
            .field("bindings", &self.bindings.len())
            .finish()
    }
}

impl<T: DependencyResolver + ?Sized> DependencyResolver for Arc<T> {
    fn resolve(&self, key: &ServiceKey, binding: Option<&str>) -> Result<ServiceHandle, ResolveError> {
        (**self).resolve(key, binding)
    }
}
