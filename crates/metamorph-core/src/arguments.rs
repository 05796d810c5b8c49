//! Resolved argument set handed to a candidate's constructor
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::descriptor::ProvenanceKind;

/// A resolved capability. Holds an `Arc<T>` for the bound service type `T`.
pub type ServiceHandle = Arc<dyn Any + Send + Sync>;

/// Wrap a service so it can be handed out as a [`ServiceHandle`]
pub fn service_handle<T: ?Sized + Send + Sync + 'static>(service: Arc<T>) -> ServiceHandle {
    Arc::new(service)
}

#[derive(Clone)]
pub enum ArgumentValue {
    Data(Value),
    Service(ServiceHandle),
}

impl fmt::Debug for ArgumentValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ArgumentValue::Data(value) => f.debug_tuple("Data").field(value).finish(),
            ArgumentValue::Service(_) => f.write_str("Service(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedArgument {
    pub name: String,
    pub provenance: ProvenanceKind,
    pub tags: Vec<String>,
    /// Service type name for externally supplied arguments
    pub service: Option<String>,
    pub value: ArgumentValue,
}

/// Errors reading an argument inside a constructor
#[derive(Debug, Error)]
pub enum ArgumentError {
    #[error("ARG/MISSING: no argument named {0}")]
    Missing(String),

    #[error("ARG/NOT_DATA: argument {0} is a service")]
    NotData(String),

    #[error("ARG/NOT_SERVICE: argument {0} is data")]
    NotService(String),

    #[error("ARG/DECODE: argument {name}: {message}")]
    Decode { name: String, message: String },

    #[error("ARG/SERVICE_TYPE: argument {name} is not a {expected}")]
    ServiceType { name: String, expected: String },
}

/// Arguments in declared parameter order
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    entries: Vec<ResolvedArgument>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, argument: ResolvedArgument) {
        self.entries.push(argument);
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedArgument> {
        self.entries.iter().find(|a| a.name == name)
    }

    fn require(&self, name: &str) -> Result<&ResolvedArgument, ArgumentError> {
        self.get(name).ok_or_else(|| ArgumentError::Missing(name.to_string()))
    }

    /// Raw JSON value of a carried-forward argument
    pub fn value(&self, name: &str) -> Result<&Value, ArgumentError> {
        match &self.require(name)?.value {
            ArgumentValue::Data(value) => Ok(value),
            ArgumentValue::Service(_) => Err(ArgumentError::NotData(name.to_string())),
        }
    }

    /// Decode a carried-forward argument
    pub fn data<T: DeserializeOwned>(&self, name: &str) -> Result<T, ArgumentError> {
        let value = self.value(name)?;
        T::deserialize(value).map_err(|e| ArgumentError::Decode {
            name: name.to_string(),
            message: e.to_string(),
        })
    }

    pub fn text(&self, name: &str) -> Result<String, ArgumentError> {
        self.data(name)
    }

    /// Fetch an externally supplied argument
    pub fn service<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, ArgumentError> {
        match &self.require(name)?.value {
            ArgumentValue::Service(handle) => handle.downcast_ref::<Arc<T>>().cloned().ok_or_else(|| {
                ArgumentError::ServiceType {
                    name: name.to_string(),
                    expected: std::any::type_name::<T>().to_string(),
                }
            }),
            ArgumentValue::Data(_) => Err(ArgumentError::NotService(name.to_string())),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedArgument> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|a| a.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
