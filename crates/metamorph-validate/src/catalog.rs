//! Validator catalogs
//!
//! The engine only sees the [`ValidatorCatalog`] trait. [`ValidatorSet`] is
//! the stock implementation: declarative rules plus custom closures, keyed
//! by field name and optional semantic tag.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::outcome::Outcome;
use crate::rule::{CompiledRule, FieldRule};
use crate::ValidateError;

/// Field-level validation collaborator
///
/// `None` means no validator is registered at that scope. Implementations
/// are shared between concurrent runs and must not mutate on read.
pub trait ValidatorCatalog: Send + Sync {
    /// Base validator for a field name
    fn validate(&self, field: &str, value: &Value) -> Option<Outcome>;

    /// Refinement validator for a field name under a semantic tag
    fn validate_tagged(&self, field: &str, tag: &str, value: &Value) -> Option<Outcome>;
}

/// A catalog with no validators at all
#[derive(Debug, Clone, Copy, Default)]
pub struct NoValidation;

impl ValidatorCatalog for NoValidation {
    fn validate(&self, _field: &str, _value: &Value) -> Option<Outcome> {
        None
    }

    fn validate_tagged(&self, _field: &str, _tag: &str, _value: &Value) -> Option<Outcome> {
        None
    }
}

type CustomFn = dyn Fn(&Value) -> Outcome + Send + Sync;

#[derive(Clone)]
enum Validator {
    Rule(CompiledRule),
    Custom(Arc<CustomFn>),
}

impl Validator {
    fn evaluate(&self, value: &Value) -> Outcome {
        match self {
            Validator::Rule(rule) => rule.evaluate(value),
            Validator::Custom(f) => f(value),
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Validator::Rule(rule) => f.debug_tuple("Rule").field(&rule.rule).finish(),
            Validator::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Scope {
    field: String,
    tag: Option<String>,
}

/// On-disk shape of a rule file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleFile {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub rules: Vec<FieldRule>,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Stock validator catalog
#[derive(Debug, Clone, Default)]
pub struct ValidatorSet {
    validators: HashMap<Scope, Vec<Validator>>,
}

impl ValidatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a declarative rule. Several rules on one scope run in insertion order.
    pub fn with_rule(mut self, rule: FieldRule) -> Result<Self, ValidateError> {
        self.add_rule(rule)?;
        Ok(self)
    }

    pub fn add_rule(&mut self, rule: FieldRule) -> Result<(), ValidateError> {
        let scope = Scope {
            field: rule.field.clone(),
            tag: rule.tag.clone(),
        };
        let compiled = rule.compile()?;
        self.validators.entry(scope).or_default().push(Validator::Rule(compiled));
        Ok(())
    }

    /// Add a base validator written as a closure
    pub fn with_custom<F>(mut self, field: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value) -> Outcome + Send + Sync + 'static,
    {
        self.push_custom(field.into(), None, Arc::new(f));
        self
    }

    /// Add a tag-scoped validator written as a closure
    pub fn with_tagged_custom<F>(mut self, field: impl Into<String>, tag: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value) -> Outcome + Send + Sync + 'static,
    {
        self.push_custom(field.into(), Some(tag.into()), Arc::new(f));
        self
    }

    fn push_custom(&mut self, field: String, tag: Option<String>, f: Arc<CustomFn>) {
        self.validators
            .entry(Scope { field, tag })
            .or_default()
            .push(Validator::Custom(f));
    }

    /// Parse a rule file from YAML content
    pub fn from_yaml(yaml: &str) -> Result<Self, ValidateError> {
        let file: RuleFile = serde_yaml::from_str(yaml).map_err(|e| ValidateError::Parse(e.to_string()))?;
        let mut set = Self::new();
        for rule in file.rules {
            set.add_rule(rule)?;
        }
        Ok(set)
    }

    /// Load a rule file from disk
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ValidateError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ValidateError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&content)
    }

    /// Merge another set into this one; its validators run after ours
    pub fn merge(mut self, other: ValidatorSet) -> Self {
        for (scope, validators) in other.validators {
            self.validators.entry(scope).or_default().extend(validators);
        }
        self
    }

    /// Number of distinct (field, tag) scopes
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    fn run(&self, scope: &Scope, value: &Value) -> Option<Outcome> {
        let validators = self.validators.get(scope)?;
        for validator in validators {
            let outcome = validator.evaluate(value);
            if outcome.is_rejected() {
                return Some(outcome);
            }
        }
        Some(Outcome::accepted())
    }
}

impl ValidatorCatalog for ValidatorSet {
    fn validate(&self, field: &str, value: &Value) -> Option<Outcome> {
        let scope = Scope {
            field: field.to_string(),
            tag: None,
        };
        self.run(&scope, value)
    }

    fn validate_tagged(&self, field: &str, tag: &str, value: &Value) -> Option<Outcome> {
        let scope = Scope {
            field: field.to_string(),
            tag: Some(tag.to_string()),
        };
        self.run(&scope, value)
    }
}

impl<T: ValidatorCatalog + ?Sized> ValidatorCatalog for Arc<T> {
    fn validate(&self, field: &str, value: &Value) -> Option<Outcome> {
        (**self).validate(field, value)
    }

    fn validate_tagged(&self, field: &str, tag: &str, value: &Value) -> Option<Outcome> {
        (**self).validate_tagged(field, tag, value)
    }
}
