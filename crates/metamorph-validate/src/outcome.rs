//! Validation outcomes
//!
//! Provides Accepted/Rejected outcomes with a machine-checkable failure kind
//! and a localizable message template.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

/// The result of running one validator against one value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// Value passed the check
    Accepted,

    /// Value was rejected
    Rejected { failure: ValidationFailure },
}

impl Outcome {
    /// Create an accepted outcome
    pub fn accepted() -> Self {
        Outcome::Accepted
    }

    /// Create a rejected outcome
    pub fn rejected(failure: ValidationFailure) -> Self {
        Outcome::Rejected { failure }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Outcome::Rejected { .. })
    }

    /// Get the failure if this outcome is a rejection
    pub fn failure(&self) -> Option<&ValidationFailure> {
        match self {
            Outcome::Rejected { failure } => Some(failure),
            Outcome::Accepted => None,
        }
    }

    /// Take the failure out of a rejection
    pub fn into_failure(self) -> Option<ValidationFailure> {
        match self {
            Outcome::Rejected { failure } => Some(failure),
            Outcome::Accepted => None,
        }
    }
}

/// Machine-checkable reason a value was rejected
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotOneOf,
    Empty,
    OutOfRange,
    PatternMismatch,
    TooLong,
    WrongType,
    Custom(String),
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FailureKind::NotOneOf => write!(f, "not_one_of"),
            FailureKind::Empty => write!(f, "empty"),
            FailureKind::OutOfRange => write!(f, "out_of_range"),
            FailureKind::PatternMismatch => write!(f, "pattern_mismatch"),
            FailureKind::TooLong => write!(f, "too_long"),
            FailureKind::WrongType => write!(f, "wrong_type"),
            FailureKind::Custom(kind) => write!(f, "custom:{}", kind),
        }
    }
}

/// A typed validation failure
///
/// The message is kept as a template plus substitution values so a
/// collaborator can localize it; `render` produces the default text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    /// What went wrong
    pub kind: FailureKind,
    /// Message template with `{placeholder}` slots
    pub template: String,
    /// Substitution values for the template
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl ValidationFailure {
    pub fn new(kind: FailureKind, template: impl Into<String>) -> Self {
        Self {
            kind,
            template: template.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a substitution value
    pub fn with_param(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    /// Replace the template, keeping kind and params
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Substitute `{placeholder}` slots. Unknown placeholders stay as written.
    pub fn render(&self) -> String {
        PLACEHOLDER
            .replace_all(&self.template, |caps: &regex::Captures| {
                match self.params.get(&caps[1]) {
                    Some(value) => value.clone(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Get a substitution value
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(|s| s.as_str())
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.render())
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Outcome::Accepted => write!(f, "ACCEPTED"),
            Outcome::Rejected { failure } => write!(f, "REJECTED: {}", failure),
        }
    }
}
