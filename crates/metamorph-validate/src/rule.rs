//! Declarative field rules
//!
//! A rule binds an ordered list of checks to a field name and, optionally,
//! a semantic tag. Rules are plain data so they can be loaded from YAML.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::outcome::{FailureKind, Outcome, ValidationFailure};
use crate::ValidateError;

/// A single field rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Field (constructor parameter) name this rule guards
    pub field: String,

    /// Semantic tag; `None` makes this the base rule for the field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Checks run in order; the first failure wins
    pub checks: Vec<RuleCheck>,

    /// Replaces the default message template of every failing check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl FieldRule {
    /// Create a base rule for a field
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            tag: None,
            checks: Vec::new(),
            message: None,
        }
    }

    /// Create a refinement rule for a field under a semantic tag
    pub fn tagged(field: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Self::new(field)
        }
    }

    /// Add a check
    pub fn with_check(mut self, check: RuleCheck) -> Self {
        self.checks.push(check);
        self
    }

    /// Override the message template
    pub fn with_message(mut self, template: impl Into<String>) -> Self {
        self.message = Some(template.into());
        self
    }

    pub fn one_of<I, V>(self, allowed: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.with_check(RuleCheck::OneOf {
            allowed: allowed.into_iter().map(Into::into).collect(),
        })
    }

    pub fn non_empty(self) -> Self {
        self.with_check(RuleCheck::NonEmpty)
    }

    pub fn range(self, min: Option<f64>, max: Option<f64>) -> Self {
        self.with_check(RuleCheck::Range { min, max })
    }

    pub fn pattern(self, pattern: impl Into<String>) -> Self {
        self.with_check(RuleCheck::Pattern {
            pattern: pattern.into(),
        })
    }

    pub fn max_length(self, max: usize) -> Self {
        self.with_check(RuleCheck::MaxLength { max })
    }

    /// Compile regex patterns; fails on the first invalid one
    pub(crate) fn compile(self) -> Result<CompiledRule, ValidateError> {
        let mut checks = Vec::with_capacity(self.checks.len());
        for check in &self.checks {
            let compiled = match check {
                RuleCheck::Pattern { pattern } => {
                    let regex = Regex::new(pattern).map_err(|e| ValidateError::InvalidPattern {
                        field: self.field.clone(),
                        pattern: pattern.clone(),
                        message: e.to_string(),
                    })?;
                    CompiledCheck::Pattern(regex)
                }
                other => CompiledCheck::Plain(other.clone()),
            };
            checks.push(compiled);
        }
        Ok(CompiledRule { rule: self, checks })
    }
}

/// A check a rule applies to a value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleCheck {
    /// Value must equal one of the listed values
    OneOf { allowed: Vec<Value> },
    /// Strings must contain a non-whitespace character, arrays and objects an element
    NonEmpty,
    /// Numeric value must lie within the inclusive bounds
    Range {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    /// String value must match the regular expression
    Pattern { pattern: String },
    /// String length (in chars) or array length must not exceed `max`
    MaxLength { max: usize },
}

#[derive(Debug, Clone)]
enum CompiledCheck {
    Plain(RuleCheck),
    Pattern(Regex),
}

/// A rule with its patterns compiled, ready to run
#[derive(Debug, Clone)]
pub(crate) struct CompiledRule {
    pub(crate) rule: FieldRule,
    checks: Vec<CompiledCheck>,
}

impl CompiledRule {
    pub(crate) fn evaluate(&self, value: &Value) -> Outcome {
        for check in &self.checks {
            if let Some(failure) = self.check(check, value) {
                let failure = failure
                    .with_param("field", &self.rule.field)
                    .with_param("value", display_value(value));
                let failure = match &self.rule.message {
                    Some(template) => failure.with_template(template.clone()),
                    None => failure,
                };
                return Outcome::rejected(failure);
            }
        }
        Outcome::accepted()
    }

    fn check(&self, check: &CompiledCheck, value: &Value) -> Option<ValidationFailure> {
        match check {
            CompiledCheck::Pattern(regex) => match value.as_str() {
                Some(s) if regex.is_match(s) => None,
                Some(_) => Some(
                    ValidationFailure::new(
                        FailureKind::PatternMismatch,
                        "{field} value '{value}' does not match {pattern}",
                    )
                    .with_param("pattern", regex.as_str()),
                ),
                None => Some(wrong_type("string")),
            },
            CompiledCheck::Plain(RuleCheck::OneOf { allowed }) => {
                if allowed.iter().any(|a| a == value) {
                    None
                } else {
                    let listed = allowed.iter().map(display_value).collect::<Vec<_>>().join(", ");
                    Some(
                        ValidationFailure::new(
                            FailureKind::NotOneOf,
                            "{field} value '{value}' is not one of: {allowed}",
                        )
                        .with_param("allowed", listed),
                    )
                }
            }
            CompiledCheck::Plain(RuleCheck::NonEmpty) => {
                let empty = match value {
                    Value::Null => true,
                    Value::String(s) => s.trim().is_empty(),
                    Value::Array(items) => items.is_empty(),
                    Value::Object(map) => map.is_empty(),
                    _ => false,
                };
                empty.then(|| ValidationFailure::new(FailureKind::Empty, "{field} must not be empty"))
            }
            CompiledCheck::Plain(RuleCheck::Range { min, max }) => {
                let Some(n) = value.as_f64() else {
                    return Some(wrong_type("number"));
                };
                let below = min.map_or(false, |m| n < m);
                let above = max.map_or(false, |m| n > m);
                if below || above {
                    let mut failure = ValidationFailure::new(
                        FailureKind::OutOfRange,
                        range_template(*min, *max),
                    );
                    if let Some(m) = min {
                        failure = failure.with_param("min", m);
                    }
                    if let Some(m) = max {
                        failure = failure.with_param("max", m);
                    }
                    Some(failure)
                } else {
                    None
                }
            }
            CompiledCheck::Plain(RuleCheck::MaxLength { max }) => {
                let len = match value {
                    Value::String(s) => s.chars().count(),
                    Value::Array(items) => items.len(),
                    _ => return Some(wrong_type("string or array")),
                };
                (len > *max).then(|| {
                    ValidationFailure::new(
                        FailureKind::TooLong,
                        "{field} is {length} long, at most {max} allowed",
                    )
                    .with_param("length", len)
                    .with_param("max", max)
                })
            }
            // Patterns are always compiled
            CompiledCheck::Plain(RuleCheck::Pattern { .. }) => None,
        }
    }
}

fn range_template(min: Option<f64>, max: Option<f64>) -> &'static str {
    match (min, max) {
        (Some(_), Some(_)) => "{field} value {value} must be between {min} and {max}",
        (Some(_), None) => "{field} value {value} must be at least {min}",
        (None, Some(_)) => "{field} value {value} must be at most {max}",
        (None, None) => "{field} value {value} is out of range",
    }
}

fn wrong_type(expected: &str) -> ValidationFailure {
    ValidationFailure::new(FailureKind::WrongType, "{field} must be a {expected}, got '{value}'")
        .with_param("expected", expected)
}

/// Render a value for message substitution; strings appear without quotes
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
