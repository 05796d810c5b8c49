//! Candidate Evaluator
//!
//! Attempts to construct one candidate stage. Every failure is returned as
//! data; nothing raised by a candidate crosses this boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::descriptor::StageDescriptor;
use crate::journal::{ValidationTrace, ValidatorScope};
use crate::resolver::{ArgumentResolver, Resolution};
use crate::stage::{FieldKind, Fields, Stage};
use metamorph_validate::ValidationFailure;

/// Closed set of reasons a candidate is rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchReason {
    TypeMismatch,
    ConstructorFailure,
    ValidationFailure,
}

impl fmt::Display for UnmatchReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UnmatchReason::TypeMismatch => write!(f, "TypeMismatch"),
            UnmatchReason::ConstructorFailure => write!(f, "ConstructorFailure"),
            UnmatchReason::ValidationFailure => write!(f, "ValidationFailure"),
        }
    }
}

/// Detail behind an [`UnmatchReason`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CandidateFailure {
    /// A carried-forward field is missing from the source or has the wrong shape
    TypeMismatch {
        parameter: String,
        expected: FieldKind,
        /// Shape found on the source; `None` when the field is absent
        found: Option<String>,
    },
    /// A base or refinement validator rejected a carried-forward value
    Validation {
        parameter: String,
        scope: ValidatorScope,
        failure: ValidationFailure,
    },
    /// The dependency resolver could not supply a parameter
    Unresolved {
        parameter: String,
        service: String,
        binding: Option<String>,
        message: String,
    },
    /// The candidate's own construction logic rejected the arguments
    Constructor { message: String },
}

impl CandidateFailure {
    pub fn reason(&self) -> UnmatchReason {
        match self {
            CandidateFailure::TypeMismatch { .. } => UnmatchReason::TypeMismatch,
            CandidateFailure::Validation { .. } => UnmatchReason::ValidationFailure,
            CandidateFailure::Unresolved { .. } | CandidateFailure::Constructor { .. } => {
                UnmatchReason::ConstructorFailure
            }
        }
    }

    /// The validation failure, if that is what rejected the candidate
    pub fn validation(&self) -> Option<&ValidationFailure> {
        match self {
            CandidateFailure::Validation { failure, .. } => Some(failure),
            _ => None,
        }
    }
}

impl fmt::Display for CandidateFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CandidateFailure::TypeMismatch {
                parameter,
                expected,
                found: Some(found),
            } => write!(f, "{} expects {}, source has {}", parameter, expected, found),
            CandidateFailure::TypeMismatch { parameter, .. } => {
                write!(f, "{} is not a field of the source stage", parameter)
            }
            CandidateFailure::Validation {
                parameter,
                scope,
                failure,
            } => write!(f, "{} rejected by {} validator: {}", parameter, scope, failure.render()),
            CandidateFailure::Unresolved {
                parameter, message, ..
            } => write!(f, "{} could not be supplied: {}", parameter, message),
            CandidateFailure::Constructor { message } => write!(f, "construction failed: {}", message),
        }
    }
}

/// Structured reason one candidate was rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmatchRecord {
    pub candidate: String,
    pub reason: UnmatchReason,
    pub failure: CandidateFailure,
    /// Validator outcomes for this candidate up to the rejection
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validations: Vec<ValidationTrace>,
}

impl UnmatchRecord {
    pub fn new(candidate: impl Into<String>, failure: CandidateFailure) -> Self {
        Self {
            candidate: candidate.into(),
            reason: failure.reason(),
            failure,
            validations: Vec::new(),
        }
    }

    pub fn with_validations(mut self, validations: Vec<ValidationTrace>) -> Self {
        self.validations = validations;
        self
    }
}

impl fmt::Display for UnmatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.candidate, self.reason, self.failure)
    }
}

/// A successfully constructed candidate
#[derive(Debug)]
pub struct Constructed {
    pub stage: Box<dyn Stage>,
    pub snapshot: Fields,
    pub resolution: Resolution,
}

#[derive(Debug)]
pub enum Evaluation {
    Constructed(Constructed),
    Unmatched(UnmatchRecord),
}

#[derive(Clone, Copy)]
pub struct CandidateEvaluator<'a> {
    resolver: ArgumentResolver<'a>,
}

impl<'a> CandidateEvaluator<'a> {
    pub fn new(resolver: ArgumentResolver<'a>) -> Self {
        Self { resolver }
    }

    pub fn evaluate(&self, candidate: &StageDescriptor, source: &Fields) -> Evaluation {
        let resolution = match self.resolver.resolve(candidate, source) {
            Ok(resolution) => resolution,
            Err(failed) => {
                return Evaluation::Unmatched(
                    UnmatchRecord::new(candidate.name(), failed.failure).with_validations(failed.validations),
                )
            }
        };

        let unmatched = |message: String, validations: Vec<ValidationTrace>| {
            Evaluation::Unmatched(
                UnmatchRecord::new(candidate.name(), CandidateFailure::Constructor { message })
                    .with_validations(validations),
            )
        };

        let stage = match candidate.construct(&resolution.arguments) {
            Ok(stage) => stage,
            Err(e) => return unmatched(format!("{:#}", e), resolution.validations),
        };

        let snapshot = match stage.snapshot() {
            Ok(serde_json::Value::Object(fields)) => fields,
            Ok(other) => {
                return unmatched(
                    format!("snapshot is {}, not a record", FieldKind::describe(&other)),
                    resolution.validations,
                )
            }
            Err(e) => return unmatched(format!("snapshot failed: {}", e), resolution.validations),
        };

        // Public fields are exactly the declared parameters, never more
        if let Some(extra) = snapshot.keys().find(|k| !candidate.declares_field(k)) {
            return unmatched(format!("undeclared field {}", extra), resolution.validations);
        }
        // and every carried-forward parameter stays observable to the next step
        if let Some(missing) = candidate
            .params()
            .iter()
            .find(|p| p.is_carried() && !snapshot.contains_key(&p.name))
        {
            return unmatched(format!("carried field {} missing from snapshot", missing.name), resolution.validations);
        }

        Evaluation::Constructed(Constructed {
            stage,
            snapshot,
            resolution,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inject::NoServices;
    use metamorph_validate::{FieldRule, NoValidation, ValidatorSet};
    use serde::Serialize;
    use serde_json::json;

    #[derive(Debug, Serialize)]
    struct Adult {
        age: i64,
    }

    /// Takes `age` but never exposes it
    #[derive(Debug, Serialize)]
    struct Forgetful {
        name: String,
    }

    #[derive(Debug, Serialize)]
    struct Leaky {
        age: i64,
        secret: String,
    }

    fn fields(age: i64) -> Fields {
        json!({ "age": age }).as_object().cloned().unwrap()
    }

    fn adult() -> StageDescriptor {
        StageDescriptor::new(|args| {
            let age: i64 = args.data("age")?;
            anyhow::ensure!(age >= 18, "age {} is below 18", age);
            Ok(Adult { age })
        })
        .carry("age", FieldKind::Integer)
    }

    fn evaluate(descriptor: &StageDescriptor, source: &Fields, validators: &ValidatorSet) -> Evaluation {
        let evaluator = CandidateEvaluator::new(ArgumentResolver::new(validators, &NoServices));
        evaluator.evaluate(descriptor, source)
    }

    #[test]
    fn test_constructed() {
        match evaluate(&adult(), &fields(30), &ValidatorSet::new()) {
            Evaluation::Constructed(c) => {
                assert_eq!(c.snapshot.get("age"), Some(&json!(30)));
                assert!(c.stage.as_any().is::<Adult>());
                assert_eq!(c.resolution.arguments.len(), 1);
            }
            other => panic!("expected construction, got {:?}", other),
        }
    }

    #[test]
    fn test_constructor_error_is_captured() {
        match evaluate(&adult(), &fields(12), &ValidatorSet::new()) {
            Evaluation::Unmatched(record) => {
                assert_eq!(record.candidate, "Adult");
                assert_eq!(record.reason, UnmatchReason::ConstructorFailure);
                assert_eq!(
                    record.failure,
                    CandidateFailure::Constructor {
                        message: "age 12 is below 18".into()
                    }
                );
            }
            other => panic!("expected unmatch, got {:?}", other),
        }
    }

    #[test]
    fn test_validation_failure_skips_construction() {
        let validators = ValidatorSet::new()
            .with_rule(FieldRule::new("age").range(Some(0.0), Some(150.0)))
            .unwrap();

        match evaluate(&adult(), &fields(-4), &validators) {
            Evaluation::Unmatched(record) => {
                assert_eq!(record.reason, UnmatchReason::ValidationFailure);
                assert!(record.failure.validation().is_some());
                assert_eq!(record.validations.len(), 1);
                assert_eq!(record.validations[0].candidate, "Adult");
            }
            other => panic!("expected unmatch, got {:?}", other),
        }
    }

    #[test]
    fn test_undeclared_field_rejected() {
        let leaky = StageDescriptor::new(|args| {
            Ok(Leaky {
                age: args.data("age")?,
                secret: "hidden".into(),
            })
        })
        .carry("age", FieldKind::Integer);

        let evaluator = CandidateEvaluator::new(ArgumentResolver::new(&NoValidation, &NoServices));
        match evaluator.evaluate(&leaky, &fields(30)) {
            Evaluation::Unmatched(record) => {
                assert_eq!(record.reason, UnmatchReason::ConstructorFailure);
                assert_eq!(record.to_string(), "Leaky [ConstructorFailure]: construction failed: undeclared field secret");
            }
            other => panic!("expected unmatch, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_carried_field_rejected() {
        let forgetful = StageDescriptor::new(|args| Ok(Forgetful { name: args.text("name")? }))
            .carry("name", FieldKind::String)
            .carry("age", FieldKind::Integer);
        let source = json!({ "name": "Ana", "age": 30 }).as_object().cloned().unwrap();

        let evaluator = CandidateEvaluator::new(ArgumentResolver::new(&NoValidation, &NoServices));
        match evaluator.evaluate(&forgetful, &source) {
            Evaluation::Unmatched(record) => {
                assert_eq!(record.reason, UnmatchReason::ConstructorFailure);
                assert_eq!(
                    record.failure,
                    CandidateFailure::Constructor {
                        message: "carried field age missing from snapshot".into()
                    }
                );
            }
            other => panic!("expected unmatch, got {:?}", other),
        }
    }

    #[test]
    fn test_failure_display() {
        let mismatch = CandidateFailure::TypeMismatch {
            parameter: "email".into(),
            expected: FieldKind::String,
            found: None,
        };
        assert_eq!(mismatch.to_string(), "email is not a field of the source stage");
        assert_eq!(mismatch.reason(), UnmatchReason::TypeMismatch);
    }
}
