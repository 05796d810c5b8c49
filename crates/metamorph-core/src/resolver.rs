//! Argument Resolver
//!
//! Builds the argument set for one candidate from the source stage's
//! snapshot and the dependency resolver, running validators on the way.
//! Never touches the source stage.

use crate::arguments::{ArgumentValue, Arguments, ResolvedArgument};
use crate::descriptor::{ParamDescriptor, Provenance, ProvenanceKind, StageDescriptor};
use crate::evaluator::CandidateFailure;
use crate::inject::DependencyResolver;
use crate::journal::{ArgumentTrace, ValidationTrace, ValidatorScope};
use crate::stage::{FieldKind, Fields};
use metamorph_validate::{Outcome, ValidatorCatalog};
use serde_json::Value;

/// A successfully resolved argument set and what it took to get there
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub arguments: Arguments,
    pub validations: Vec<ValidationTrace>,
}

impl Resolution {
    pub fn argument_traces(&self) -> Vec<ArgumentTrace> {
        self.arguments
            .iter()
            .map(|a| ArgumentTrace {
                name: a.name.clone(),
                provenance: a.provenance,
                tags: a.tags.clone(),
                service: a.service.clone(),
            })
            .collect()
    }
}

/// Why resolution stopped, plus the validator outcomes recorded before it did
#[derive(Debug, Clone)]
pub struct ResolutionFailure {
    pub failure: CandidateFailure,
    pub validations: Vec<ValidationTrace>,
}

#[derive(Clone, Copy)]
pub struct ArgumentResolver<'a> {
    validators: &'a dyn ValidatorCatalog,
    dependencies: &'a dyn DependencyResolver,
}

impl<'a> ArgumentResolver<'a> {
    pub fn new(validators: &'a dyn ValidatorCatalog, dependencies: &'a dyn DependencyResolver) -> Self {
        Self {
            validators,
            dependencies,
        }
    }

    /// Resolve every parameter of `target` in declared order; the first
    /// failure short-circuits.
    pub fn resolve(&self, target: &StageDescriptor, source: &Fields) -> Result<Resolution, ResolutionFailure> {
        let mut resolution = Resolution::default();

        for param in target.params() {
            let (value, service) = match &param.provenance {
                Some(Provenance::CarriedForward(kind)) => {
                    match self.carry(target.name(), param, *kind, source, &mut resolution.validations) {
                        Ok(value) => (ArgumentValue::Data(value), None),
                        Err(failure) => {
                            return Err(ResolutionFailure {
                                failure,
                                validations: resolution.validations,
                            })
                        }
                    }
                }
                Some(Provenance::ExternallySupplied { service, binding }) => {
                    match self.dependencies.resolve(service, binding.as_deref()) {
                        Ok(handle) => (ArgumentValue::Service(handle), Some(service.name())),
                        Err(e) => {
                            return Err(ResolutionFailure {
                                failure: CandidateFailure::Unresolved {
                                    parameter: param.name.clone(),
                                    service: service.name(),
                                    binding: binding.clone(),
                                    message: e.to_string(),
                                },
                                validations: resolution.validations,
                            })
                        }
                    }
                }
                None => {
                    return Err(ResolutionFailure {
                        failure: CandidateFailure::Constructor {
                            message: format!("{}.{} has no provenance tag", target.name(), param.name),
                        },
                        validations: resolution.validations,
                    })
                }
            };

            let provenance = match service {
                Some(_) => ProvenanceKind::ExternallySupplied,
                None => ProvenanceKind::CarriedForward,
            };
            resolution.arguments.push(ResolvedArgument {
                name: param.name.clone(),
                provenance,
                tags: param.tags.clone(),
                service,
                value,
            });
        }

        Ok(resolution)
    }

    fn carry(
        &self,
        candidate: &str,
        param: &ParamDescriptor,
        kind: FieldKind,
        source: &Fields,
        validations: &mut Vec<ValidationTrace>,
    ) -> Result<Value, CandidateFailure> {
        let value = match source.get(&param.name) {
            Some(value) if kind.accepts(value) => value,
            found => {
                return Err(CandidateFailure::TypeMismatch {
                    parameter: param.name.clone(),
                    expected: kind,
                    found: found.map(|v| FieldKind::describe(v).to_string()),
                })
            }
        };

        // Base layer first, then one refinement per tag; both must pass
        let base = self.validators.validate(&param.name, value);
        self.record(candidate, param, ValidatorScope::Base, base, validations)?;

        for tag in &param.tags {
            let refined = self.validators.validate_tagged(&param.name, tag, value);
            self.record(candidate, param, ValidatorScope::Tagged(tag.clone()), refined, validations)?;
        }

        Ok(value.clone())
    }

    fn record(
        &self,
        candidate: &str,
        param: &ParamDescriptor,
        scope: ValidatorScope,
        outcome: Option<Outcome>,
        validations: &mut Vec<ValidationTrace>,
    ) -> Result<(), CandidateFailure> {
        let Some(outcome) = outcome else {
            return Ok(());
        };
        validations.push(ValidationTrace {
            candidate: candidate.to_string(),
            parameter: param.name.clone(),
            scope: scope.clone(),
            outcome: outcome.clone(),
        });
        match outcome.into_failure() {
            Some(failure) => Err(CandidateFailure::Validation {
                parameter: param.name.clone(),
                scope,
                failure,
            }),
            None => Ok(()),
        }
    }
}
