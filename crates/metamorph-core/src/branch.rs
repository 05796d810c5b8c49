//! Branch Resolver
//!
//! Tries candidates strictly in declared order. The first candidate whose
//! arguments resolve and whose constructor succeeds wins; nothing is scored.

use std::sync::Arc;

use crate::descriptor::StageDescriptor;
use crate::evaluator::{CandidateEvaluator, Constructed, Evaluation, UnmatchRecord};
use crate::journal::ValidationTrace;
use crate::stage::Fields;

#[derive(Debug)]
pub struct Chosen {
    pub constructed: Constructed,
    pub descriptor: Arc<StageDescriptor>,
    /// Candidates rejected before the winner, in declared order
    pub rejected: Vec<UnmatchRecord>,
    /// Validator outcomes for the winner alone
    pub validations: Vec<ValidationTrace>,
}

#[derive(Debug)]
pub enum Branch {
    Chosen(Chosen),
    /// One record per candidate, in declared order
    Exhausted { unmatched: Vec<UnmatchRecord> },
}

#[derive(Clone, Copy)]
pub struct BranchResolver<'a> {
    evaluator: CandidateEvaluator<'a>,
}

impl<'a> BranchResolver<'a> {
    pub fn new(evaluator: CandidateEvaluator<'a>) -> Self {
        Self { evaluator }
    }

    pub fn resolve(&self, candidates: &[Arc<StageDescriptor>], source: &Fields) -> Branch {
        let mut rejected = Vec::new();

        for candidate in candidates {
            match self.evaluator.evaluate(candidate, source) {
                Evaluation::Constructed(constructed) => {
                    tracing::debug!(candidate = candidate.name(), "candidate constructed");
                    let validations = constructed.resolution.validations.clone();
                    return Branch::Chosen(Chosen {
                        constructed,
                        descriptor: Arc::clone(candidate),
                        rejected,
                        validations,
                    });
                }
                Evaluation::Unmatched(record) => {
                    tracing::debug!(
                        candidate = candidate.name(),
                        reason = %record.reason,
                        "candidate rejected: {}",
                        record.failure
                    );
                    rejected.push(record);
                }
            }
        }

        Branch::Exhausted { unmatched: rejected }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::UnmatchReason;
    use crate::inject::NoServices;
    use crate::resolver::ArgumentResolver;
    use crate::stage::FieldKind;
    use metamorph_validate::NoValidation;
    use serde::Serialize;
    use serde_json::json;

    #[derive(Debug, Serialize)]
    struct First {
        n: i64,
    }

    #[derive(Debug, Serialize)]
    struct Second {
        n: i64,
    }

    #[derive(Debug, Serialize)]
    struct NeedsEmail {
        email: String,
    }

    fn first() -> Arc<StageDescriptor> {
        Arc::new(StageDescriptor::new(|args| Ok(First { n: args.data("n")? })).carry("n", FieldKind::Integer))
    }

    fn second() -> Arc<StageDescriptor> {
        Arc::new(StageDescriptor::new(|args| Ok(Second { n: args.data("n")? })).carry("n", FieldKind::Integer))
    }

    fn needs_email() -> Arc<StageDescriptor> {
        Arc::new(
            StageDescriptor::new(|args| Ok(NeedsEmail { email: args.text("email")? })).carry("email", FieldKind::String),
        )
    }

    fn branch(candidates: &[Arc<StageDescriptor>]) -> Branch {
        let source = json!({ "n": 1 }).as_object().cloned().unwrap();
        let resolver = BranchResolver::new(CandidateEvaluator::new(ArgumentResolver::new(&NoValidation, &NoServices)));
        resolver.resolve(candidates, &source)
    }

    #[test]
    fn test_first_success_wins() {
        match branch(&[first(), second()]) {
            Branch::Chosen(chosen) => {
                assert_eq!(chosen.descriptor.name(), "First");
                assert!(chosen.rejected.is_empty());
            }
            other => panic!("expected a choice, got {:?}", other),
        }

        match branch(&[second(), first()]) {
            Branch::Chosen(chosen) => assert_eq!(chosen.descriptor.name(), "Second"),
            other => panic!("expected a choice, got {:?}", other),
        }
    }

    #[test]
    fn test_rejected_before_winner_are_kept() {
        match branch(&[needs_email(), second()]) {
            Branch::Chosen(chosen) => {
                assert_eq!(chosen.descriptor.name(), "Second");
                assert_eq!(chosen.rejected.len(), 1);
                assert_eq!(chosen.rejected[0].candidate, "NeedsEmail");
                assert_eq!(chosen.rejected[0].reason, UnmatchReason::TypeMismatch);
            }
            other => panic!("expected a choice, got {:?}", other),
        }
    }

    #[test]
    fn test_exhausted_reports_every_candidate() {
        match branch(&[needs_email(), needs_email()]) {
            Branch::Exhausted { unmatched } => {
                assert_eq!(unmatched.len(), 2);
                assert!(unmatched.iter().all(|u| u.reason == UnmatchReason::TypeMismatch));
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }

    #[test]
    fn test_winner_validations_exclude_rejected_candidates() {
        use metamorph_validate::{FieldRule, ValidatorSet};

        let validators = ValidatorSet::new()
            .with_rule(FieldRule::new("n").range(Some(0.0), None))
            .unwrap()
            .with_rule(FieldRule::tagged("n", "big").range(Some(10.0), None))
            .unwrap();
        let big = Arc::new(
            StageDescriptor::new(|args| Ok(First { n: args.data("n")? })).carry_tagged("n", FieldKind::Integer, &["big"]),
        );
        let source = json!({ "n": 1 }).as_object().cloned().unwrap();
        let resolver = BranchResolver::new(CandidateEvaluator::new(ArgumentResolver::new(&validators, &NoServices)));

        match resolver.resolve(&[big, second()], &source) {
            Branch::Chosen(chosen) => {
                assert_eq!(chosen.descriptor.name(), "Second");
                assert_eq!(chosen.validations.len(), 1);
                assert_eq!(chosen.validations[0].candidate, "Second");
                assert!(chosen.validations[0].outcome.is_accepted());

                let lost = &chosen.rejected[0];
                assert_eq!(lost.candidate, "First");
                assert_eq!(lost.validations.len(), 2);
                assert!(lost.validations.iter().all(|v| v.candidate == "First"));
                assert!(lost.validations[1].outcome.is_rejected());
            }
            other => panic!("expected a choice, got {:?}", other),
        }
    }
}
