//! Run-level errors
use thiserror::Error;

use crate::evaluator::UnmatchRecord;
use crate::journal::SemanticLog;
use crate::registry::ConfigurationError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetamorphError {
    /// Every candidate of a branching declaration was rejected
    #[error("BECOME/NO_MATCH: no candidate for {source_stage} could be constructed ({})", summary(.unmatched))]
    NoMatchingBecoming {
        source_stage: String,
        unmatched: Vec<UnmatchRecord>,
    },

    /// The sole candidate of a linear declaration was rejected
    #[error("BECOME/FAILED: {source_stage} could not become {}", summary(.unmatched))]
    BecomingFailed {
        source_stage: String,
        unmatched: Vec<UnmatchRecord>,
    },

    #[error("CONFIG/MISCONFIGURED: {0}")]
    Misconfigured(#[from] ConfigurationError),

    #[error("RUN/STEP_LIMIT: run exceeded {limit} steps")]
    StepLimitExceeded { limit: usize },

    #[error("RUN/SNAPSHOT: {stage}: {message}")]
    Snapshot { stage: String, message: String },
}

impl MetamorphError {
    /// Per-candidate records, empty for errors not produced by a branch
    pub fn unmatched(&self) -> &[UnmatchRecord] {
        match self {
            MetamorphError::NoMatchingBecoming { unmatched, .. } | MetamorphError::BecomingFailed { unmatched, .. } => {
                unmatched
            }
            _ => &[],
        }
    }

    pub fn is_misconfiguration(&self) -> bool {
        matches!(self, MetamorphError::Misconfigured(_))
    }
}

fn summary(unmatched: &[UnmatchRecord]) -> String {
    unmatched
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A failed run: the error plus the log up to the failing step
#[derive(Debug, Clone, Error)]
#[error("{error}")]
pub struct RunFailure {
    pub error: MetamorphError,
    pub log: SemanticLog,
}

impl RunFailure {
    pub fn new(error: MetamorphError, log: SemanticLog) -> Self {
        Self { error, log }
    }
}

pub type Result<T> = std::result::Result<T, RunFailure>;
