//! Semantic Log: ordered audit trail of every transformation step in a run
//!
//! Answers "why did my object become X and not Y": for each step it keeps
//! the provenance of every argument, every validator that ran, and every
//! candidate that was rejected before the winner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::descriptor::ProvenanceKind;
use crate::evaluator::UnmatchRecord;
use metamorph_validate::Outcome;

/// Which validator layer produced an outcome
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "tag", rename_all = "snake_case")]
pub enum ValidatorScope {
    /// The name-implied validator for the field
    Base,
    /// A refinement selected by a semantic tag
    Tagged(String),
}

impl fmt::Display for ValidatorScope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValidatorScope::Base => write!(f, "base"),
            ValidatorScope::Tagged(tag) => write!(f, "#{}", tag),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationTrace {
    /// Candidate whose parameter was validated
    pub candidate: String,
    pub parameter: String,
    pub scope: ValidatorScope,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentTrace {
    pub name: String,
    pub provenance: ProvenanceKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Service type for externally supplied arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

/// One completed transformation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// Zero-based position in the run
    pub index: usize,
    pub source: String,
    pub target: String,
    pub arguments: Vec<ArgumentTrace>,
    /// Validator outcomes for `target` only; rejected candidates carry their own
    pub validations: Vec<ValidationTrace>,
    /// Candidates tried and rejected before `target`, in declared order
    #[serde(default)]
    pub rejected: Vec<UnmatchRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_hash: Option<String>,
    pub started_at: DateTime<Utc>,
    pub elapsed_micros: u64,
}

impl StepRecord {
    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.elapsed_micros)
    }

    pub fn argument(&self, name: &str) -> Option<&ArgumentTrace> {
        self.arguments.iter().find(|a| a.name == name)
    }

    /// Same step ignoring wall-clock fields
    pub fn same_path_as(&self, other: &StepRecord) -> bool {
        self.index == other.index
            && self.source == other.source
            && self.target == other.target
            && self.arguments == other.arguments
            && self.validations == other.validations
            && self.rejected == other.rejected
            && self.in_hash == other.in_hash
            && self.out_hash == other.out_hash
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Terminal,
    Failed,
}

/// Append-only log of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticLog {
    pub run_id: Uuid,
    pub initial: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, Value>,
    steps: Vec<StepRecord>,
}

impl SemanticLog {
    pub fn new(run_id: Uuid, initial: impl Into<String>) -> Self {
        Self {
            run_id,
            initial: initial.into(),
            started_at: Utc::now(),
            finished_at: None,
            status: RunStatus::Running,
            labels: BTreeMap::new(),
            steps: Vec::new(),
        }
    }

    pub(crate) fn append(&mut self, step: StepRecord) {
        self.steps.push(step);
    }

    pub(crate) fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Stage names from the initial stage to the last one reached
    pub fn path(&self) -> Vec<&str> {
        std::iter::once(self.initial.as_str())
            .chain(self.steps.iter().map(|s| s.target.as_str()))
            .collect()
    }

    /// Name of the last stage reached
    pub fn final_stage(&self) -> &str {
        self.steps
            .last()
            .map(|s| s.target.as_str())
            .unwrap_or(self.initial.as_str())
    }

    /// The step that produced `target`
    pub fn step_into(&self, target: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.target == target)
    }

    /// Validator outcomes for a parameter of each stage the run became
    pub fn validations_for(&self, parameter: &str) -> Vec<&ValidationTrace> {
        self.steps
            .iter()
            .flat_map(|s| s.validations.iter())
            .filter(|v| v.parameter == parameter)
            .collect()
    }

    /// Every rejected candidate, across all steps
    pub fn rejections(&self) -> Vec<&UnmatchRecord> {
        self.steps.iter().flat_map(|s| s.rejected.iter()).collect()
    }

    /// Time spent resolving and constructing, summed over steps
    pub fn total_elapsed(&self) -> Duration {
        self.steps.iter().map(StepRecord::elapsed).sum()
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Terminal
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Same sequence of steps ignoring wall-clock fields and run identity
    pub fn same_path_as(&self, other: &SemanticLog) -> bool {
        self.initial == other.initial
            && self.status == other.status
            && self.steps.len() == other.steps.len()
            && self
                .steps
                .iter()
                .zip(other.steps.iter())
                .all(|(a, b)| a.same_path_as(b))
    }
}
