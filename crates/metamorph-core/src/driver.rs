//! Metamorphosis Driver
//!
//! Sequential state machine over stages: `Active` until a terminal stage is
//! reached or a becoming fails. Each successful becoming appends one
//! [`StepRecord`] to the run's [`SemanticLog`].

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use crate::branch::{Branch, BranchResolver};
use crate::config::EngineConfig;
use crate::context::RunContext;
use crate::descriptor::{Becoming, StageDescriptor};
use crate::error::{MetamorphError, RunFailure};
use crate::journal::{RunStatus, SemanticLog, StepRecord};
use crate::registry::{Catalog, ConfigurationError};
use crate::stage::{Fields, Stage};

/// A run that reached a terminal stage
#[derive(Debug)]
pub struct Finished {
    pub stage: Box<dyn Stage>,
    pub snapshot: Fields,
    pub log: SemanticLog,
}

enum State {
    Active {
        stage: Box<dyn Stage>,
        snapshot: Fields,
        descriptor: Arc<StageDescriptor>,
    },
    Terminal {
        stage: Box<dyn Stage>,
        snapshot: Fields,
    },
    Failed(MetamorphError),
}

pub struct Driver<'a> {
    catalog: &'a Catalog,
    branches: BranchResolver<'a>,
    config: &'a EngineConfig,
}

impl<'a> Driver<'a> {
    pub fn new(catalog: &'a Catalog, branches: BranchResolver<'a>, config: &'a EngineConfig) -> Self {
        Self {
            catalog,
            branches,
            config,
        }
    }

    pub fn drive(&self, initial: Box<dyn Stage>, ctx: RunContext) -> Result<Finished, RunFailure> {
        let initial_type = initial.stage_type();
        let descriptor = self.catalog.descriptor(&initial_type).cloned();
        let initial_name = descriptor
            .as_ref()
            .map(|d| d.name().to_string())
            .unwrap_or_else(|| initial_type.name());

        let mut log = SemanticLog::new(ctx.run_id, initial_name.clone());
        log.labels = ctx.labels.into_iter().collect();

        let span = tracing::info_span!("metamorphosis", run_id = %log.run_id, initial = %initial_name);
        let _enter = span.enter();

        let mut state = match descriptor {
            None => State::Failed(ConfigurationError::UnregisteredStage { stage: initial_name }.into()),
            Some(descriptor) => match observe(&initial_name, initial.as_ref()) {
                Ok(snapshot) => State::Active {
                    stage: initial,
                    snapshot,
                    descriptor,
                },
                Err(e) => State::Failed(e),
            },
        };

        loop {
            state = match state {
                State::Active {
                    stage,
                    snapshot,
                    descriptor,
                } => self.advance(stage, snapshot, &descriptor, &mut log),
                State::Terminal { stage, snapshot } => {
                    log.finish(RunStatus::Terminal);
                    tracing::info!(steps = log.len(), final_stage = log.final_stage(), "metamorphosis complete");
                    return Ok(Finished { stage, snapshot, log });
                }
                State::Failed(error) => {
                    log.finish(RunStatus::Failed);
                    tracing::warn!(steps = log.len(), error = %error, "metamorphosis failed");
                    return Err(RunFailure::new(error, log));
                }
            };
        }
    }

    fn advance(
        &self,
        stage: Box<dyn Stage>,
        snapshot: Fields,
        descriptor: &StageDescriptor,
        log: &mut SemanticLog,
    ) -> State {
        if descriptor.becoming().is_terminal() {
            return State::Terminal { stage, snapshot };
        }
        if let Some(limit) = self.config.max_steps {
            if log.len() >= limit {
                return State::Failed(MetamorphError::StepLimitExceeded { limit });
            }
        }
        let Some(candidates) = self.catalog.candidates(&descriptor.stage_type()) else {
            return State::Failed(
                ConfigurationError::UnregisteredStage {
                    stage: descriptor.name().to_string(),
                }
                .into(),
            );
        };

        let span = tracing::debug_span!("becoming", source = descriptor.name(), candidates = candidates.len());
        let _enter = span.enter();

        let started_at = Utc::now();
        let clock = Instant::now();

        match self.branches.resolve(candidates, &snapshot) {
            Branch::Chosen(chosen) => {
                let elapsed_micros = u64::try_from(clock.elapsed().as_micros()).unwrap_or(u64::MAX);
                let constructed = chosen.constructed;
                tracing::info!(target_stage = chosen.descriptor.name(), rejected = chosen.rejected.len(), "became");

                log.append(StepRecord {
                    index: log.len(),
                    source: descriptor.name().to_string(),
                    target: chosen.descriptor.name().to_string(),
                    arguments: constructed.resolution.argument_traces(),
                    validations: chosen.validations,
                    rejected: chosen.rejected,
                    in_hash: self.digest(&snapshot),
                    out_hash: self.digest(&constructed.snapshot),
                    started_at,
                    elapsed_micros,
                });

                State::Active {
                    stage: constructed.stage,
                    snapshot: constructed.snapshot,
                    descriptor: chosen.descriptor,
                }
            }
            Branch::Exhausted { unmatched } => {
                let source_stage = descriptor.name().to_string();
                tracing::warn!(source = %source_stage, candidates = unmatched.len(), "every candidate rejected");
                State::Failed(match descriptor.becoming() {
                    Becoming::AnyOf(_) => MetamorphError::NoMatchingBecoming {
                        source_stage,
                        unmatched,
                    },
                    _ => MetamorphError::BecomingFailed {
                        source_stage,
                        unmatched,
                    },
                })
            }
        }
    }

    fn digest(&self, snapshot: &Fields) -> Option<String> {
        if !self.config.hash_snapshots {
            return None;
        }
        snapshot_digest(snapshot)
    }
}

/// `blake3:` digest of a snapshot's JSON encoding
pub fn snapshot_digest(snapshot: &Fields) -> Option<String> {
    let bytes = serde_json::to_vec(snapshot).ok()?;
    Some(format!("blake3:{}", blake3::hash(&bytes).to_hex()))
}

fn observe(name: &str, stage: &dyn Stage) -> Result<Fields, MetamorphError> {
    match stage.snapshot() {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(MetamorphError::Snapshot {
            stage: name.to_string(),
            message: "snapshot is not a record".to_string(),
        }),
        Err(e) => Err(MetamorphError::Snapshot {
            stage: name.to_string(),
            message: e.to_string(),
        }),
    }
}
