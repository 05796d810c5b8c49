//! Stage registry and sealed catalog
//!
//! Descriptors are collected in a [`Registry`] and checked once by
//! [`Registry::seal`]. The resulting [`Catalog`] is read-only; the only
//! state it fills in afterwards is each type's resolved candidate list,
//! initialised once on first use.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

use crate::descriptor::{Becoming, StageDescriptor};
use crate::stage::StageType;

/// Misconfigured transformation graph
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigurationError {
    #[error("{stage} declares an empty candidate list")]
    EmptyCandidates { stage: String },

    #[error("{stage}.{parameter} has no provenance tag")]
    MissingProvenance { stage: String, parameter: String },

    #[error("{stage} declares parameter {parameter} twice")]
    DuplicateParameter { stage: String, parameter: String },

    #[error("{stage} is registered twice")]
    DuplicateStage { stage: String },

    #[error("{stage} lists {candidate} more than once")]
    DuplicateCandidate { stage: String, candidate: String },

    #[error("{stage} can become {candidate}, which is not registered")]
    UnknownCandidate { stage: String, candidate: String },

    #[error("{stage} can become {candidate}, which has no constructor")]
    NotConstructible { stage: String, candidate: String },

    #[error("transformation cycle: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("{stage} is not registered")]
    UnregisteredStage { stage: String },
}

/// Collects stage descriptors before sealing
#[derive(Debug, Default)]
pub struct Registry {
    descriptors: Vec<StageDescriptor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, descriptor: StageDescriptor) -> Self {
        self.add(descriptor);
        self
    }

    pub fn add(&mut self, descriptor: StageDescriptor) {
        self.descriptors.push(descriptor);
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Check the whole graph and freeze it
    pub fn seal(self) -> Result<Catalog, ConfigurationError> {
        let mut entries: HashMap<TypeId, CatalogEntry> = HashMap::new();
        let mut order = Vec::with_capacity(self.descriptors.len());

        for descriptor in self.descriptors {
            check_params(&descriptor)?;
            let id = descriptor.stage_type().id();
            if entries.contains_key(&id) {
                return Err(ConfigurationError::DuplicateStage {
                    stage: descriptor.name().to_string(),
                });
            }
            order.push(id);
            entries.insert(
                id,
                CatalogEntry {
                    descriptor: Arc::new(descriptor),
                    candidates: OnceCell::new(),
                },
            );
        }

        let catalog = Catalog { entries, order };
        for id in &catalog.order {
            if let Some(entry) = catalog.entries.get(id) {
                catalog.check_becoming(&entry.descriptor)?;
            }
        }
        catalog.check_acyclic()?;

        tracing::debug!(stages = catalog.len(), "stage catalog sealed");
        Ok(catalog)
    }
}

fn check_params(descriptor: &StageDescriptor) -> Result<(), ConfigurationError> {
    let mut seen = HashSet::new();
    for param in descriptor.params() {
        if param.provenance.is_none() {
            return Err(ConfigurationError::MissingProvenance {
                stage: descriptor.name().to_string(),
                parameter: param.name.clone(),
            });
        }
        if !seen.insert(param.name.as_str()) {
            return Err(ConfigurationError::DuplicateParameter {
                stage: descriptor.name().to_string(),
                parameter: param.name.clone(),
            });
        }
    }
    Ok(())
}

struct CatalogEntry {
    descriptor: Arc<StageDescriptor>,
    candidates: OnceCell<Vec<Arc<StageDescriptor>>>,
}

/// Sealed, read-only stage metadata
pub struct Catalog {
    entries: HashMap<TypeId, CatalogEntry>,
    order: Vec<TypeId>,
}

impl Catalog {
    pub fn descriptor(&self, stage: &StageType) -> Option<&Arc<StageDescriptor>> {
        self.entries.get(&stage.id()).map(|e| &e.descriptor)
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub fn becoming(&self, stage: &StageType) -> Option<&Becoming> {
        self.descriptor(stage).map(|d| d.becoming())
    }

    /// Candidate descriptors in declared order; empty for terminal stages
    pub fn candidates(&self, stage: &StageType) -> Option<&[Arc<StageDescriptor>]> {
        let entry = self.entries.get(&stage.id())?;
        let resolved = entry.candidates.get_or_init(|| {
            entry
                .descriptor
                .becoming()
                .candidates()
                .iter()
                .filter_map(|candidate| self.descriptor(candidate).cloned())
                .collect()
        });
        Some(resolved.as_slice())
    }

    /// Longest number of steps from `stage` to a terminal stage
    pub fn depth_from(&self, stage: &StageType) -> Option<usize> {
        self.depth_memo(stage, &mut HashMap::new())
    }

    // Successors are shared across branches, so each stage is measured once
    fn depth_memo(&self, stage: &StageType, memo: &mut HashMap<TypeId, usize>) -> Option<usize> {
        if let Some(depth) = memo.get(&stage.id()) {
            return Some(*depth);
        }
        let descriptor = self.descriptor(stage)?;
        let depth = descriptor
            .becoming()
            .candidates()
            .iter()
            .filter_map(|candidate| self.depth_memo(candidate, memo))
            .map(|depth| depth + 1)
            .max()
            .unwrap_or(0);
        memo.insert(stage.id(), depth);
        Some(depth)
    }

    /// Names of terminal stages, in registration order
    pub fn terminals(&self) -> Vec<&str> {
        self.descriptors()
            .filter(|d| d.becoming().is_terminal())
            .map(|d| d.name())
            .collect()
    }

    /// Names of all stages, in registration order
    pub fn stage_names(&self) -> Vec<&str> {
        self.descriptors().map(|d| d.name()).collect()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &StageDescriptor> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|e| e.descriptor.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn name_of(&self, stage: &StageType) -> String {
        self.descriptor(stage)
            .map(|d| d.name().to_string())
            .unwrap_or_else(|| stage.name())
    }

    fn check_becoming(&self, descriptor: &StageDescriptor) -> Result<(), ConfigurationError> {
        let stage = descriptor.name().to_string();
        if let Becoming::AnyOf(candidates) = descriptor.becoming() {
            if candidates.is_empty() {
                return Err(ConfigurationError::EmptyCandidates { stage });
            }
        }

        let mut seen = HashSet::new();
        for candidate in descriptor.becoming().candidates() {
            if !seen.insert(candidate.id()) {
                return Err(ConfigurationError::DuplicateCandidate {
                    stage,
                    candidate: self.name_of(candidate),
                });
            }
            match self.descriptor(candidate) {
                None => {
                    return Err(ConfigurationError::UnknownCandidate {
                        stage,
                        candidate: candidate.name(),
                    })
                }
                Some(target) if !target.is_constructible() => {
                    return Err(ConfigurationError::NotConstructible {
                        stage,
                        candidate: target.name().to_string(),
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn check_acyclic(&self) -> Result<(), ConfigurationError> {
        let mut done: HashSet<TypeId> = HashSet::new();
        for id in &self.order {
            let mut path = Vec::new();
            self.visit(*id, &mut path, &mut done)?;
        }
        Ok(())
    }

    fn visit(&self, id: TypeId, path: &mut Vec<TypeId>, done: &mut HashSet<TypeId>) -> Result<(), ConfigurationError> {
        if done.contains(&id) {
            return Ok(());
        }
        if let Some(start) = path.iter().position(|p| *p == id) {
            let mut cycle: Vec<String> = path[start..].iter().map(|p| self.name_by_id(*p)).collect();
            cycle.push(self.name_by_id(id));
            return Err(ConfigurationError::Cycle { path: cycle });
        }
        let Some(entry) = self.entries.get(&id) else {
            return Ok(());
        };

        path.push(id);
        for candidate in entry.descriptor.becoming().candidates() {
            self.visit(candidate.id(), path, done)?;
        }
        path.pop();
        done.insert(id);
        Ok(())
    }

    fn name_by_id(&self, id: TypeId) -> String {
        self.entries
            .get(&id)
            .map(|e| e.descriptor.name().to_string())
            .unwrap_or_else(|| "?".to_string())
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("stages", &self.stage_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ParamDescriptor;
    use crate::stage::FieldKind;
    use serde::Serialize;

    #[derive(Debug, Serialize)]
    struct A {
        x: i64,
    }

    #[derive(Debug, Serialize)]
    struct B {
        x: i64,
    }

    #[derive(Debug, Serialize)]
    struct C {
        x: i64,
    }

    fn a() -> StageDescriptor {
        StageDescriptor::new(|args| Ok(A { x: args.data("x")? })).carry("x", FieldKind::Integer)
    }

    fn b() -> StageDescriptor {
        StageDescriptor::new(|args| Ok(B { x: args.data("x")? })).carry("x", FieldKind::Integer)
    }

    fn c() -> StageDescriptor {
        StageDescriptor::new(|args| Ok(C { x: args.data("x")? })).carry("x", FieldKind::Integer)
    }

    #[test]
    fn test_seal_valid_graph() {
        let catalog = Registry::new()
            .register(a().becomes_any_of([StageType::of::<B>(), StageType::of::<C>()]))
            .register(b().becomes::<C>())
            .register(c())
            .seal()
            .unwrap();

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.stage_names(), vec!["A", "B", "C"]);
        assert_eq!(catalog.terminals(), vec!["C"]);
        assert_eq!(catalog.depth_from(&StageType::of::<A>()), Some(2));
        assert_eq!(catalog.depth_from(&StageType::of::<C>()), Some(0));

        let candidates = catalog.candidates(&StageType::of::<A>()).unwrap();
        let names: Vec<_> = candidates.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["B", "C"]);
        assert!(catalog.candidates(&StageType::of::<C>()).unwrap().is_empty());
    }

    #[test]
    fn test_candidate_cache_is_stable() {
        let catalog = Registry::new()
            .register(a().becomes_any_of([StageType::of::<C>(), StageType::of::<B>()]))
            .register(b())
            .register(c())
            .seal()
            .unwrap();

        let first = catalog.candidates(&StageType::of::<A>()).unwrap().as_ptr();
        let second = catalog.candidates(&StageType::of::<A>()).unwrap().as_ptr();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_candidates_rejected() {
        let err = Registry::new()
            .register(a().becomes_any_of(Vec::new()))
            .seal()
            .unwrap_err();
        assert_eq!(err, ConfigurationError::EmptyCandidates { stage: "A".into() });
    }

    #[test]
    fn test_missing_provenance_rejected() {
        let err = Registry::new()
            .register(a().param(ParamDescriptor::new("mystery")))
            .seal()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::MissingProvenance {
                stage: "A".into(),
                parameter: "mystery".into(),
            }
        );
    }

    #[test]
    fn test_duplicate_parameter_rejected() {
        let err = Registry::new()
            .register(a().carry("x", FieldKind::Integer))
            .seal()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateParameter { .. }));
    }

    #[test]
    fn test_duplicate_stage_rejected() {
        let err = Registry::new().register(a()).register(a()).seal().unwrap_err();
        assert_eq!(err, ConfigurationError::DuplicateStage { stage: "A".into() });
    }

    #[test]
    fn test_duplicate_candidate_rejected() {
        let err = Registry::new()
            .register(a().becomes_any_of([StageType::of::<B>(), StageType::of::<C>(), StageType::of::<B>()]))
            .register(b())
            .register(c())
            .seal()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::DuplicateCandidate {
                stage: "A".into(),
                candidate: "B".into(),
            }
        );
        assert_eq!(err.to_string(), "A lists B more than once");
    }

    #[test]
    fn test_unknown_candidate_rejected() {
        let err = Registry::new().register(a().becomes::<B>()).seal().unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::UnknownCandidate {
                stage: "A".into(),
                candidate: "B".into(),
            }
        );
    }

    #[test]
    fn test_initial_only_stage_cannot_be_a_candidate() {
        let err = Registry::new()
            .register(a().becomes::<B>())
            .register(StageDescriptor::initial::<B>())
            .seal()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::NotConstructible { .. }));
    }

    #[test]
    fn test_cycle_rejected_with_path() {
        let err = Registry::new()
            .register(a().becomes::<B>())
            .register(b().becomes::<C>())
            .register(c().becomes::<A>())
            .seal()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::Cycle {
                path: vec!["A".into(), "B".into(), "C".into(), "A".into()],
            }
        );
        assert_eq!(err.to_string(), "transformation cycle: A -> B -> C -> A");
    }

    #[test]
    fn test_self_loop_rejected() {
        let err = Registry::new()
            .register(a().becomes_any_of([StageType::of::<B>(), StageType::of::<A>()]))
            .register(b())
            .seal()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::Cycle {
                path: vec!["A".into(), "A".into()],
            }
        );
    }

    macro_rules! rungs {
        ($($l:ident $r:ident),*) => {
            $(
                #[derive(Debug, Serialize)]
                struct $l {
                    x: i64,
                }

                #[derive(Debug, Serialize)]
                struct $r {
                    x: i64,
                }
            )*
        };
    }

    // Every stage of a layer can become either stage of the next one
    macro_rules! ladder {
        ($registry:expr; $l:ident $r:ident) => {
            $registry
                .register(StageDescriptor::new(|args| Ok($l { x: args.data("x")? })).carry("x", FieldKind::Integer))
                .register(StageDescriptor::new(|args| Ok($r { x: args.data("x")? })).carry("x", FieldKind::Integer))
        };
        ($registry:expr; $l:ident $r:ident, $nl:ident $nr:ident $(, $ml:ident $mr:ident)*) => {
            ladder!(
                $registry
                    .register(
                        StageDescriptor::new(|args| Ok($l { x: args.data("x")? }))
                            .carry("x", FieldKind::Integer)
                            .becomes_any_of([StageType::of::<$nl>(), StageType::of::<$nr>()]),
                    )
                    .register(
                        StageDescriptor::new(|args| Ok($r { x: args.data("x")? }))
                            .carry("x", FieldKind::Integer)
                            .becomes_any_of([StageType::of::<$nr>(), StageType::of::<$nl>()]),
                    );
                $nl $nr $(, $ml $mr)*
            )
        };
    }

    rungs!(L0 R0, L1 R1, L2 R2, L3 R3, L4 R4, L5 R5, L6 R6, L7 R7, L8 R8, L9 R9, L10 R10, L11 R11, L12 R12, L13 R13, L14 R14, L15 R15, L16 R16, L17 R17, L18 R18, L19 R19, L20 R20, L21 R21, L22 R22, L23 R23, L24 R24, L25 R25, L26 R26, L27 R27, L28 R28, L29 R29, L30 R30, L31 R31);

    #[test]
    fn test_depth_on_shared_successors() {
        let catalog = ladder!(Registry::new(); L0 R0, L1 R1, L2 R2, L3 R3, L4 R4, L5 R5, L6 R6, L7 R7, L8 R8, L9 R9, L10 R10, L11 R11, L12 R12, L13 R13, L14 R14, L15 R15, L16 R16, L17 R17, L18 R18, L19 R19, L20 R20, L21 R21, L22 R22, L23 R23, L24 R24, L25 R25, L26 R26, L27 R27, L28 R28, L29 R29, L30 R30, L31 R31).seal().unwrap();

        assert_eq!(catalog.len(), 64);
        assert_eq!(catalog.depth_from(&StageType::of::<L0>()), Some(31));
        assert_eq!(catalog.depth_from(&StageType::of::<R0>()), Some(31));
        assert_eq!(catalog.depth_from(&StageType::of::<R20>()), Some(11));
        assert_eq!(catalog.depth_from(&StageType::of::<L31>()), Some(0));
    }
}
