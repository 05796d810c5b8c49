//! Static stage metadata: constructor parameters and transformation declarations
//!
//! Every stage type is registered once with an explicit descriptor table
//! instead of being discovered by introspection.

use serde::{Deserialize, Serialize};
use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::arguments::Arguments;
use crate::stage::{short_type_name, FieldKind, Stage, StageType};

/// Type identity of an externally supplied capability
#[derive(Clone, Copy)]
pub struct ServiceKey {
    id: TypeId,
    full_name: &'static str,
}

impl ServiceKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            full_name: type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> String {
        short_type_name(self.full_name)
    }
}

impl PartialEq for ServiceKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ServiceKey {}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ServiceKey({})", self.name())
    }
}

/// Where a constructor parameter's value comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// Copied from the same-named field of the previous stage
    CarriedForward(FieldKind),
    /// Obtained from the dependency resolver, keyed by type and optional binding name
    ExternallySupplied {
        service: ServiceKey,
        binding: Option<String>,
    },
}

impl Provenance {
    pub fn kind(&self) -> ProvenanceKind {
        match self {
            Provenance::CarriedForward(_) => ProvenanceKind::CarriedForward,
            Provenance::ExternallySupplied { .. } => ProvenanceKind::ExternallySupplied,
        }
    }
}

/// Provenance without its payload, as recorded in the semantic log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceKind {
    CarriedForward,
    ExternallySupplied,
}

impl fmt::Display for ProvenanceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProvenanceKind::CarriedForward => write!(f, "carried_forward"),
            ProvenanceKind::ExternallySupplied => write!(f, "externally_supplied"),
        }
    }
}

/// One constructor parameter of a stage type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDescriptor {
    pub name: String,
    /// `None` is a registration error reported when the registry is sealed
    pub provenance: Option<Provenance>,
    /// Semantic tags, each selecting a refinement validator, in declared order
    pub tags: Vec<String>,
}

impl ParamDescriptor {
    /// A parameter with no provenance yet
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provenance: None,
            tags: Vec::new(),
        }
    }

    pub fn carried(name: impl Into<String>, kind: FieldKind) -> Self {
        Self::new(name).with_provenance(Provenance::CarriedForward(kind))
    }

    pub fn injected<S: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self::new(name).with_provenance(Provenance::ExternallySupplied {
            service: ServiceKey::of::<S>(),
            binding: None,
        })
    }

    pub fn injected_named<S: ?Sized + 'static>(name: impl Into<String>, binding: impl Into<String>) -> Self {
        Self::new(name).with_provenance(Provenance::ExternallySupplied {
            service: ServiceKey::of::<S>(),
            binding: Some(binding.into()),
        })
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }

    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn is_carried(&self) -> bool {
        matches!(self.provenance, Some(Provenance::CarriedForward(_)))
    }
}

/// Transformation declaration: what a stage type can become
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Becoming {
    /// No successor; a run ends here
    Terminal,
    /// Exactly one successor
    Into(StageType),
    /// Candidates tried in declared order; the first that constructs wins
    AnyOf(Vec<StageType>),
}

impl Becoming {
    pub fn candidates(&self) -> &[StageType] {
        match self {
            Becoming::Terminal => &[],
            Becoming::Into(target) => std::slice::from_ref(target),
            Becoming::AnyOf(candidates) => candidates,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Becoming::Terminal)
    }

    pub fn is_branching(&self) -> bool {
        matches!(self, Becoming::AnyOf(_))
    }
}

type Constructor = dyn Fn(&Arguments) -> anyhow::Result<Box<dyn Stage>> + Send + Sync;

/// Everything the engine knows about one stage type
#[derive(Clone)]
pub struct StageDescriptor {
    stage: StageType,
    name: String,
    params: Vec<ParamDescriptor>,
    becoming: Becoming,
    construct: Option<Arc<Constructor>>,
}

impl StageDescriptor {
    /// Describe a stage type the engine can construct
    ///
    /// The constructor holds the stage's own business invariants; an `Err`
    /// rejects the candidate without failing the run.
    pub fn new<T, F>(construct: F) -> Self
    where
        T: Stage,
        F: Fn(&Arguments) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let construct: Arc<Constructor> =
            Arc::new(move |args| construct(args).map(|stage| Box::new(stage) as Box<dyn Stage>));
        Self {
            construct: Some(construct),
            ..Self::initial::<T>()
        }
    }

    /// Describe a stage type that only ever enters a run from the caller
    pub fn initial<T: Stage>() -> Self {
        let stage = StageType::of::<T>();
        Self {
            name: stage.name(),
            stage,
            params: Vec::new(),
            becoming: Becoming::Terminal,
            construct: None,
        }
    }

    /// Override the display name used in logs and errors
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn param(mut self, param: ParamDescriptor) -> Self {
        self.params.push(param);
        self
    }

    /// Carried-forward parameter
    pub fn carry(self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.param(ParamDescriptor::carried(name, kind))
    }

    /// Carried-forward parameter with semantic tags
    pub fn carry_tagged(self, name: impl Into<String>, kind: FieldKind, tags: &[&str]) -> Self {
        let param = tags
            .iter()
            .fold(ParamDescriptor::carried(name, kind), |p, tag| p.tagged(*tag));
        self.param(param)
    }

    /// Externally supplied parameter keyed by service type
    pub fn inject<S: ?Sized + 'static>(self, name: impl Into<String>) -> Self {
        self.param(ParamDescriptor::injected::<S>(name))
    }

    /// Externally supplied parameter keyed by service type and binding name
    pub fn inject_named<S: ?Sized + 'static>(self, name: impl Into<String>, binding: impl Into<String>) -> Self {
        self.param(ParamDescriptor::injected_named::<S>(name, binding))
    }

    /// Linear transformation
    pub fn becomes<T: 'static>(mut self) -> Self {
        self.becoming = Becoming::Into(StageType::of::<T>());
        self
    }

    /// Branching transformation, candidates in priority order
    pub fn becomes_any_of(mut self, candidates: impl IntoIterator<Item = StageType>) -> Self {
        self.becoming = Becoming::AnyOf(candidates.into_iter().collect());
        self
    }

    pub fn terminal(mut self) -> Self {
        self.becoming = Becoming::Terminal;
        self
    }

    pub fn stage_type(&self) -> StageType {
        self.stage
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[ParamDescriptor] {
        &self.params
    }

    pub fn becoming(&self) -> &Becoming {
        &self.becoming
    }

    pub fn is_constructible(&self) -> bool {
        self.construct.is_some()
    }

    pub fn declares_field(&self, name: &str) -> bool {
        self.params.iter().any(|p| p.name == name)
    }

    pub(crate) fn construct(&self, args: &Arguments) -> anyhow::Result<Box<dyn Stage>> {
        match &self.construct {
            Some(construct) => construct(args),
            None => anyhow::bail!("{} has no constructor", self.name),
        }
    }
}

impl fmt::Debug for StageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("StageDescriptor")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("becoming", &self.becoming)
            .field("constructible", &self.is_constructible())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Debug, Serialize)]
    struct Seed {
        name: String,
    }

    #[derive(Debug, Serialize)]
    struct Sprout {
        name: String,
    }

    trait Clock: Send + Sync {}

    #[test]
    fn test_builder_collects_params_in_order() {
        let descriptor = StageDescriptor::new(|args| Ok(Sprout { name: args.text("name")? }))
            .carry_tagged("name", FieldKind::String, &["short", "ascii"])
            .inject::<dyn Clock>("clock")
            .inject_named::<dyn Clock>("backup", "utc");

        let params = descriptor.params();
        assert_eq!(params.len(), 3);
        assert_eq!(params[0].tags, vec!["short", "ascii"]);
        assert!(params[0].is_carried());
        assert_eq!(params[1].provenance.as_ref().unwrap().kind(), ProvenanceKind::ExternallySupplied);
        assert_eq!(
            params[2].provenance,
            Some(Provenance::ExternallySupplied {
                service: ServiceKey::of::<dyn Clock>(),
                binding: Some("utc".into()),
            })
        );
        assert_eq!(ServiceKey::of::<dyn Clock>().name(), "dyn Clock");
    }

    #[test]
    fn test_becoming_candidates() {
        assert!(Becoming::Terminal.candidates().is_empty());

        let linear = StageDescriptor::initial::<Seed>().becomes::<Sprout>();
        assert_eq!(linear.becoming().candidates(), &[StageType::of::<Sprout>()]);
        assert!(!linear.becoming().is_branching());

        let branching = StageDescriptor::initial::<Seed>()
            .becomes_any_of([StageType::of::<Sprout>(), StageType::of::<Seed>()]);
        assert!(branching.becoming().is_branching());
        assert_eq!(branching.becoming().candidates().len(), 2);
    }

    #[test]
    fn test_initial_descriptor_is_not_constructible() {
        let descriptor = StageDescriptor::initial::<Seed>().named("Seedling");
        assert!(!descriptor.is_constructible());
        assert_eq!(descriptor.name(), "Seedling");
        assert!(descriptor.construct(&Arguments::default()).is_err());
    }
}
