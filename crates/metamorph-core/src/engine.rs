//! Engine facade: a sealed catalog plus the collaborators a run needs
use std::fmt;
use std::sync::Arc;

use crate::branch::BranchResolver;
use crate::config::EngineConfig;
use crate::context::RunContext;
use crate::driver::Driver;
use crate::error::RunFailure;
use crate::evaluator::CandidateEvaluator;
use crate::inject::{DependencyResolver, NoServices};
use crate::journal::SemanticLog;
use crate::registry::Catalog;
use crate::resolver::ArgumentResolver;
use crate::sink::{LogSink, TracingSink};
use crate::stage::{Fields, Stage};
use metamorph_validate::{NoValidation, ValidatorCatalog};

/// The terminal stage of a successful run and the log that led to it
#[derive(Debug)]
pub struct Metamorphosis {
    pub stage: Box<dyn Stage>,
    pub snapshot: Fields,
    pub log: SemanticLog,
}

impl Metamorphosis {
    pub fn downcast_ref<T: Stage>(&self) -> Option<&T> {
        self.stage.as_any().downcast_ref::<T>()
    }

    pub fn is<T: Stage>(&self) -> bool {
        self.stage.as_any().is::<T>()
    }

    /// Take the final stage by value, `None` if it is not a `T`
    pub fn into_stage<T: Stage>(self) -> Option<T> {
        self.stage.into_any().downcast::<T>().ok().map(|stage| *stage)
    }

    pub fn stage_name(&self) -> &str {
        self.log.final_stage()
    }
}

/// Shareable engine; clones share the catalog and collaborators
#[derive(Clone)]
pub struct Engine {
    catalog: Arc<Catalog>,
    validators: Arc<dyn ValidatorCatalog>,
    resolver: Arc<dyn DependencyResolver>,
    sinks: Vec<Arc<dyn LogSink>>,
    config: EngineConfig,
}

impl Engine {
    pub fn builder(catalog: Catalog) -> EngineBuilder {
        EngineBuilder::new(catalog)
    }

    pub fn run<S: Stage>(&self, initial: S) -> Result<Metamorphosis, RunFailure> {
        self.run_with(initial, RunContext::new())
    }

    pub fn run_with<S: Stage>(&self, initial: S, ctx: RunContext) -> Result<Metamorphosis, RunFailure> {
        self.run_boxed(Box::new(initial), ctx)
    }

    pub fn run_boxed(&self, initial: Box<dyn Stage>, ctx: RunContext) -> Result<Metamorphosis, RunFailure> {
        let arguments = ArgumentResolver::new(self.validators.as_ref(), self.resolver.as_ref());
        let branches = BranchResolver::new(CandidateEvaluator::new(arguments));
        let result = Driver::new(&self.catalog, branches, &self.config).drive(initial, ctx);

        let log = match &result {
            Ok(finished) => &finished.log,
            Err(failure) => &failure.log,
        };
        self.publish(log);

        result.map(|finished| Metamorphosis {
            stage: finished.stage,
            snapshot: finished.snapshot,
            log: finished.log,
        })
    }

    fn publish(&self, log: &SemanticLog) {
        if self.config.trace_steps {
            TracingSink.accept(log);
        }
        for sink in &self.sinks {
            sink.accept(log);
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Engine")
            .field("catalog", &self.catalog)
            .field("sinks", &self.sinks.len())
            .field("config", &self.config)
            .finish()
    }
}

pub struct EngineBuilder {
    catalog: Catalog,
    validators: Arc<dyn ValidatorCatalog>,
    resolver: Arc<dyn DependencyResolver>,
    sinks: Vec<Arc<dyn LogSink>>,
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            validators: Arc::new(NoValidation),
            resolver: Arc::new(NoServices),
            sinks: Vec::new(),
            config: EngineConfig::default(),
        }
    }

    pub fn validators(mut self, validators: impl ValidatorCatalog + 'static) -> Self {
        self.validators = Arc::new(validators);
        self
    }

    pub fn resolver(mut self, resolver: impl DependencyResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            catalog: Arc::new(self.catalog),
            validators: self.validators,
            resolver: self.resolver,
            sinks: self.sinks,
            config: self.config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::StageDescriptor;
    use crate::registry::Registry;
    use crate::sink::MemorySink;
    use crate::stage::FieldKind;
    use serde::Serialize;

    #[derive(Debug, Serialize)]
    struct Raw {
        word: String,
    }

    #[derive(Debug, Serialize, PartialEq)]
    struct Shouted {
        word: String,
    }

    fn engine(sink: Arc<MemorySink>) -> Engine {
        let catalog = Registry::new()
            .register(
                StageDescriptor::initial::<Raw>()
                    .carry("word", FieldKind::String)
                    .becomes::<Shouted>(),
            )
            .register(
                StageDescriptor::new(|args| {
                    let word = args.text("word")?;
                    anyhow::ensure!(!word.is_empty(), "nothing to shout");
                    Ok(Shouted {
                        word: word.to_uppercase(),
                    })
                })
                .carry("word", FieldKind::String),
            )
            .seal()
            .unwrap();
        Engine::builder(catalog).sink(sink).build()
    }

    #[test]
    fn test_run_and_downcast() {
        let sink = Arc::new(MemorySink::new());
        let engine = engine(sink.clone());

        let done = engine.run(Raw { word: "hi".into() }).unwrap();
        assert_eq!(done.stage_name(), "Shouted");
        assert!(done.is::<Shouted>());
        assert_eq!(done.downcast_ref::<Shouted>().unwrap().word, "HI");
        assert!(done.downcast_ref::<Raw>().is_none());
        assert_eq!(done.into_stage::<Shouted>(), Some(Shouted { word: "HI".into() }));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_failed_run_still_reaches_sinks() {
        let sink = Arc::new(MemorySink::new());
        let engine = engine(sink.clone());

        let failure = engine.run(Raw { word: String::new() }).unwrap_err();
        assert_eq!(failure.error.unmatched().len(), 1);
        assert_eq!(sink.len(), 1);
        assert!(!sink.logs()[0].is_success());
    }

    #[test]
    fn test_labels_reach_log() {
        let engine = engine(Arc::new(MemorySink::new()));
        let ctx = RunContext::new().with_label("tenant", "acme");
        let run_id = ctx.run_id;

        let done = engine.run_with(Raw { word: "x".into() }, ctx).unwrap();
        assert_eq!(done.log.run_id, run_id);
        assert_eq!(done.log.labels["tenant"], "acme");
    }

    #[test]
    fn test_engine_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
    }
}
