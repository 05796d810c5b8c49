//! metamorph-core: type-driven stage transformation
//!
//! A run starts from one stage value and repeatedly becomes the next stage
//! its type declares, until a terminal stage is reached. Branching
//! declarations are resolved by trying candidates in declared order; the
//! first that can be constructed wins. Every step is recorded in a
//! [`SemanticLog`].
//!
//! # Example
//!
//! ```
//! use metamorph_core::{Engine, FieldKind, Registry, StageDescriptor};
//! use serde::Serialize;
//!
//! #[derive(Debug, Serialize)]
//! struct Draft { title: String }
//!
//! #[derive(Debug, Serialize)]
//! struct Published { title: String }
//!
//! let catalog = Registry::new()
//!     .register(StageDescriptor::initial::<Draft>().carry("title", FieldKind::String).becomes::<Published>())
//!     .register(
//!         StageDescriptor::new(|args| Ok(Published { title: args.text("title")? }))
//!             .carry("title", FieldKind::String),
//!     )
//!     .seal()
//!     .unwrap();
//!
//! let engine = Engine::builder(catalog).build();
//! let done = engine.run(Draft { title: "Hello".into() }).unwrap();
//! assert_eq!(done.stage_name(), "Published");
//! assert_eq!(done.log.path(), vec!["Draft", "Published"]);
//! ```

pub mod arguments;
pub mod branch;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod driver;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod inject;
pub mod journal;
pub mod registry;
pub mod resolver;
pub mod sink;
pub mod stage;
pub mod telemetry;

pub use arguments::{service_handle, ArgumentError, ArgumentValue, Arguments, ResolvedArgument, ServiceHandle};
pub use branch::{Branch, BranchResolver, Chosen};
pub use config::{ConfigError, EngineConfig};
pub use context::RunContext;
pub use descriptor::{Becoming, ParamDescriptor, Provenance, ProvenanceKind, ServiceKey, StageDescriptor};
pub use driver::{snapshot_digest, Driver, Finished};
pub use engine::{Engine, EngineBuilder, Metamorphosis};
pub use error::{MetamorphError, RunFailure};
pub use evaluator::{CandidateEvaluator, CandidateFailure, Constructed, Evaluation, UnmatchReason, UnmatchRecord};
pub use inject::{Container, DependencyResolver, NoServices, ResolveError};
pub use journal::{ArgumentTrace, RunStatus, SemanticLog, StepRecord, ValidationTrace, ValidatorScope};
pub use registry::{Catalog, ConfigurationError, Registry};
pub use resolver::{ArgumentResolver, Resolution, ResolutionFailure};
pub use sink::{JsonLinesSink, LogSink, MemorySink, TracingSink};
pub use stage::{FieldKind, Fields, Stage, StageType};

pub use metamorph_validate as validate;

/// Engine version
pub const METAMORPH_VERSION: &str = env!("CARGO_PKG_VERSION");
