//! metamorph-stages: reference stage domains
//!
//! Small deterministic domains that exercise every path through the engine:
//! linear and branching becomings, semantic-tag refinements, externally
//! supplied services and construction-time business rules.
//!
//! | Domain | Initial stage | Shows |
//! |--------|---------------|-------|
//! | [`greeting`] | `Introduction` | tag-validated branching |
//! | [`contact`] | `Signup` | shape mismatch falling through to the next candidate |
//! | [`audited`] | `Draft` | injected service on a linear becoming |
//! | [`onboarding`] | `Applicant` | multi-step chain, YAML validators, injected clock |

pub mod audited;
pub mod contact;
pub mod greeting;
pub mod onboarding;

use std::sync::Arc;

use metamorph_core::{Catalog, ConfigurationError, Container, Engine, EngineConfig, Registry};
use metamorph_validate::{ValidateError, ValidatorSet};

/// Every reference domain in one registry
pub fn registry() -> Registry {
    let registry = greeting::register(Registry::new());
    let registry = contact::register(registry);
    let registry = audited::register(registry);
    onboarding::register(registry)
}

pub fn catalog() -> Result<Catalog, ConfigurationError> {
    registry().seal()
}

/// Validators for every reference domain
pub fn validators() -> Result<ValidatorSet, ValidateError> {
    Ok(greeting::validators()?
        .merge(contact::validators()?)
        .merge(onboarding::validators()?))
}

/// Services the reference domains ask for
pub fn services(audit: Arc<dyn audited::AuditLogger>, clock: Arc<dyn onboarding::Clock>) -> Container {
    Container::new().bind(audit).bind(clock)
}

/// An engine over every reference domain
pub fn engine(services: Container, config: EngineConfig) -> anyhow::Result<Engine> {
    Ok(Engine::builder(catalog()?)
        .validators(validators()?)
        .resolver(services)
        .config(config)
        .build())
}
