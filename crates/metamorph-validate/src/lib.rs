//! metamorph-validate: field validation for the metamorphosis engine
//!
//! Every carried-forward constructor parameter may be checked twice: once by
//! the base validator registered for its name, then once per semantic tag by
//! a sharper refinement. Both layers must accept the value.
//!
//! # Example
//!
//! ```
//! use metamorph_validate::{FieldRule, ValidatorCatalog, ValidatorSet};
//! use serde_json::json;
//!
//! let catalog = ValidatorSet::new()
//!     .with_rule(FieldRule::new("age").range(Some(0.0), Some(150.0)))
//!     .unwrap()
//!     .with_rule(FieldRule::tagged("age", "adult").range(Some(18.0), None))
//!     .unwrap();
//!
//! let base = catalog.validate("age", &json!(16)).unwrap();
//! assert!(base.is_accepted());
//!
//! let refined = catalog.validate_tagged("age", "adult", &json!(16)).unwrap();
//! println!("{}", refined.failure().unwrap().render());
//! ```

pub mod catalog;
pub mod outcome;
pub mod rule;

pub use catalog::{NoValidation, RuleFile, ValidatorCatalog, ValidatorSet};
pub use outcome::{FailureKind, Outcome, ValidationFailure};
pub use rule::{display_value, FieldRule, RuleCheck};

use thiserror::Error;

/// Errors building a validator catalog
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("VALIDATE/PATTERN: invalid pattern {pattern:?} for field {field}: {message}")]
    InvalidPattern {
        field: String,
        pattern: String,
        message: String,
    },

    #[error("VALIDATE/PARSE: {0}")]
    Parse(String),

    #[error("VALIDATE/IO: {path}: {message}")]
    Io { path: String, message: String },
}
