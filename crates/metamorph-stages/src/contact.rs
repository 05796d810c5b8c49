//! Contact domain
//!
//! A signup becomes an email contact when it carries an email, otherwise a
//! phone contact. `Signup` has no `email` field, so the first candidate is
//! rejected by shape before its constructor ever runs.

use metamorph_core::{FieldKind, Registry, StageDescriptor, StageType};
use metamorph_validate::{FieldRule, ValidateError, ValidatorSet};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signup {
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailContact {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhoneContact {
    pub name: String,
    pub phone: String,
}

pub fn register(registry: Registry) -> Registry {
    registry
        .register(
            StageDescriptor::initial::<Signup>()
                .carry("name", FieldKind::String)
                .carry("phone", FieldKind::String)
                .becomes_any_of([StageType::of::<EmailContact>(), StageType::of::<PhoneContact>()]),
        )
        .register(
            StageDescriptor::new(|args| {
                Ok(EmailContact {
                    name: args.text("name")?,
                    email: args.text("email")?,
                })
            })
            .carry("name", FieldKind::String)
            .carry("email", FieldKind::String),
        )
        .register(
            StageDescriptor::new(|args| {
                Ok(PhoneContact {
                    name: args.text("name")?,
                    phone: args.text("phone")?,
                })
            })
            .carry("name", FieldKind::String)
            .carry("phone", FieldKind::String),
        )
}

pub fn validators() -> Result<ValidatorSet, ValidateError> {
    ValidatorSet::new()
        .with_rule(FieldRule::new("phone").pattern(r"^\+?[0-9][0-9 -]{5,}$"))?
        .with_rule(FieldRule::new("email").pattern(r"^[^@\s]+@[^@\s]+$"))
}
