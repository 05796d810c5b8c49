//! Greeting domain
//!
//! ```text
//! Introduction ──► StyledIntroduction ──┬─► FormalGreeting
//!                   (style #tone)       └─► CasualGreeting
//! ```
//!
//! The style is checked once by the `tone` refinement at the intermediate
//! stage; each greeting's constructor then accepts only its own style.

use metamorph_core::{FieldKind, Registry, StageDescriptor, StageType};
use metamorph_validate::{FieldRule, ValidateError, ValidatorSet};
use serde::Serialize;

pub const STYLES: [&str; 2] = ["formal", "casual"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Introduction {
    pub name: String,
    pub style: String,
}

impl Introduction {
    pub fn new(name: impl Into<String>, style: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            style: style.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyledIntroduction {
    pub name: String,
    pub style: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormalGreeting {
    pub name: String,
    pub style: String,
}

impl FormalGreeting {
    pub fn greeting(&self) -> String {
        format!("Good day, Mr./Ms. {}. It is a pleasure to make your acquaintance.", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CasualGreeting {
    pub name: String,
    pub style: String,
}

impl CasualGreeting {
    pub fn greeting(&self) -> String {
        format!("Hey {}!", self.name)
    }
}

pub fn register(registry: Registry) -> Registry {
    registry
        .register(
            StageDescriptor::initial::<Introduction>()
                .carry("name", FieldKind::String)
                .carry("style", FieldKind::String)
                .becomes::<StyledIntroduction>(),
        )
        .register(
            StageDescriptor::new(|args| {
                Ok(StyledIntroduction {
                    name: args.text("name")?,
                    style: args.text("style")?,
                })
            })
            .carry("name", FieldKind::String)
            .carry_tagged("style", FieldKind::String, &["tone"])
            .becomes_any_of([StageType::of::<FormalGreeting>(), StageType::of::<CasualGreeting>()]),
        )
        .register(
            StageDescriptor::new(|args| {
                let style = args.text("style")?;
                anyhow::ensure!(style == "formal", "style is {}, not formal", style);
                Ok(FormalGreeting {
                    name: args.text("name")?,
                    style,
                })
            })
            .carry("name", FieldKind::String)
            .carry("style", FieldKind::String),
        )
        .register(
            StageDescriptor::new(|args| {
                let style = args.text("style")?;
                anyhow::ensure!(style == "casual", "style is {}, not casual", style);
                Ok(CasualGreeting {
                    name: args.text("name")?,
                    style,
                })
            })
            .carry("name", FieldKind::String)
            .carry("style", FieldKind::String),
        )
}

pub fn validators() -> Result<ValidatorSet, ValidateError> {
    ValidatorSet::new()
        .with_rule(FieldRule::new("name").non_empty())?
        .with_rule(FieldRule::tagged("style", "tone").one_of(STYLES))
}
