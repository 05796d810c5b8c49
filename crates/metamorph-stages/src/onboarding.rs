//! Onboarding chain
//!
//! ```text
//! Applicant ──► VerifiedApplicant ──┬─► AdultMember  (age #adult)
//!  (clock)      (country #iso)      └─► MinorMember  (age #minor)
//! ```
//!
//! Field rules come from `validators/onboarding.yaml`. The base `age` rule
//! runs at every step that carries `age`; the `adult` and `minor`
//! refinements decide the branch. Verification is refused before the
//! enrolment year, read from the injected clock.

use chrono::{DateTime, Datelike, Utc};
use metamorph_core::{FieldKind, Registry, StageDescriptor, StageType};
use metamorph_validate::{ValidateError, ValidatorSet};
use serde::Serialize;

pub const ONBOARDING_RULES: &str = include_str!("../validators/onboarding.yaml");

/// Countries the verifier can handle
pub const SUPPORTED_COUNTRIES: [&str; 6] = ["BR", "DE", "FR", "GB", "JP", "US"];

/// First calendar year (UTC) in which applicants are verified
pub const ENROLMENT_OPENS: i32 = 2020;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always reports the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Applicant {
    pub name: String,
    pub age: u32,
    pub country: String,
}

impl Applicant {
    pub fn new(name: impl Into<String>, age: u32, country: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            age,
            country: country.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifiedApplicant {
    pub name: String,
    pub age: u32,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdultMember {
    pub name: String,
    pub age: u32,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MinorMember {
    pub name: String,
    pub age: u32,
    pub country: String,
}

pub fn register(registry: Registry) -> Registry {
    registry
        .register(
            StageDescriptor::initial::<Applicant>()
                .carry("name", FieldKind::String)
                .carry("age", FieldKind::Integer)
                .carry("country", FieldKind::String)
                .becomes::<VerifiedApplicant>(),
        )
        .register(
            StageDescriptor::new(|args| {
                let country = args.text("country")?;
                anyhow::ensure!(
                    SUPPORTED_COUNTRIES.contains(&country.as_str()),
                    "country {} is not supported",
                    country
                );
                let today = args.service::<dyn Clock>("clock")?.now();
                anyhow::ensure!(
                    today.year() >= ENROLMENT_OPENS,
                    "enrolment opens in {}, clock reads {}",
                    ENROLMENT_OPENS,
                    today.date_naive()
                );
                Ok(VerifiedApplicant {
                    name: args.text("name")?,
                    age: args.data("age")?,
                    country,
                })
            })
            .carry("name", FieldKind::String)
            .carry("age", FieldKind::Integer)
            .carry_tagged("country", FieldKind::String, &["iso"])
            .inject::<dyn Clock>("clock")
            .becomes_any_of([StageType::of::<AdultMember>(), StageType::of::<MinorMember>()]),
        )
        .register(
            StageDescriptor::new(|args| {
                Ok(AdultMember {
                    name: args.text("name")?,
                    age: args.data("age")?,
                    country: args.text("country")?,
                })
            })
            .carry("name", FieldKind::String)
            .carry_tagged("age", FieldKind::Integer, &["adult"])
            .carry("country", FieldKind::String),
        )
        .register(
            StageDescriptor::new(|args| {
                Ok(MinorMember {
                    name: args.text("name")?,
                    age: args.data("age")?,
                    country: args.text("country")?,
                })
            })
            .carry("name", FieldKind::String)
            .carry_tagged("age", FieldKind::Integer, &["minor"])
            .carry("country", FieldKind::String),
        )
}

pub fn validators() -> Result<ValidatorSet, ValidateError> {
    ValidatorSet::from_yaml(ONBOARDING_RULES)
}
