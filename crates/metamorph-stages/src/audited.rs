//! Audited domain
//!
//! `Draft` has exactly one successor, and that successor needs an audit
//! logger from the dependency resolver. Without a bound logger the run
//! fails at the first step.

use metamorph_core::{FieldKind, Registry, StageDescriptor};
use parking_lot::Mutex;
use serde::Serialize;

/// Capability supplied by the dependency resolver
pub trait AuditLogger: Send + Sync {
    fn record(&self, entry: &str);
}

/// Keeps entries in memory
#[derive(Debug, Default)]
pub struct MemoryAuditLogger {
    entries: Mutex<Vec<String>>,
}

impl MemoryAuditLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }
}

impl AuditLogger for MemoryAuditLogger {
    fn record(&self, entry: &str) {
        self.entries.lock().push(entry.to_string());
    }
}

/// Forwards entries to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditLogger;

impl AuditLogger for TracingAuditLogger {
    fn record(&self, entry: &str) {
        tracing::info!(entry = entry, "audit");
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Draft {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditedDraft {
    pub title: String,
}

pub fn register(registry: Registry) -> Registry {
    registry
        .register(
            StageDescriptor::initial::<Draft>()
                .carry("title", FieldKind::String)
                .becomes::<AuditedDraft>(),
        )
        .register(
            StageDescriptor::new(|args| {
                let title = args.text("title")?;
                let audit = args.service::<dyn AuditLogger>("audit")?;
                audit.record(&format!("audited draft: {}", title));
                Ok(AuditedDraft { title })
            })
            .carry("title", FieldKind::String)
            .inject::<dyn AuditLogger>("audit"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_logger() {
        let logger = MemoryAuditLogger::new();
        logger.record("one");
        logger.record("two");
        assert_eq!(logger.entries(), vec!["one", "two"]);
    }
}
