//! Per-run context
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Identity and caller labels for one run; labels are copied into the log
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub labels: HashMap<String, Value>,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            labels: HashMap::new(),
        }
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_ids() {
        assert_ne!(RunContext::new().run_id, RunContext::new().run_id);
    }

    #[test]
    fn test_labels() {
        let ctx = RunContext::new().with_label("tenant", "acme").with_label("attempt", 2);
        assert_eq!(ctx.labels["tenant"], "acme");
        assert_eq!(ctx.labels["attempt"], 2);
    }
}
