//! Log sinks: where finished Semantic Logs go
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;

use crate::journal::SemanticLog;

/// Receives every finished (or partial) log
pub trait LogSink: Send + Sync {
    fn accept(&self, log: &SemanticLog);
}

impl<T: LogSink + ?Sized> LogSink for Arc<T> {
    fn accept(&self, log: &SemanticLog) {
        (**self).accept(log)
    }
}

/// One `tracing` event per step plus a run summary
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn accept(&self, log: &SemanticLog) {
        for step in log.steps() {
            tracing::info!(
                run_id = %log.run_id,
                index = step.index,
                source = %step.source,
                target = %step.target,
                rejected = step.rejected.len(),
                validations = step.validations.len(),
                elapsed_us = step.elapsed_micros,
                "step"
            );
        }
        tracing::info!(
            run_id = %log.run_id,
            status = ?log.status,
            path = %log.path().join(" -> "),
            "run finished"
        );
    }
}

/// Writes one JSON document per run, newline-terminated
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn write(&self, log: &SemanticLog) -> std::io::Result<()> {
        let mut writer = self.writer.lock();
        serde_json::to_writer(&mut *writer, log)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }
}

impl<W: Write + Send> LogSink for JsonLinesSink<W> {
    fn accept(&self, log: &SemanticLog) {
        if let Err(e) = self.write(log) {
            tracing::warn!(run_id = %log.run_id, error = %e, "failed to write semantic log");
        }
    }
}

/// Keeps every log it receives
#[derive(Debug, Default)]
pub struct MemorySink {
    logs: Mutex<Vec<SemanticLog>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logs(&self) -> Vec<SemanticLog> {
        self.logs.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.logs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.lock().is_empty()
    }

    pub fn clear(&self) {
        self.logs.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn accept(&self, log: &SemanticLog) {
        self.logs.lock().push(log.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_memory_sink() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());
        sink.accept(&SemanticLog::new(Uuid::new_v4(), "Seed"));
        sink.accept(&SemanticLog::new(Uuid::new_v4(), "Seed"));
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.logs()[0].initial, "Seed");
        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_json_lines() {
        let sink = JsonLinesSink::new(Vec::new());
        sink.accept(&SemanticLog::new(Uuid::new_v4(), "First"));
        sink.accept(&SemanticLog::new(Uuid::new_v4(), "Second"));

        let bytes = sink.into_inner();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let second: SemanticLog = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.initial, "Second");
    }

    #[test]
    fn test_shared_sink() {
        let sink = Arc::new(MemorySink::new());
        let shared: Arc<dyn LogSink> = sink.clone();
        shared.accept(&SemanticLog::new(Uuid::new_v4(), "Seed"));
        assert_eq!(sink.len(), 1);
    }
}
