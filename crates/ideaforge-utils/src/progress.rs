//! Progress events and the observer interface.
//!
//! The core never renders anything. It pushes [`ProgressEvent`]s into a
//! [`ProgressHub`], which fans them out to every registered
//! [`ProgressSink`]. Events from concurrent batches may interleave; sinks
//! must not assume any cross-task ordering.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::types::{TaskResult, UnitName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressKind {
    Started,
    Completed,
    Failed,
}

/// What an event is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressSource {
    /// One logical resilient-client call (not one retry attempt).
    Api { label: String },
    /// One planned task, by position in the plan.
    Task { unit: UnitName, index: usize },
    /// The executor as a whole.
    Executor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub kind: ProgressKind,
    pub source: ProgressSource,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(kind: ProgressKind, source: ProgressSource, message: impl Into<String>) -> Self {
        Self {
            kind,
            source,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn api(kind: ProgressKind, label: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(kind, ProgressSource::Api { label: label.into() }, message)
    }

    pub fn task(kind: ProgressKind, unit: UnitName, index: usize, message: impl Into<String>) -> Self {
        Self::new(kind, ProgressSource::Task { unit, index }, message)
    }

    pub fn executor(kind: ProgressKind, message: impl Into<String>) -> Self {
        Self::new(kind, ProgressSource::Executor, message)
    }
}

/// Observer of a run. Implemented by the presentation layer.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);

    /// Called once with every task result after execution.
    fn on_complete(&self, _results: &[TaskResult]) {}

    /// Called once when a run fails without producing a bundle.
    fn on_error(&self, _error: &str) {}
}

/// Fan-out to any number of sinks. Cloning shares the sink list.
#[derive(Clone, Default)]
pub struct ProgressHub {
    sinks: Vec<Arc<dyn ProgressSink>>,
}

impl ProgressHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn add_sink(&mut self, sink: Arc<dyn ProgressSink>) {
        self.sinks.push(sink);
    }

    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    pub fn emit(&self, event: ProgressEvent) {
        for sink in &self.sinks {
            sink.on_progress(&event);
        }
    }

    pub fn complete(&self, results: &[TaskResult]) {
        for sink in &self.sinks {
            sink.on_complete(results);
        }
    }

    pub fn error(&self, error: &str) {
        for sink in &self.sinks {
            sink.on_error(error);
        }
    }
}

impl std::fmt::Debug for ProgressHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressHub")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

/// Logs every event through `tracing`. Used by the CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn on_progress(&self, event: &ProgressEvent) {
        let kind = match event.kind {
            ProgressKind::Started => "started",
            ProgressKind::Completed => "completed",
            ProgressKind::Failed => "failed",
        };
        match &event.source {
            ProgressSource::Api { label } => {
                tracing::debug!(kind, label = %label, "{}", event.message);
            }
            ProgressSource::Task { unit, index } => match event.kind {
                ProgressKind::Failed => warn!(kind, unit = %unit, index, "{}", event.message),
                _ => info!(kind, unit = %unit, index, "{}", event.message),
            },
            ProgressSource::Executor => info!(kind, "{}", event.message),
        }
    }

    fn on_complete(&self, results: &[TaskResult]) {
        let succeeded = results.iter().filter(|r| r.success()).count();
        info!(succeeded, total = results.len(), "Generation tasks finished");
    }

    fn on_error(&self, error: &str) {
        tracing::error!(error = %crate::redaction::redact(error), "Run failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingSink;
    use std::time::Duration;

    #[test]
    fn test_hub_fans_out_to_every_sink() {
        let a = Arc::new(RecordingSink::default());
        let b = Arc::new(RecordingSink::default());
        let hub = ProgressHub::new().with_sink(a.clone()).with_sink(b.clone());

        hub.emit(ProgressEvent::executor(ProgressKind::Started, "run"));
        hub.complete(&[TaskResult::succeeded(UnitName::Schema, "x", Duration::ZERO)]);
        hub.error("boom");

        for sink in [a, b] {
            assert_eq!(sink.events().len(), 1);
            assert_eq!(sink.completions(), 1);
            assert_eq!(sink.errors(), vec!["boom".to_string()]);
        }
    }

    #[test]
    fn test_event_serializes_source_tag() {
        let event = ProgressEvent::task(ProgressKind::Failed, UnitName::Roadmap, 2, "nope");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "failed");
        assert_eq!(json["source"]["type"], "task");
        assert_eq!(json["source"]["unit"], "RoadmapAgent");
        assert_eq!(json["source"]["index"], 2);
    }
}
