//! Shared fixtures for tests across the workspace.

use std::sync::Mutex;

use crate::progress::{ProgressEvent, ProgressKind, ProgressSink, ProgressSource};
use crate::types::{FeatureFlags, TaskResult, TechStack, UnitName};

/// The React + Convex stack used throughout the scenario tests.
#[must_use]
pub fn sample_stack() -> TechStack {
    TechStack::new("React", "Convex")
        .with_styling("Tailwind CSS")
        .with_ui_library("shadcn/ui")
        .with_state_management("Zustand")
        .with_auth_provider("Clerk")
        .with_features(FeatureFlags {
            auth: true,
            crud: true,
            realtime: false,
        })
}

/// Sink that keeps everything it is told, for assertions.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
    completions: Mutex<Vec<Vec<TaskResult>>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn completions(&self) -> usize {
        self.completions.lock().map(|c| c.len()).unwrap_or_default()
    }

    pub fn last_results(&self) -> Option<Vec<TaskResult>> {
        self.completions.lock().ok().and_then(|c| c.last().cloned())
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Events about tasks, as `(kind, unit, index)`.
    pub fn task_events(&self) -> Vec<(ProgressKind, UnitName, usize)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e.source {
                ProgressSource::Task { unit, index } => Some((e.kind, unit, index)),
                _ => None,
            })
            .collect()
    }

    /// Events about resilient-client calls, as `(kind, label)`.
    pub fn api_events(&self) -> Vec<(ProgressKind, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e.source {
                ProgressSource::Api { label } => Some((e.kind, label)),
                _ => None,
            })
            .collect()
    }

    pub fn executor_events(&self) -> Vec<ProgressEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.source == ProgressSource::Executor)
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn on_progress(&self, event: &ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }

    fn on_complete(&self, results: &[TaskResult]) {
        if let Ok(mut completions) = self.completions.lock() {
            completions.push(results.to_vec());
        }
    }

    fn on_error(&self, error: &str) {
        if let Ok(mut errors) = self.errors.lock() {
            errors.push(error.to_string());
        }
    }
}
