//! Runs planned tasks, sequentially or in concurrent batches.
//!
//! Every submitted task yields exactly one [`TaskResult`], in submission
//! order. A failing task becomes a failed result; a batch that dies takes
//! only its own unfinished tasks with it.

use ideaforge_config::ExecutorSettings;
use ideaforge_llm::ResilientClient;
use ideaforge_prompt_template::TemplateCatalog;
use ideaforge_units::{GenerationUnit, UnitContext, reference};
use ideaforge_utils::logging::task_span;
use ideaforge_utils::progress::{ProgressEvent, ProgressHub, ProgressKind};
use ideaforge_utils::types::{DevelopmentPlan, ExecutionMode, Task, TaskResult, UnitName};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info};

/// Scheduling knobs of an [`Executor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorOptions {
    pub mode: ExecutionMode,
    /// Tasks per batch in parallel mode; a concurrency ceiling.
    pub batch_size: usize,
    /// Pause between consecutive tasks of one batch.
    pub inter_task_delay: Duration,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self::from(&ExecutorSettings::default())
    }
}

impl From<&ExecutorSettings> for ExecutorOptions {
    fn from(settings: &ExecutorSettings) -> Self {
        Self {
            mode: settings.mode,
            batch_size: settings.batch_size.max(1),
            inter_task_delay: settings.inter_task_delay(),
        }
    }
}

/// What one run of the executor produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    /// One entry per submitted task, in submission order.
    pub results: Vec<TaskResult>,
    /// Batches that aborted instead of finishing normally.
    pub batch_failures: usize,
}

impl ExecutionReport {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Shared state every batch needs.
struct TaskRunner {
    client: Arc<ResilientClient>,
    catalog: Arc<TemplateCatalog>,
    progress: ProgressHub,
    reference_docs: BTreeMap<UnitName, String>,
}

impl TaskRunner {
    fn context(&self, plan: &DevelopmentPlan, task: &Task) -> UnitContext {
        let docs = reference::resolve(
            self.reference_docs.get(&task.unit).cloned(),
            &plan.tech_stack().backend,
            task.unit,
        );
        UnitContext::for_task(plan.user_idea(), plan.tech_stack().clone(), task)
            .with_reference_docs(docs)
    }

    async fn run_task(&self, plan: &DevelopmentPlan, index: usize, task: &Task) -> TaskResult {
        let unit = task.unit;
        self.progress.emit(ProgressEvent::task(
            ProgressKind::Started,
            unit,
            index,
            format!("Generating {}", unit.document().title()),
        ));
        let started = Instant::now();
        let ctx = self.context(plan, task);
        let outcome = GenerationUnit::new(unit)
            .execute(&self.client, &self.catalog, &ctx)
            .await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(markdown) => {
                self.progress.emit(ProgressEvent::task(
                    ProgressKind::Completed,
                    unit,
                    index,
                    format!("{} ready", unit.document().title()),
                ));
                TaskResult::succeeded(unit, markdown, elapsed)
            }
            Err(err) => {
                let message = err.to_string();
                self.progress.emit(ProgressEvent::task(ProgressKind::Failed, unit, index, message.clone()));
                TaskResult::failed(unit, message, elapsed)
            }
        }
    }
}

pub struct Executor {
    client: Arc<ResilientClient>,
    catalog: Arc<TemplateCatalog>,
    progress: ProgressHub,
    reference_docs: BTreeMap<UnitName, String>,
    options: ExecutorOptions,
}

impl Executor {
    pub fn new(client: Arc<ResilientClient>, catalog: Arc<TemplateCatalog>) -> Self {
        Self {
            client,
            catalog,
            progress: ProgressHub::new(),
            reference_docs: BTreeMap::new(),
            options: ExecutorOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressHub) -> Self {
        self.progress = progress;
        self
    }

    /// Custom reference documentation per unit; units without an entry use
    /// the built-in table.
    #[must_use]
    pub fn with_reference_docs(mut self, docs: BTreeMap<UnitName, String>) -> Self {
        self.reference_docs = docs;
        self
    }

    #[must_use]
    pub fn options(&self) -> ExecutorOptions {
        self.options
    }

    /// Run `tasks` with the configured mode.
    pub async fn run_default(&self, tasks: &[Task], plan: &DevelopmentPlan) -> ExecutionReport {
        self.run(tasks, plan, self.options.mode).await
    }

    /// Run every task and return one result per task, in order.
    ///
    /// Sequential mode is a single batch. Parallel mode splits the tasks
    /// into batches of `batch_size` that run concurrently; inside a batch
    /// tasks run one after another with `inter_task_delay` between them.
    pub async fn run(&self, tasks: &[Task], plan: &DevelopmentPlan, mode: ExecutionMode) -> ExecutionReport {
        let total = tasks.len();
        let batch_size = match mode {
            ExecutionMode::Sequential => total.max(1),
            ExecutionMode::Parallel => self.options.batch_size.max(1),
        };
        let batches = total.div_ceil(batch_size);
        let progress = &self.progress;
        progress.emit(ProgressEvent::executor(
            ProgressKind::Started,
            format!("Executing {total} task(s) in {batches} batch(es), {mode} mode"),
        ));
        info!(tasks = total, batches, mode = %mode, "Executor started");

        let slots: Arc<Mutex<Vec<Option<TaskResult>>>> = Arc::new(Mutex::new(vec![None; total]));
        let plan = Arc::new(plan.clone());
        let runner = Arc::new(TaskRunner {
            client: Arc::clone(&self.client),
            catalog: Arc::clone(&self.catalog),
            progress: self.progress.clone(),
            reference_docs: self.reference_docs.clone(),
        });
        let mut set = JoinSet::new();
        for (batch_index, chunk) in tasks.chunks(batch_size).enumerate() {
            let first = batch_index * batch_size;
            let batch: Vec<(usize, Task)> = chunk
                .iter()
                .cloned()
                .enumerate()
                .map(|(offset, task)| (first + offset, task))
                .collect();
            let runner = Arc::clone(&runner);
            let plan = Arc::clone(&plan);
            let slots = Arc::clone(&slots);
            let delay = self.options.inter_task_delay;
            set.spawn(async move {
                for (position, (index, task)) in batch.into_iter().enumerate() {
                    if position > 0 && !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    let result = runner
                        .run_task(&plan, index, &task)
                        .instrument(task_span(task.unit, index))
                        .await;
                    if let Ok(mut slots) = slots.lock() {
                        slots[index] = Some(result);
                    }
                }
                debug!(batch = batch_index, "Batch finished");
            });
        }

        let mut batch_failures = 0;
        let mut abort_reasons = Vec::new();
        while let Some(joined) = set.join_next().await {
            if let Err(err) = joined {
                batch_failures += 1;
                error!(error = %err, "Batch aborted");
                abort_reasons.push(err.to_string());
            }
        }

        let filled = slots.lock().map(|s| s.clone()).unwrap_or_else(|poisoned| poisoned.into_inner().clone());
        let reason = abort_reasons.first().cloned().unwrap_or_else(|| "task did not complete".to_string());
        let results: Vec<TaskResult> = filled
            .into_iter()
            .zip(tasks)
            .map(|(slot, task)| {
                slot.unwrap_or_else(|| TaskResult::failed(task.unit, format!("batch aborted: {reason}"), Duration::ZERO))
            })
            .collect();

        let report = ExecutionReport {
            results,
            batch_failures,
        };
        progress.emit(ProgressEvent::executor(
            ProgressKind::Completed,
            summary(&report),
        ));
        progress.complete(&report.results);
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            batch_failures,
            "Executor finished"
        );
        report
    }
}

fn summary(report: &ExecutionReport) -> String {
    let total = report.results.len();
    let succeeded = report.succeeded();
    let rate = if total == 0 {
        100.0
    } else {
        succeeded as f64 * 100.0 / total as f64
    };
    let mut text = format!("{succeeded}/{total} task(s) succeeded ({rate:.0}%)");
    if report.batch_failures > 0 {
        text.push_str(&format!(", {} batch(es) aborted", report.batch_failures));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::answer;
    use ideaforge_llm::test_support::ScriptedBackend;
    use ideaforge_llm::{CircuitBreaker, LlmError, ResilienceOptions};
    use ideaforge_utils::test_support::{RecordingSink, sample_stack};

    fn executor(backend: ScriptedBackend, batch_size: usize, delay_ms: u64) -> (Executor, Arc<ScriptedBackend>) {
        let backend = Arc::new(backend);
        let client = ResilientClient::new(backend.clone(), Arc::new(CircuitBreaker::new(100, Duration::from_secs(60))))
            .with_options(ResilienceOptions {
                timeout: Duration::from_secs(5),
                retry_attempts: 1,
                backoff_base: Duration::from_millis(1),
            });
        let executor = Executor::new(Arc::new(client), Arc::new(TemplateCatalog::builtin())).with_options(
            ExecutorOptions {
                mode: ExecutionMode::Parallel,
                batch_size,
                inter_task_delay: Duration::from_millis(delay_ms),
            },
        );
        (executor, backend)
    }

    fn plan() -> DevelopmentPlan {
        DevelopmentPlan::new("A simple todo app", sample_stack())
    }

    fn tasks(units: &[UnitName]) -> Vec<Task> {
        units
            .iter()
            .map(|u| Task::new(*u, format!("goal for {u}"), "focus"))
            .collect()
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_siblings() {
        let backend = ScriptedBackend::new("p").with_responder(|inv| {
            if inv.label == "SchemaAgent" {
                Err(LlmError::Rejected {
                    status: 400,
                    message: "bad request".into(),
                })
            } else {
                answer(inv)
            }
        });
        let (executor, _) = executor(backend, 3, 0);
        let units = [UnitName::ProjectBrief, UnitName::Schema, UnitName::Roadmap];
        let report = executor.run(&tasks(&units), &plan(), ExecutionMode::Parallel).await;

        assert_eq!(report.results.len(), 3);
        assert_eq!(report.succeeded(), 2);
        let failed = &report.results[1];
        assert_eq!(failed.unit(), UnitName::Schema);
        assert!(!failed.success());
        assert!(failed.error().unwrap().starts_with("SchemaAgent generation failed"));
        assert_eq!(report.batch_failures, 0);
    }

    #[tokio::test]
    async fn test_results_keep_submission_order() {
        let backend = ScriptedBackend::new("p")
            .with_responder(answer)
            .with_delay(Duration::from_millis(5));
        let (executor, _) = executor(backend, 1, 0);
        let units: Vec<UnitName> = UnitName::all().collect();
        let report = executor.run(&tasks(&units), &plan(), ExecutionMode::Parallel).await;
        let order: Vec<UnitName> = report.results.iter().map(TaskResult::unit).collect();
        assert_eq!(order, units);
        assert_eq!(report.succeeded(), 8);
    }

    #[tokio::test]
    async fn test_panicking_batch_is_contained() {
        let backend = ScriptedBackend::new("p").with_responder(|inv| {
            if inv.label == "ApiDesignAgent" {
                panic!("responder blew up");
            }
            answer(inv)
        });
        let (executor, _) = executor(backend, 2, 0);
        let units = [UnitName::Schema, UnitName::ApiDesign, UnitName::Roadmap, UnitName::Persona];
        let report = executor.run(&tasks(&units), &plan(), ExecutionMode::Parallel).await;

        assert_eq!(report.results.len(), 4);
        assert_eq!(report.batch_failures, 1);
        assert!(report.results[0].success());
        assert!(report.results[1].error().unwrap().starts_with("batch aborted"));
        assert!(report.results[2].success());
        assert!(report.results[3].success());
    }

    #[tokio::test]
    async fn test_sequential_mode_paces_tasks() {
        let (executor, backend) = executor(ScriptedBackend::new("p").with_responder(answer), 3, 30);
        let units = [UnitName::ProjectBrief, UnitName::Persona, UnitName::UserFlow];
        let started = Instant::now();
        let report = executor.run(&tasks(&units), &plan(), ExecutionMode::Sequential).await;
        assert!(started.elapsed() >= Duration::from_millis(60));
        assert_eq!(report.succeeded(), 3);
        let labels: Vec<String> = backend.invocations().into_iter().map(|i| i.label).collect();
        assert_eq!(labels, vec!["ProjectBriefAgent", "PersonaAgent", "UserFlowAgent"]);
    }

    #[tokio::test]
    async fn test_progress_events_bracket_the_run() {
        let sink = Arc::new(RecordingSink::default());
        let (executor, _) = executor(ScriptedBackend::new("p").with_responder(answer), 3, 0);
        let executor = executor.with_progress(ProgressHub::new().with_sink(sink.clone()));
        let units = [UnitName::ProjectBrief, UnitName::Roadmap];
        executor.run(&tasks(&units), &plan(), ExecutionMode::Parallel).await;

        let exec_events = sink.executor_events();
        assert_eq!(exec_events.len(), 2);
        assert_eq!(exec_events[0].kind, ProgressKind::Started);
        assert_eq!(exec_events[1].kind, ProgressKind::Completed);
        assert!(exec_events[1].message.contains("2/2"));

        let task_events = sink.task_events();
        assert_eq!(task_events.len(), 4);
        assert!(task_events.contains(&(ProgressKind::Completed, UnitName::Roadmap, 1)));
        assert_eq!(sink.last_results().map(|r| r.len()), Some(2));
    }

    #[tokio::test]
    async fn test_empty_task_list() {
        let (executor, backend) = executor(ScriptedBackend::new("p"), 3, 0);
        let report = executor.run(&[], &plan(), ExecutionMode::Parallel).await;
        assert!(report.results.is_empty());
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_custom_reference_docs_reach_the_prompt() {
        let (executor, backend) = executor(ScriptedBackend::new("p").with_responder(answer), 3, 0);
        let executor = executor.with_reference_docs(BTreeMap::from([(
            UnitName::Schema,
            "HOUSE RULE: snake_case tables".to_string(),
        )]));
        let units = [UnitName::Schema, UnitName::ApiDesign];
        executor.run(&tasks(&units), &plan(), ExecutionMode::Sequential).await;

        let prompts = backend.prompts();
        assert!(prompts[0].contains("HOUSE RULE: snake_case tables"));
        // Convex has a built-in API entry.
        assert!(prompts[1].contains("query (read-only, reactive)"));
    }
}
