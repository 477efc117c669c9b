//! Orchestrator facade: one call from request to document bundle.
//!
//! ```rust,no_run
//! use ideaforge_config::{CliArgs, Config};
//! use ideaforge_engine::{GenerationRequest, Orchestrator};
//! use ideaforge_store::MemoryStore;
//! use ideaforge_utils::progress::ProgressHub;
//! use ideaforge_utils::types::{DocumentType, TechStack};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::discover(&CliArgs::default())?;
//! let orchestrator = Orchestrator::from_config(&config, Arc::new(MemoryStore::new()), ProgressHub::new())?;
//! let request = GenerationRequest::new(
//!     "A simple todo app",
//!     TechStack::new("React", "Convex"),
//!     vec![DocumentType::ProjectBrief],
//! );
//! let outcome = orchestrator.run(request).await?;
//! for (filename, markdown) in outcome.bundle.iter() {
//!     println!("{filename}: {} bytes", markdown.len());
//! }
//! # Ok(())
//! # }
//! ```

use ideaforge_config::Config;
use ideaforge_llm::{ResilientClient, breaker_from_config, client_from_config};
use ideaforge_prompt_template::TemplateCatalog;
use ideaforge_store::{KeyValueStore, Settings};
use ideaforge_utils::error::ForgeError;
use ideaforge_utils::logging::run_span;
use ideaforge_utils::progress::ProgressHub;
use ideaforge_utils::redaction::redact;
use ideaforge_utils::types::{
    DevelopmentPlan, DocumentBundle, DocumentType, ExecutionMode, PlanSource, TaskResult,
    TechStack, UnitName,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{Instrument, info, warn};
use uuid::Uuid;

use crate::aggregator::{Assembler, aggregate};
use crate::executor::{Executor, ExecutorOptions};
use crate::planner::{PlannedTasks, Planner};

/// Input of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub user_idea: String,
    pub tech_stack: TechStack,
    pub documents: Vec<DocumentType>,
    /// `None` uses the configured mode.
    pub mode: Option<ExecutionMode>,
}

impl GenerationRequest {
    pub fn new(user_idea: impl Into<String>, tech_stack: TechStack, documents: Vec<DocumentType>) -> Self {
        Self {
            user_idea: user_idea.into(),
            tech_stack,
            documents,
            mode: None,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Requested documents without repeats, in request order.
    #[must_use]
    pub fn requested(&self) -> Vec<DocumentType> {
        let mut seen = BTreeSet::new();
        self.documents.iter().copied().filter(|d| seen.insert(*d)).collect()
    }

    /// Checked before any network call.
    ///
    /// # Errors
    ///
    /// `ForgeError::NothingRequested` or `ForgeError::InvalidInput`.
    pub fn validate(&self) -> Result<(), ForgeError> {
        if self.documents.is_empty() {
            return Err(ForgeError::NothingRequested);
        }
        if self.user_idea.trim().is_empty() {
            return Err(ForgeError::InvalidInput("the product idea is empty".to_string()));
        }
        if self.tech_stack.framework.trim().is_empty() {
            return Err(ForgeError::InvalidInput("the tech stack has no framework".to_string()));
        }
        if self.tech_stack.backend.trim().is_empty() {
            return Err(ForgeError::InvalidInput("the tech stack has no backend".to_string()));
        }
        Ok(())
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub run_id: String,
    pub bundle: DocumentBundle,
    pub plan: DevelopmentPlan,
    pub results: Vec<TaskResult>,
    pub plan_source: PlanSource,
    /// Requested documents absent from the bundle.
    pub missing: Vec<DocumentType>,
    pub batch_failures: usize,
}

impl RunOutcome {
    /// True when every requested document is in the bundle.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

pub struct Orchestrator {
    client: Arc<ResilientClient>,
    catalog: Arc<TemplateCatalog>,
    settings: Option<Settings>,
    progress: ProgressHub,
    executor_options: ExecutorOptions,
}

impl Orchestrator {
    /// Orchestrator over an explicit client, with the built-in templates
    /// and default executor options.
    pub fn new(client: Arc<ResilientClient>) -> Self {
        Self {
            client,
            catalog: Arc::new(TemplateCatalog::builtin()),
            settings: None,
            progress: ProgressHub::new(),
            executor_options: ExecutorOptions::default(),
        }
    }

    /// Build the providers, breaker and executor from `config`, and read
    /// prompt overrides, unit toggles and reference docs from `store`.
    ///
    /// # Errors
    ///
    /// `ForgeError::Llm` when the primary provider cannot be constructed.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn KeyValueStore>,
        progress: ProgressHub,
    ) -> Result<Self, ForgeError> {
        let breaker = Arc::new(breaker_from_config(config));
        let client = client_from_config(config, breaker, progress.clone())?;
        Ok(Self::new(Arc::new(client))
            .with_settings(Settings::new(store))
            .with_progress(progress)
            .with_executor_options(ExecutorOptions::from(&config.executor)))
    }

    /// Templates used when no settings store is attached.
    #[must_use]
    pub fn with_catalog(mut self, catalog: TemplateCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressHub) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub fn with_executor_options(mut self, options: ExecutorOptions) -> Self {
        self.executor_options = options;
        self
    }

    #[must_use]
    pub fn client(&self) -> &Arc<ResilientClient> {
        &self.client
    }

    /// Plan a request without executing it.
    ///
    /// # Errors
    ///
    /// Invalid input or a settings store failure.
    pub async fn plan(&self, request: &GenerationRequest) -> Result<PlannedTasks, ForgeError> {
        request.validate()?;
        let catalog = self.catalog()?;
        Ok(self
            .planner(catalog)?
            .plan(&request.user_idea, &request.tech_stack, &request.requested())
            .await)
    }

    /// Plan, execute, aggregate and assemble.
    ///
    /// A run with at least one generated document returns a bundle, possibly
    /// missing the documents whose unit failed. Sinks receive `on_error`
    /// when the run fails as a whole.
    ///
    /// # Errors
    ///
    /// - invalid input before any network call
    /// - `ForgeError::NoDocumentsGenerated` when every task failed
    /// - `ForgeError::Assembly` when the final assembly call fails
    pub async fn run(&self, request: GenerationRequest) -> Result<RunOutcome, ForgeError> {
        let run_id = Uuid::new_v4().to_string();
        let mode = request.mode.unwrap_or(self.executor_options.mode);
        let span = run_span(&run_id, mode, request.documents.len());
        let outcome = self.run_inner(run_id, &request, mode).instrument(span).await;
        if let Err(err) = &outcome {
            self.progress.error(&redact(&err.to_string()));
        }
        outcome
    }

    async fn run_inner(
        &self,
        run_id: String,
        request: &GenerationRequest,
        mode: ExecutionMode,
    ) -> Result<RunOutcome, ForgeError> {
        request.validate()?;
        let requested = request.requested();
        let catalog = self.catalog()?;

        let planned = self
            .planner(Arc::clone(&catalog))?
            .plan(&request.user_idea, &request.tech_stack, &requested)
            .await;
        if planned.tasks.is_empty() {
            return Err(ForgeError::InvalidInput(
                "every requested document belongs to a disabled unit".to_string(),
            ));
        }
        info!(
            tasks = planned.tasks.len(),
            fallback = planned.source.is_fallback(),
            "Plan ready"
        );

        let reference_docs = self.reference_docs(&request.tech_stack.backend, &planned)?;
        let executor = Executor::new(Arc::clone(&self.client), Arc::clone(&catalog))
            .with_options(ExecutorOptions {
                mode,
                ..self.executor_options
            })
            .with_progress(self.progress.clone())
            .with_reference_docs(reference_docs);
        let plan = DevelopmentPlan::new(request.user_idea.trim(), request.tech_stack.clone());
        let report = executor.run(&planned.tasks, &plan, mode).await;

        let plan = aggregate(plan, &report.results)?;
        if plan.document_count() == 0 {
            return Err(ForgeError::NoDocumentsGenerated {
                failures: report.failed(),
            });
        }

        let bundle = Assembler::new(Arc::clone(&self.client), catalog)
            .assemble(&plan, &requested)
            .await?;
        let missing: Vec<DocumentType> = requested
            .iter()
            .copied()
            .filter(|doc| !bundle.contains(doc.filename()))
            .collect();
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(DocumentType::as_str).collect();
            warn!(missing = %names.join(", "), "Bundle is missing requested documents");
        }
        info!(files = bundle.len(), "Run finished");

        Ok(RunOutcome {
            run_id,
            bundle,
            plan,
            results: report.results,
            plan_source: planned.source,
            missing,
            batch_failures: report.batch_failures,
        })
    }

    fn catalog(&self) -> Result<Arc<TemplateCatalog>, ForgeError> {
        match &self.settings {
            Some(settings) => Ok(Arc::new(settings.template_catalog()?)),
            None => Ok(Arc::clone(&self.catalog)),
        }
    }

    fn planner(&self, catalog: Arc<TemplateCatalog>) -> Result<Planner, ForgeError> {
        let disabled = match &self.settings {
            Some(settings) => settings.disabled_units()?,
            None => BTreeSet::new(),
        };
        Ok(Planner::new(Arc::clone(&self.client), catalog).with_disabled_units(disabled))
    }

    fn reference_docs(
        &self,
        backend: &str,
        planned: &PlannedTasks,
    ) -> Result<BTreeMap<UnitName, String>, ForgeError> {
        let mut docs = BTreeMap::new();
        let Some(settings) = &self.settings else {
            return Ok(docs);
        };
        for task in &planned.tasks {
            if let Some(doc) = settings.reference_doc(backend, task.unit)? {
                docs.insert(task.unit, doc);
            }
        }
        Ok(docs)
    }
}
