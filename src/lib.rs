//! ideaforge - turn a product idea into a bundle of planning documents
//!
//! A run takes a free-form product idea, a target tech stack and the set of
//! documents the user wants (project brief, personas, user flow, database
//! schema, API design, component architecture, tech stack rationale,
//! roadmap). A planning model decides which specialized units to run, the
//! units run sequentially or in concurrent batches, and a final assembly
//! call turns the accumulated drafts into one markdown file per document.
//!
//! ideaforge can be used in two ways:
//! - **CLI**: `ideaforge generate --idea "..." --framework React --backend Convex --doc brief`
//! - **Library**: build an [`Orchestrator`] and call [`Orchestrator::run`]
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ideaforge::{CliArgs, Config, GenerationRequest, Orchestrator};
//! use ideaforge::store::MemoryStore;
//! use ideaforge::types::{DocumentType, TechStack};
//! use ideaforge::progress::ProgressHub;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::discover(&CliArgs::default())?;
//! let orchestrator =
//!     Orchestrator::from_config(&config, Arc::new(MemoryStore::new()), ProgressHub::new())?;
//! let request = GenerationRequest::new(
//!     "A simple todo app",
//!     TechStack::new("React", "Convex"),
//!     vec![DocumentType::ProjectBrief, DocumentType::DatabaseSchema],
//! );
//! let outcome = orchestrator.run(request).await?;
//! for (filename, markdown) in outcome.bundle.iter() {
//!     println!("{filename}: {} bytes", markdown.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Crates
//!
//! | Re-export | Crate |
//! |-----------|-------|
//! | [`types`], [`error`], [`progress`] | `ideaforge-utils` |
//! | [`Config`], [`CliArgs`] | `ideaforge-config` |
//! | [`templates`] | `ideaforge-prompt-template` |
//! | [`store`] | `ideaforge-store` |
//! | [`llm`] | `ideaforge-llm` |
//! | [`units`] | `ideaforge-units` |
//! | [`Orchestrator`] and friends | `ideaforge-engine` |

pub mod cli;

pub use ideaforge_config::{CliArgs, Config, ConfigBuilder, ProviderKind};
pub use ideaforge_engine::{
    Assembler, ExecutionReport, Executor, ExecutorOptions, GenerationRequest, Orchestrator,
    PlannedTasks, Planner, RunOutcome,
};
pub use ideaforge_utils::exit_codes::ExitCode;
pub use ideaforge_utils::{error, progress, types};

/// Prompt template catalog.
pub use ideaforge_prompt_template as templates;

/// Key-value settings storage.
pub use ideaforge_store as store;

/// LLM providers and the resilient client.
pub use ideaforge_llm as llm;

/// The eight generation units.
pub use ideaforge_units as units;
