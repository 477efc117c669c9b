//! The orchestration core of ideaforge.
//!
//! A run flows leaf to root through four stages:
//!
//! 1. [`Planner`] turns the requested documents into ordered [`Task`]s,
//!    falling back to a deterministic plan when the model's plan is unusable.
//! 2. [`Executor`] runs the tasks, sequentially or in concurrent batches,
//!    and returns one [`TaskResult`] per task.
//! 3. [`aggregate`] folds the successful results into the
//!    [`DevelopmentPlan`].
//! 4. [`Assembler`] makes the final call that yields the [`DocumentBundle`].
//!
//! [`Orchestrator`] wires the four together.
//!
//! [`Task`]: ideaforge_utils::types::Task
//! [`TaskResult`]: ideaforge_utils::types::TaskResult
//! [`DevelopmentPlan`]: ideaforge_utils::types::DevelopmentPlan
//! [`DocumentBundle`]: ideaforge_utils::types::DocumentBundle

pub mod aggregator;
pub mod executor;
pub mod orchestrator;
pub mod planner;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use aggregator::{Assembler, aggregate, bundle_from_response, expected_documents};
pub use executor::{ExecutionReport, Executor, ExecutorOptions};
pub use orchestrator::{GenerationRequest, Orchestrator, RunOutcome};
pub use planner::{PlannedTasks, Planner, fallback_plan, validate_plan};
