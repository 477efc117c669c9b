//! Plan command implementation
//!
//! Handles `ideaforge plan`: runs only the planner and prints the tasks.

use anyhow::{Context, Result};
use serde_json::json;

use ideaforge_config::Config;
use ideaforge_engine::Orchestrator;
use ideaforge_utils::progress::ProgressHub;
use ideaforge_utils::types::PlanSource;

use super::common::{build_request, open_store};
use crate::cli::args::RequestArgs;

/// Execute the plan command
pub async fn execute_plan_command(
    args: &RequestArgs,
    json: bool,
    config: &Config,
    progress: ProgressHub,
) -> Result<()> {
    let request = build_request(args)?;
    let orchestrator = Orchestrator::from_config(config, open_store(config), progress)?;
    let planned = orchestrator.plan(&request).await?;

    if json {
        let value = json!({
            "tasks": planned.tasks,
            "source": planned.source,
        });
        let rendered = serde_json::to_string_pretty(&value).context("Failed to serialize plan")?;
        println!("{rendered}");
        return Ok(());
    }

    if planned.tasks.is_empty() {
        println!("No tasks: every requested document belongs to a disabled unit");
        return Ok(());
    }

    match &planned.source {
        PlanSource::Model => println!("Plan ({} task(s)):", planned.tasks.len()),
        PlanSource::Fallback { reason } => {
            println!("Default plan ({} task(s)), model plan unusable: {reason}", planned.tasks.len());
        }
    }
    for (i, task) in planned.tasks.iter().enumerate() {
        println!("  {}. {} -> {}", i + 1, task.unit, task.unit.document().filename());
        println!("     Goal:  {}", task.goal);
        println!("     Focus: {}", task.focus);
    }
    Ok(())
}
