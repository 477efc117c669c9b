//! Generate command implementation
//!
//! Handles `ideaforge generate`: one full run, then the bundle is written to
//! `--out` or printed as JSON.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use ideaforge_config::Config;
use ideaforge_engine::{Orchestrator, RunOutcome};
use ideaforge_utils::exit_codes::ExitCode;
use ideaforge_utils::progress::ProgressHub;
use ideaforge_utils::types::PlanSource;

use super::common::{build_request, open_store};
use crate::cli::args::RequestArgs;

/// Execute the generate command.
///
/// Returns `ExitCode::PARTIAL` when the bundle lacks a requested document.
pub async fn execute_generate_command(
    args: &RequestArgs,
    out: &Path,
    json: bool,
    config: &Config,
    progress: ProgressHub,
) -> Result<ExitCode> {
    let request = build_request(args)?;
    let orchestrator = Orchestrator::from_config(config, open_store(config), progress)?;
    let outcome = orchestrator.run(request).await?;

    if json {
        let rendered = serde_json::to_string_pretty(&outcome)
            .context("Failed to serialize run outcome")?;
        println!("{rendered}");
    } else {
        write_bundle(&outcome, out)?;
    }

    report_plan_source(&outcome.plan_source);
    if outcome.is_complete() {
        Ok(ExitCode::SUCCESS)
    } else {
        report_missing(&outcome);
        Ok(ExitCode::PARTIAL)
    }
}

fn write_bundle(outcome: &RunOutcome, out: &Path) -> Result<()> {
    fs::create_dir_all(out)
        .with_context(|| format!("Failed to create output directory {}", out.display()))?;
    for (filename, markdown) in outcome.bundle.iter() {
        let path = out.join(filename);
        fs::write(&path, markdown)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    println!(
        "✓ Wrote {} document(s) to {}",
        outcome.bundle.len(),
        out.display()
    );
    for filename in outcome.bundle.filenames() {
        println!("  - {filename}");
    }
    Ok(())
}

fn report_plan_source(source: &PlanSource) {
    if let PlanSource::Fallback { reason } = source {
        eprintln!("⚠ The planning model's answer was unusable; used the default plan ({reason})");
    }
}

fn report_missing(outcome: &RunOutcome) {
    eprintln!("⚠ The bundle is missing {} requested document(s):", outcome.missing.len());
    for doc in &outcome.missing {
        let failure = outcome
            .results
            .iter()
            .find(|result| result.unit() == doc.unit())
            .and_then(|result| result.error());
        match failure {
            Some(error) => eprintln!("  - {} ({}): {error}", doc.filename(), doc.unit()),
            None => eprintln!("  - {} ({})", doc.filename(), doc.unit()),
        }
    }
}
