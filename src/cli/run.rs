//! CLI entry point and dispatch logic
//!
//! This module owns the `run()` function which:
//! - Parses CLI arguments
//! - Builds CliArgs and discovers Config
//! - Installs tracing and the progress sinks
//! - Creates the tokio runtime
//! - Dispatches to command handlers
//! - Handles all error output

use clap::Parser;
use std::sync::Arc;

use ideaforge_config::{CliArgs, Config};
use ideaforge_utils::error::ForgeError;
use ideaforge_utils::exit_codes::ExitCode;
use ideaforge_utils::logging::init_tracing;
use ideaforge_utils::progress::{ProgressHub, TracingSink};
use ideaforge_utils::redaction::redact;

use super::args::{Cli, Commands};
use super::commands;
use super::report::{contextual_report, enhance_error_context};

/// Main CLI execution function.
///
/// This function handles ALL output including errors. It returns `Result<(), ExitCode>`:
/// - On success: returns `Ok(())` after printing any output
/// - On a partial bundle or an error: prints the report, returns `Err(ExitCode)`
///
/// main.rs only calls `std::process::exit(code.as_i32())` on error - it does NOT print.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("✗ Failed to initialize logging: {e}");
        return Err(ExitCode::INTERNAL);
    }

    let cli_args = cli_args_from(&cli);

    // Discover and load configuration
    let config = match Config::discover(&cli_args) {
        Ok(config) => config,
        Err(err) => {
            let err = ForgeError::Config(err);
            eprintln!("{}", contextual_report(&err, "config"));
            return Err(err.to_exit_code());
        }
    };

    // Create tokio runtime for async operations
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    let operation = match &cli.command {
        Commands::Generate { .. } => "generate",
        Commands::Plan { .. } => "plan",
        Commands::Units { .. } => "units",
        Commands::Config { .. } => "config",
        Commands::Settings(_) => "settings",
    };
    let progress = ProgressHub::new().with_sink(Arc::new(TracingSink));

    let result = rt.block_on(async {
        match cli.command {
            Commands::Generate { request, out, json } => {
                commands::execute_generate_command(&request, &out, json, &config, progress).await
            }
            Commands::Plan { request, json } => {
                commands::execute_plan_command(&request, json, &config, progress)
                    .await
                    .map(|()| ExitCode::SUCCESS)
            }
            Commands::Units { json } => {
                commands::execute_units_command(json, &config).map(|()| ExitCode::SUCCESS)
            }
            Commands::Config { json } => {
                commands::execute_config_command(json, &config).map(|()| ExitCode::SUCCESS)
            }
            Commands::Settings(cmd) => {
                commands::execute_settings_command(cmd, &config).map(|()| ExitCode::SUCCESS)
            }
        }
    });

    match result {
        Ok(code) if code == ExitCode::SUCCESS => Ok(()),
        Ok(code) => Err(code),
        Err(error) => {
            if let Some(forge_error) = error.downcast_ref::<ForgeError>() {
                eprintln!("{}", contextual_report(forge_error, operation));
                return Err(forge_error.to_exit_code());
            }

            eprintln!("✗ Unexpected error: {}", redact(&format!("{error:#}")));
            if let Some(suggestions) = enhance_error_context(&error) {
                eprintln!("\n  Suggestions:");
                for (i, suggestion) in suggestions.iter().enumerate() {
                    eprintln!("    {}. {}", i + 1, suggestion);
                }
            }
            eprintln!("\n  Run with --verbose for more detailed output");
            Err(ExitCode::INTERNAL)
        }
    }
}

/// Overrides for the configuration system. Set flags win over every other
/// source.
fn cli_args_from(cli: &Cli) -> CliArgs {
    let mode = match &cli.command {
        Commands::Generate { request, .. } | Commands::Plan { request, .. } => request.mode,
        _ => None,
    };
    CliArgs {
        config_path: cli.config.clone(),
        provider: cli.provider.clone(),
        fallback_provider: cli.fallback_provider.clone(),
        model: cli.model.clone(),
        timeout_secs: cli.timeout,
        batch_size: cli.batch_size,
        retry_attempts: cli.retry_attempts,
        mode,
        store_path: cli.store.clone(),
    }
}
