//! Tracing bootstrap and the spans shared by the engine.
//!
//! Logs always go to stderr so `ideaforge generate --json` can keep stdout
//! clean for the bundle.

use std::io::IsTerminal;
use tracing::{Level, span};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::types::{ExecutionMode, UnitName};

/// True when stderr is a terminal and `NO_COLOR` is unset.
fn use_color() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Default filter directive when `RUST_LOG` is unset.
#[must_use]
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "ideaforge=debug,info"
    } else {
        "ideaforge=info,warn"
    }
}

/// Install the global subscriber.
///
/// Honours `RUST_LOG`; otherwise uses [`default_filter`]. Verbose mode adds
/// targets and span close events (with their busy/idle timings).
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(verbose)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(use_color())
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false);

    if verbose {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                layer
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.with_target(false).compact())
            .try_init()?;
    }

    Ok(())
}

/// Span covering one orchestration run.
pub fn run_span(run_id: &str, mode: ExecutionMode, requested: usize) -> tracing::Span {
    span!(
        Level::INFO,
        "run",
        run_id = %run_id,
        mode = %mode,
        requested = requested,
    )
}

/// Span covering one planned task.
pub fn task_span(unit: UnitName, index: usize) -> tracing::Span {
    span!(Level::INFO, "task", unit = %unit, index = index)
}
