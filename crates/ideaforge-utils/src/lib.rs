//! Foundation types shared by every ideaforge crate.
//!
//! Nothing in here performs I/O: the closed document/unit enumerations, the
//! per-run value types that flow between planner, executor and aggregator,
//! the error taxonomy, progress events and the tracing bootstrap.

pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod progress;
pub mod redaction;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;
