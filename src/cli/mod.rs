//! Command-line interface for ideaforge
//!
//! ## Module Structure
//!
//! - `args`: CLI argument definitions and parsing structures (clap)
//! - `run`: Main entry point and command dispatch
//! - `commands`: Command implementations and helpers
//! - `report`: user-facing error reports

pub mod args;
mod commands;
mod report;
mod run;

pub use args::{Cli, Commands, RequestArgs, SettingsCommands};
pub use report::contextual_report;
pub use run::run;
