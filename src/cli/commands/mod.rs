//! CLI command implementations.
//!
//! Each command lives in its own file; `run.rs` dispatches to the
//! `execute_*` functions re-exported here.

mod common;
mod config;
mod generate;
mod plan;
mod settings;
mod units;

pub use config::execute_config_command;
pub use generate::execute_generate_command;
pub use plan::execute_plan_command;
pub use settings::execute_settings_command;
pub use units::execute_units_command;

pub use common::{build_request, open_store, read_text_arg};
