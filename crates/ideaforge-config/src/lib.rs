//! Configuration for ideaforge.
//!
//! Values are layered with precedence CLI > environment > config file >
//! defaults, and every value remembers where it came from so
//! `ideaforge config` can show it. Programmatic users skip discovery
//! entirely through [`Config::builder`].

mod builder;
mod discovery;
mod model;
mod sources;
mod validation;

pub use builder::ConfigBuilder;
pub use discovery::{CONFIG_DIR, CONFIG_FILE, HOME_ENV};
pub use model::*;
pub use ideaforge_utils::types::ConfigSource;
