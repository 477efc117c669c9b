//! Helpers shared by the CLI commands: reading `-` arguments from stdin,
//! opening the settings store and turning flags into a request.

use anyhow::{Context, Result, bail};
use std::io::Read;
use std::sync::Arc;

use ideaforge_config::Config;
use ideaforge_engine::GenerationRequest;
use ideaforge_store::{JsonFileStore, KeyValueStore};

use crate::cli::args::RequestArgs;

/// Return `value`, or all of stdin when `value` is `-`.
pub fn read_text_arg(value: &str, what: &str) -> Result<String> {
    if value != "-" {
        return Ok(value.to_string());
    }
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .with_context(|| format!("Failed to read {what} from stdin"))?;
    if text.trim().is_empty() {
        bail!("Expected {what} on stdin but it was empty");
    }
    Ok(text)
}

/// The JSON file store at `store.path`.
pub fn open_store(config: &Config) -> Arc<dyn KeyValueStore> {
    Arc::new(JsonFileStore::new(config.store.path.clone()))
}

/// A generation request from the shared `generate`/`plan` flags.
pub fn build_request(args: &RequestArgs) -> Result<GenerationRequest> {
    let idea = read_text_arg(&args.idea, "the idea")?;
    let mut request = GenerationRequest::new(idea.trim(), args.tech_stack(), args.documents.clone());
    if let Some(mode) = args.mode {
        request = request.with_mode(mode);
    }
    Ok(request)
}
