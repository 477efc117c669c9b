//! Units command implementation
//!
//! Handles `ideaforge units`: the fixed document/unit table plus each
//! unit's enabled state from the settings store.

use anyhow::{Context, Result};
use serde_json::json;

use ideaforge_config::Config;
use ideaforge_store::Settings;
use ideaforge_utils::error::ForgeError;
use ideaforge_utils::types::DocumentType;

use super::common::open_store;

/// Execute the units command
pub fn execute_units_command(json: bool, config: &Config) -> Result<()> {
    let settings = Settings::new(open_store(config));
    let mut rows = Vec::new();
    for doc in DocumentType::all() {
        let enabled = settings.is_unit_enabled(doc.unit()).map_err(ForgeError::from)?;
        rows.push((doc, enabled));
    }

    if json {
        let value: Vec<_> = rows
            .iter()
            .map(|(doc, enabled)| {
                json!({
                    "document": doc.as_str(),
                    "alias": doc.alias(),
                    "title": doc.title(),
                    "filename": doc.filename(),
                    "unit": doc.unit().as_str(),
                    "enabled": enabled,
                })
            })
            .collect();
        let rendered =
            serde_json::to_string_pretty(&value).context("Failed to serialize unit table")?;
        println!("{rendered}");
        return Ok(());
    }

    println!(
        "{:<24} {:<11} {:<28} {:<28} Enabled",
        "Document", "Alias", "Unit", "File"
    );
    for (doc, enabled) in rows {
        println!(
            "{:<24} {:<11} {:<28} {:<28} {}",
            doc.as_str(),
            doc.alias(),
            doc.unit().as_str(),
            doc.filename(),
            if enabled { "yes" } else { "no" }
        );
    }
    Ok(())
}
