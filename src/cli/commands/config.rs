//! Config command implementation
//!
//! Handles `ideaforge config`: every effective value with its source.

use anyhow::{Context, Result};
use serde_json::{Map, json};

use ideaforge_config::Config;

/// Execute the config command
pub fn execute_config_command(json: bool, config: &Config) -> Result<()> {
    let effective = config.effective_config();

    if json {
        let mut values = Map::new();
        for (key, (value, source)) in &effective {
            values.insert(key.clone(), json!({ "value": value, "source": source }));
        }
        let output = json!({
            "configPath": config.config_path.as_ref().map(|p| p.display().to_string()),
            "values": values,
        });
        let rendered =
            serde_json::to_string_pretty(&output).context("Failed to serialize configuration")?;
        println!("{rendered}");
        return Ok(());
    }

    match &config.config_path {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: none (using defaults)"),
    }
    println!();
    let width = effective.keys().map(String::len).max().unwrap_or(0);
    for (key, (value, source)) in &effective {
        println!("  {key:<width$}  {value}  [{source}]");
    }

    let primary = config.primary();
    if primary.api_key().is_none() {
        println!();
        println!(
            "⚠ {} is not set; the {} provider cannot be used",
            primary.api_key_env, config.llm.provider
        );
    }
    Ok(())
}
