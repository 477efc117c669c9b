//! Settings command implementation
//!
//! Handles `ideaforge settings list|get|set|delete` against the JSON file
//! store. Writes go through [`Settings::set_raw`] so keys and values are
//! validated before anything is stored.

use anyhow::Result;

use ideaforge_config::Config;
use ideaforge_store::{Settings, SettingsKey};
use ideaforge_utils::error::ForgeError;

use super::common::{open_store, read_text_arg};
use crate::cli::args::SettingsCommands;

/// Longest value shown in `settings list` before it is elided.
const LIST_PREVIEW_CHARS: usize = 60;

/// Execute a settings subcommand
pub fn execute_settings_command(cmd: SettingsCommands, config: &Config) -> Result<()> {
    let settings = Settings::new(open_store(config));
    let store = settings.store();

    match cmd {
        SettingsCommands::List => {
            let entries = store.list().map_err(ForgeError::from)?;
            if entries.is_empty() {
                println!("No settings stored in {}", config.store.path.display());
                return Ok(());
            }
            for (key, value) in entries {
                println!("{key} = {}", preview(&value));
            }
        }
        SettingsCommands::Get { key } => {
            let parsed: SettingsKey = key.parse().map_err(ForgeError::from)?;
            match store.get(&parsed.to_string()).map_err(ForgeError::from)? {
                Some(value) => println!("{value}"),
                None => println!("{parsed} is not set"),
            }
        }
        SettingsCommands::Set { key, value } => {
            let value = read_text_arg(&value, "the setting value")?;
            let parsed = settings.set_raw(&key, &value).map_err(ForgeError::from)?;
            println!("✓ Set {parsed}");
        }
        SettingsCommands::Delete { key } => {
            let parsed: SettingsKey = key.parse().map_err(ForgeError::from)?;
            if store.delete(&parsed.to_string()).map_err(ForgeError::from)? {
                println!("✓ Deleted {parsed}");
            } else {
                println!("{parsed} was not set");
            }
        }
    }
    Ok(())
}

fn preview(value: &str) -> String {
    let single_line = value.replace('\n', "\\n");
    if single_line.chars().count() <= LIST_PREVIEW_CHARS {
        return single_line;
    }
    let head: String = single_line.chars().take(LIST_PREVIEW_CHARS).collect();
    format!("{head}...")
}
