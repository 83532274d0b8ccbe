//! Config command handler.
//!
//! Settings are edited as JSON by dotted key, validated through the
//! launcher and then written back to the settings file.

use anyhow::Result;
use lmlaunch_core::{Settings, save_settings};
use serde_json::Value;

use crate::bootstrap::CliContext;
use crate::config_commands::ConfigCommand;
use crate::error::CliError;

/// Execute the config command.
pub fn execute(ctx: &CliContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let settings = ctx.launcher().settings();
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        ConfigCommand::Path => println!("{}", ctx.config_path.display()),
        ConfigCommand::Set { key, value } => {
            let updated = set_setting(&ctx.launcher().settings(), &key, &value)?;
            let changed = apply_and_save(ctx, updated)?;
            if changed.is_empty() {
                println!("{key} unchanged.");
            } else {
                println!("✓ Updated {}", changed.join(", "));
            }
        }
        ConfigCommand::Reset => {
            apply_and_save(ctx, Settings::with_defaults())?;
            println!("✓ All settings have been reset to defaults.");
        }
    }
    Ok(())
}

fn apply_and_save(ctx: &CliContext, settings: Settings) -> Result<Vec<String>, CliError> {
    let changed = ctx.launcher().apply_settings(settings.clone())?;
    save_settings(&ctx.config_path, &settings)?;
    Ok(changed)
}

/// Return a copy of `settings` with `key` (`<section>.<field>`) set.
///
/// `value` is parsed as JSON when possible (`8080`, `true`, `null`,
/// `["/opt/bin"]`) and taken as a plain string otherwise.
pub fn set_setting(settings: &Settings, key: &str, value: &str) -> Result<Settings, CliError> {
    let mut json = serde_json::to_value(settings).map_err(|e| CliError::Config(e.to_string()))?;
    let (section, field) = key.split_once('.').ok_or_else(|| {
        CliError::Arguments(format!("Setting keys look like <section>.<field>, got '{key}'"))
    })?;
    let slot = json
        .get_mut(section)
        .and_then(|section| section.get_mut(field))
        .ok_or_else(|| CliError::Arguments(format!("Unknown setting '{key}'")))?;

    *slot = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    serde_json::from_value(json)
        .map_err(|e| CliError::Arguments(format!("Invalid value for '{key}': {e}")))
}
