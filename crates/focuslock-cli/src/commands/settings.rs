use clap::Subcommand;
use focuslock_core::storage::{get_json_value_by_path, set_json_value_by_path};
use focuslock_core::{Config, ConfigError, Settings};

use super::{leaf_to_string, open_scheduler, print_json, CommandResult};

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Get a setting (e.g. "focusDuration", "lockScreenEnabled")
    Get {
        /// Setting key
        key: String,
    },
    /// Change a setting; only allowed while no session runs
    Set {
        /// Setting key
        key: String,
        /// New value
        value: String,
    },
    /// List all settings
    List,
    /// Reset settings to defaults
    Reset,
}

pub fn run(action: SettingsAction, config: &Config) -> CommandResult {
    let (mut scheduler, _) = open_scheduler(config)?;

    match action {
        SettingsAction::Get { key } => {
            let json = serde_json::to_value(scheduler.settings())?;
            let value = get_json_value_by_path(&json, &key)
                .ok_or_else(|| ConfigError::UnknownKey(key.clone()))?;
            println!("{}", leaf_to_string(value));
        }
        SettingsAction::Set { key, value } => {
            let mut json = serde_json::to_value(scheduler.settings())?;
            set_json_value_by_path(&mut json, &key, &value)?;
            let settings: Settings =
                serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                    key: key.clone(),
                    message: e.to_string(),
                })?;
            scheduler.update_settings(settings)?;
            print_json(scheduler.settings())?;
        }
        SettingsAction::List => print_json(scheduler.settings())?,
        SettingsAction::Reset => {
            scheduler.update_settings(Settings::default())?;
            print_json(scheduler.settings())?;
        }
    }
    Ok(())
}
