pub mod config;
pub mod history;
pub mod settings;
pub mod stats;
pub mod timer;

use std::path::Path;

use focuslock_core::{
    Config, Database, FocusScheduler, LockEnforcer, LogInputGuard, RestoreOutcome, SystemClock,
};
use serde::Serialize;

use crate::notifier::TerminalNotifier;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Open the store named by the config and resume any running session.
pub fn open_scheduler(
    config: &Config,
) -> Result<(FocusScheduler, RestoreOutcome), Box<dyn std::error::Error>> {
    let db = match &config.storage.database {
        Some(path) => Database::open_at(Path::new(path))?,
        None => Database::open()?,
    };

    let mut scheduler = FocusScheduler::new(Box::new(SystemClock), Box::new(db))
        .with_lock_enforcer(LockEnforcer::new(Box::new(LogInputGuard::default())));
    if config.notifications.enabled {
        scheduler = scheduler.with_notifier(Box::new(TerminalNotifier));
    }

    let restored = scheduler.restore();
    tracing::debug!(?restored, "scheduler opened");
    Ok((scheduler, restored))
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CommandResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Render a JSON leaf the way `get` commands print it: strings bare,
/// everything else as JSON.
pub fn leaf_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
