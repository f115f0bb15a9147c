use clap::Subcommand;
use focuslock_core::Config;
use serde_json::json;

use super::{open_scheduler, print_json, CommandResult};

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List recorded sessions, oldest first
    List {
        /// Only the most recent N sessions
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Delete every recorded session
    Clear,
}

pub fn run(action: HistoryAction, config: &Config) -> CommandResult {
    let (mut scheduler, _) = open_scheduler(config)?;

    match action {
        HistoryAction::List { limit } => {
            let sessions = scheduler.sessions();
            let skip = limit.map_or(0, |n| sessions.len().saturating_sub(n));
            print_json(&sessions[skip..])?;
        }
        HistoryAction::Clear => {
            let removed = scheduler.clear_history()?;
            print_json(&json!({ "removed": removed }))?;
        }
    }
    Ok(())
}
