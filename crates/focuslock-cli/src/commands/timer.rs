use std::time::Duration;

use clap::{Subcommand, ValueEnum};
use focuslock_core::{Config, Event, FocusScheduler, Gesture, OperationError};
use serde_json::json;
use tokio::time::MissedTickBehavior;

use super::{open_scheduler, print_json, CommandResult};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start the current phase
    Start,
    /// End the running session now and advance to the next phase
    Skip,
    /// Abort the running session and return to focus
    Stop,
    /// Leave any state, including a locked break, and return to focus
    EmergencyStop,
    /// Print current timer state as JSON
    Status,
    /// Advance the countdown once
    Tick,
    /// Drive the countdown until the running session ends
    Watch,
    /// Send an input gesture through the break lock
    Gesture {
        #[arg(value_enum)]
        gesture: GestureArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum GestureArg {
    ExitFullscreen,
    CloseTab,
    CloseWindow,
    QuitApp,
    Reload,
    NewTab,
    EmergencyStop,
}

impl From<GestureArg> for Gesture {
    fn from(arg: GestureArg) -> Self {
        match arg {
            GestureArg::ExitFullscreen => Gesture::ExitFullscreen,
            GestureArg::CloseTab => Gesture::CloseTab,
            GestureArg::CloseWindow => Gesture::CloseWindow,
            GestureArg::QuitApp => Gesture::QuitApp,
            GestureArg::Reload => Gesture::Reload,
            GestureArg::NewTab => Gesture::NewTab,
            GestureArg::EmergencyStop => Gesture::EmergencyStop,
        }
    }
}

pub fn run(action: TimerAction, config: &Config) -> CommandResult {
    let (mut scheduler, restored) = open_scheduler(config)?;

    match action {
        TimerAction::Start => {
            scheduler.start()?;
            print_json(&scheduler.status())?;
        }
        TimerAction::Skip => {
            let record = scheduler.skip()?;
            print_json(&json!({ "record": record, "status": scheduler.status() }))?;
        }
        TimerAction::Stop => {
            let record = scheduler.stop()?;
            print_json(&json!({ "record": record, "status": scheduler.status() }))?;
        }
        TimerAction::EmergencyStop => {
            let record = scheduler.emergency_stop();
            print_json(&json!({ "record": record, "status": scheduler.status() }))?;
        }
        TimerAction::Status => {
            print_json(&json!({ "restore": restored, "status": scheduler.status() }))?;
        }
        TimerAction::Tick => {
            let completed = scheduler.tick();
            print_json(&json!({ "completed": completed, "status": scheduler.status() }))?;
        }
        TimerAction::Watch => watch(scheduler, config.timer.tick_interval_ms)?,
        TimerAction::Gesture { gesture } => {
            let verdict = scheduler.handle_gesture(gesture.into());
            print_json(&json!({
                "verdict": format!("{verdict:?}"),
                "status": scheduler.status(),
            }))?;
        }
    }
    Ok(())
}

/// Tick on a fixed interval, printing every event as a JSON line, until the
/// running session finishes.
fn watch(mut scheduler: FocusScheduler, tick_interval_ms: u64) -> CommandResult {
    if !scheduler.is_running() {
        return Err(OperationError::NoActiveSession.into());
    }
    scheduler.subscribe(Box::new(|event: &Event| {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "failed to encode event"),
        }
    }));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    runtime.block_on(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(tick_interval_ms.max(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if scheduler.tick().is_some() || !scheduler.is_running() {
                break;
            }
        }
    });
    Ok(())
}
