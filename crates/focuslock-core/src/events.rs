use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lock::Gesture;
use crate::session::{Phase, SessionRecord};

/// Every state change in the scheduler produces an Event.
/// Observers receive them synchronously, in emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        phase: Phase,
        /// Countdown length for this run (the remainder when restored).
        duration_secs: u64,
        expected_duration_secs: u64,
        start_time: u64,
        end_time: u64,
        restored: bool,
        at: DateTime<Utc>,
    },
    SessionTicked {
        remaining: u64,
        total: u64,
        at: DateTime<Utc>,
    },
    SessionCompleted {
        record: SessionRecord,
        at: DateTime<Utc>,
    },
    /// Session cleared by stop or emergency stop; `on_complete` does not run.
    SessionAborted {
        record: SessionRecord,
        reason: ClearReason,
        at: DateTime<Utc>,
    },
    PhaseChanged {
        from: Phase,
        to: Phase,
        session_index: u32,
        at: DateTime<Utc>,
    },
    LockEngaged {
        phase: Phase,
        end_time: u64,
        at: DateTime<Utc>,
    },
    LockTicked {
        remaining: u64,
        total: u64,
        at: DateTime<Utc>,
    },
    LockReleased {
        at: DateTime<Utc>,
    },
    GestureBlocked {
        gesture: Gesture,
        at: DateTime<Utc>,
    },
    /// A persisted running session had already ended when it was read back.
    SnapshotExpired {
        phase: Phase,
        end_time: u64,
        at: DateTime<Utc>,
    },
    HistoryCleared {
        removed: usize,
        at: DateTime<Utc>,
    },
    SettingsUpdated {
        at: DateTime<Utc>,
    },
}

/// Why a running session was cleared without completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClearReason {
    Stop,
    Emergency,
}

/// Receives scheduler events.
pub trait SessionObserver {
    fn on_event(&mut self, event: &Event);
}

impl<F: FnMut(&Event)> SessionObserver for F {
    fn on_event(&mut self, event: &Event) {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyVariant {
    Info,
    Success,
    Warning,
}

/// User-visible feedback channel, implemented outside the core.
pub trait Notifier {
    fn notify(&mut self, message: &str, variant: NotifyVariant);
}
