//! Session data model.
//!
//! All persisted records use camelCase JSON with epoch-millisecond timestamps
//! and durations in seconds.

mod persistence;

pub use persistence::{SessionStore, RUNNING_SESSION_KEY, SETTINGS_KEY, STATE_KEY};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    #[default]
    Focus,
    ShortBreak,
    LongBreak,
}

impl Phase {
    pub fn is_break(self) -> bool {
        !matches!(self, Phase::Focus)
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Focus => "Focus",
            Phase::ShortBreak => "Short Break",
            Phase::LongBreak => "Long Break",
        }
    }
}

/// User-facing timer settings. Durations are in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_focus_duration")]
    pub focus_duration: u64,
    #[serde(default = "default_short_break")]
    pub short_break_duration: u64,
    #[serde(default = "default_long_break")]
    pub long_break_duration: u64,
    #[serde(default = "default_sessions_until_long_break")]
    pub sessions_until_long_break: u32,
    #[serde(default)]
    pub lock_screen_enabled: bool,
    #[serde(default)]
    pub auto_start_breaks: bool,
    #[serde(default)]
    pub auto_start_focus: bool,
}

fn default_focus_duration() -> u64 {
    25 * 60
}
fn default_short_break() -> u64 {
    5 * 60
}
fn default_long_break() -> u64 {
    15 * 60
}
fn default_sessions_until_long_break() -> u32 {
    4
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            focus_duration: default_focus_duration(),
            short_break_duration: default_short_break(),
            long_break_duration: default_long_break(),
            sessions_until_long_break: default_sessions_until_long_break(),
            lock_screen_enabled: false,
            auto_start_breaks: false,
            auto_start_focus: false,
        }
    }
}

impl Settings {
    pub fn duration_for(&self, phase: Phase) -> u64 {
        match phase {
            Phase::Focus => self.focus_duration,
            Phase::ShortBreak => self.short_break_duration,
            Phase::LongBreak => self.long_break_duration,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("focusDuration", self.focus_duration),
            ("shortBreakDuration", self.short_break_duration),
            ("longBreakDuration", self.long_break_duration),
        ] {
            if value == 0 {
                return Err(ValidationError::ZeroDuration { field });
            }
        }
        if self.sessions_until_long_break == 0 {
            return Err(ValidationError::InvalidValue {
                field: "sessionsUntilLongBreak".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// One finished run of a phase. Built only when a session ends and never
/// modified after it is appended to the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub phase: Phase,
    #[serde(default)]
    pub start_time: Option<u64>,
    #[serde(default)]
    pub end_time: Option<u64>,
    /// Full configured duration in seconds, even for restored sessions.
    #[serde(default)]
    pub expected_duration: Option<u64>,
    /// Seconds between start and end.
    #[serde(default)]
    pub actual_duration: u64,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub skipped: bool,
    #[serde(default)]
    pub emergency_stop: bool,
}

impl SessionRecord {
    /// Expected end in epoch ms, if both start and expected duration are known.
    pub fn expected_end_time(&self) -> Option<u64> {
        let start = self.start_time?;
        let expected = self.expected_duration?;
        Some(start.saturating_add(expected.saturating_mul(1000)))
    }
}

/// Seconds between two epoch-ms instants, rounded to the nearest second.
pub(crate) fn elapsed_secs(start_ms: u64, end_ms: u64) -> u64 {
    (end_ms.saturating_sub(start_ms) + 500) / 1000
}

/// The in-flight session, persisted so a restart can resume it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningSessionSnapshot {
    #[serde(rename = "type")]
    pub phase: Phase,
    /// Original full duration in seconds.
    pub duration: u64,
    pub start_time: u64,
    pub end_time: u64,
}

impl RunningSessionSnapshot {
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.end_time.saturating_sub(now_ms)
    }
}

/// Scheduler progress and history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    #[serde(default)]
    pub current_phase: Phase,
    /// Focus-session counter, starting at 1.
    #[serde(rename = "currentSession", default = "default_session_index")]
    pub current_session_index: u32,
    /// Completion order; append-only except for an explicit clear.
    #[serde(default)]
    pub sessions: Vec<SessionRecord>,
}

fn default_session_index() -> u32 {
    1
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            current_phase: Phase::Focus,
            current_session_index: default_session_index(),
            sessions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_serializes_camel_case() {
        assert_eq!(
            serde_json::to_string(&Phase::ShortBreak).unwrap(),
            "\"shortBreak\""
        );
        assert_eq!(
            serde_json::from_str::<Phase>("\"longBreak\"").unwrap(),
            Phase::LongBreak
        );
    }

    #[test]
    fn snapshot_uses_type_key() {
        let snap = RunningSessionSnapshot {
            phase: Phase::Focus,
            duration: 1500,
            start_time: 10,
            end_time: 1_500_010,
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["type"], "focus");
        assert_eq!(json["startTime"], 10);
        assert_eq!(json["endTime"], 1_500_010);
    }

    #[test]
    fn state_uses_current_session_key() {
        let json = serde_json::to_value(AppState::default()).unwrap();
        assert_eq!(json["currentPhase"], "focus");
        assert_eq!(json["currentSession"], 1);
        assert!(json["sessions"].as_array().unwrap().is_empty());
    }

    #[test]
    fn record_tolerates_missing_fields() {
        let record: SessionRecord = serde_json::from_str(r#"{"phase":"focus"}"#).unwrap();
        assert_eq!(record.start_time, None);
        assert_eq!(record.expected_end_time(), None);
        assert!(!record.completed);
    }

    #[test]
    fn settings_validation() {
        assert!(Settings::default().validate().is_ok());

        let zero_focus = Settings {
            focus_duration: 0,
            ..Settings::default()
        };
        assert_eq!(
            zero_focus.validate(),
            Err(ValidationError::ZeroDuration {
                field: "focusDuration"
            })
        );

        let zero_cycle = Settings {
            sessions_until_long_break: 0,
            ..Settings::default()
        };
        assert!(zero_cycle.validate().is_err());
    }

    #[test]
    fn elapsed_secs_rounds() {
        assert_eq!(elapsed_secs(0, 1_499), 1);
        assert_eq!(elapsed_secs(0, 1_500), 2);
        assert_eq!(elapsed_secs(2_000, 1_000), 0);
    }
}
