//! Timer engine implementation.
//!
//! The timer engine is a wall-clock-based countdown. It does not use
//! internal threads - the caller is responsible for calling `tick()` periodically.
//!
//! The engine stores the absolute end timestamp of the running session and
//! re-derives the remaining time from it on every tick, so missed or late
//! ticks never accumulate drift.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> Idle     (expiry, skip, stop, emergency stop)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new();
//! engine.run_session(Phase::Focus, 1500, clock.now_ms());
//! // In a loop:
//! engine.tick(clock.now_ms()); // Returns Some(Event::SessionCompleted) on expiry
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::{ClearReason, Event};
use crate::session::{elapsed_secs, Phase, RunningSessionSnapshot, SessionRecord};
use crate::stats::is_completed;

/// The countdown currently owned by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSession {
    pub phase: Phase,
    /// Epoch ms of the original start (kept across restores).
    pub start_time: u64,
    /// Epoch ms at which the countdown expires.
    pub end_time: u64,
    /// Full configured duration in seconds.
    pub expected_duration: u64,
    /// Length of this run's countdown in seconds.
    pub countdown_secs: u64,
}

impl ActiveSession {
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.end_time.saturating_sub(now_ms)
    }

    /// Remaining whole seconds, rounded up so the display reaches 0 only on expiry.
    pub fn remaining_secs(&self, now_ms: u64) -> u64 {
        self.remaining_ms(now_ms).div_ceil(1000)
    }

    pub fn snapshot(&self) -> RunningSessionSnapshot {
        RunningSessionSnapshot {
            phase: self.phase,
            duration: self.expected_duration,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }

    fn record_ending_at(&self, end_ms: u64) -> SessionRecord {
        SessionRecord {
            phase: self.phase,
            start_time: Some(self.start_time),
            end_time: Some(end_ms),
            expected_duration: Some(self.expected_duration),
            actual_duration: elapsed_secs(self.start_time, end_ms),
            completed: false,
            skipped: false,
            emergency_stop: false,
        }
    }
}

/// Core timer engine.
///
/// Operates on wall-clock timestamps -- no internal thread.
/// At most one countdown is active at a time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimerEngine {
    active: Option<ActiveSession>,
}

impl TimerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn active(&self) -> Option<&ActiveSession> {
        self.active.as_ref()
    }

    pub fn remaining_secs(&self, now_ms: u64) -> Option<u64> {
        self.active.as_ref().map(|s| s.remaining_secs(now_ms))
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a fresh countdown of `duration_secs`.
    ///
    /// Returns `None` (and changes nothing) if a session is already running.
    pub fn run_session(&mut self, phase: Phase, duration_secs: u64, now_ms: u64) -> Option<Event> {
        let session = ActiveSession {
            phase,
            start_time: now_ms,
            end_time: now_ms.saturating_add(duration_secs.saturating_mul(1000)),
            expected_duration: duration_secs,
            countdown_secs: duration_secs,
        };
        self.begin(session, false, now_ms)
    }

    /// Re-enter a persisted session for its remaining time. The eventual
    /// record keeps the snapshot's original start and full duration.
    pub fn resume_session(
        &mut self,
        snapshot: &RunningSessionSnapshot,
        now_ms: u64,
    ) -> Option<Event> {
        let session = ActiveSession {
            phase: snapshot.phase,
            start_time: snapshot.start_time,
            end_time: snapshot.end_time,
            expected_duration: snapshot.duration,
            countdown_secs: snapshot.remaining_ms(now_ms).div_ceil(1000),
        };
        self.begin(session, true, now_ms)
    }

    /// Call periodically. Returns `Some(Event::SessionCompleted)` when the
    /// countdown reaches zero, `Some(Event::SessionTicked)` otherwise, and
    /// `None` while idle.
    pub fn tick(&mut self, now_ms: u64) -> Option<Event> {
        let session = self.active.as_ref()?;
        let at = at(now_ms);
        if session.remaining_ms(now_ms) > 0 {
            return Some(Event::SessionTicked {
                remaining: session.remaining_secs(now_ms),
                total: session.countdown_secs,
                at,
            });
        }

        let session = self.active.take()?;
        // A late tick does not move the end: the session ended on schedule.
        let mut record = session.record_ending_at(session.end_time);
        record.completed = true;
        tracing::info!(phase = ?record.phase, "session completed");
        Some(Event::SessionCompleted { record, at })
    }

    /// Finish the running session now. Completion is derived from timing,
    /// not from the skip flag.
    pub fn complete_session(&mut self, skipped: bool, now_ms: u64) -> Option<SessionRecord> {
        let Some(session) = self.active.take() else {
            tracing::warn!("complete_session called with no running session");
            return None;
        };
        let mut record = session.record_ending_at(now_ms);
        record.skipped = skipped;
        record.completed = is_completed(&record);
        tracing::info!(phase = ?record.phase, skipped, completed = record.completed, "session finished early");
        Some(record)
    }

    /// Abort the running session without completing it. Safe no-op when idle.
    pub fn clear_session(&mut self, reason: ClearReason, now_ms: u64) -> Option<SessionRecord> {
        let session = self.active.take()?;
        let mut record = session.record_ending_at(now_ms);
        record.emergency_stop = reason == ClearReason::Emergency;
        tracing::info!(phase = ?record.phase, ?reason, "session cleared");
        Some(record)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn begin(&mut self, session: ActiveSession, restored: bool, now_ms: u64) -> Option<Event> {
        if let Some(current) = &self.active {
            tracing::warn!(
                running = ?current.phase,
                requested = ?session.phase,
                "session already running; start ignored"
            );
            return None;
        }
        let event = Event::SessionStarted {
            phase: session.phase,
            duration_secs: session.countdown_secs,
            expected_duration_secs: session.expected_duration,
            start_time: session.start_time,
            end_time: session.end_time,
            restored,
            at: at(now_ms),
        };
        tracing::info!(
            phase = ?session.phase,
            duration_secs = session.countdown_secs,
            restored,
            "session started"
        );
        self.active = Some(session);
        Some(event)
    }
}

fn at(now_ms: u64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(now_ms as i64).unwrap_or_default()
}
