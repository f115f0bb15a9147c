//! Forced-break lock.
//!
//! While a break runs with the lock enabled, normal controls are disabled
//! and a fixed set of exit gestures is intercepted through an [`InputGuard`].
//! Only the emergency-stop gesture passes.
//!
//! The enforcer keeps its own copy of the session's `start_time`/`duration`
//! pair and re-derives the remaining time from it on every refresh, the same
//! way the timer engine does. It never writes to the engine.

use serde::{Deserialize, Serialize};

use crate::session::{elapsed_secs, Phase, SessionRecord};

/// Input gestures the lock cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Gesture {
    /// Escape / leave full screen.
    ExitFullscreen,
    /// Ctrl+W / Cmd+W.
    CloseTab,
    /// Ctrl+Shift+W, Alt+F4.
    CloseWindow,
    /// Cmd+Q.
    QuitApp,
    /// F5 / Ctrl+R.
    Reload,
    /// Ctrl+T / Ctrl+N.
    NewTab,
    /// Ctrl+Shift+Escape, the privileged exit.
    EmergencyStop,
    /// Anything else.
    Other,
}

/// Gestures intercepted while locked.
pub const BLOCKED_GESTURES: [Gesture; 6] = [
    Gesture::ExitFullscreen,
    Gesture::CloseTab,
    Gesture::CloseWindow,
    Gesture::QuitApp,
    Gesture::Reload,
    Gesture::NewTab,
];

/// Registration point for global input interception.
pub trait InputGuard {
    fn install(&mut self, blocked: &[Gesture], allowed: Gesture);
    fn uninstall(&mut self);
}

/// Guard that records registrations in the log only.
#[derive(Debug, Default)]
pub struct LogInputGuard {
    installed: bool,
}

impl LogInputGuard {
    pub fn is_installed(&self) -> bool {
        self.installed
    }
}

impl InputGuard for LogInputGuard {
    fn install(&mut self, blocked: &[Gesture], allowed: Gesture) {
        self.installed = true;
        tracing::debug!(?blocked, ?allowed, "input guard installed");
    }

    fn uninstall(&mut self) {
        self.installed = false;
        tracing::debug!("input guard removed");
    }
}

/// What the enforcer decided for an intercepted gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureVerdict {
    /// Not locked; the gesture is not ours to handle.
    PassThrough,
    Blocked,
    EmergencyStop,
}

/// Display state produced by one refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRefresh {
    pub remaining: u64,
    pub total: u64,
    pub expired: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LockedBreak {
    phase: Phase,
    start_time: u64,
    duration: u64,
}

impl LockedBreak {
    fn end_time(&self) -> u64 {
        self.start_time.saturating_add(self.duration.saturating_mul(1000))
    }
}

/// Blocks app interaction during break phases.
pub struct LockEnforcer {
    guard: Box<dyn InputGuard>,
    locked: Option<LockedBreak>,
    controls_enabled: bool,
    refreshing: bool,
}

impl LockEnforcer {
    pub fn new(guard: Box<dyn InputGuard>) -> Self {
        Self {
            guard,
            locked: None,
            controls_enabled: true,
            refreshing: false,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.is_some()
    }

    pub fn controls_enabled(&self) -> bool {
        self.controls_enabled
    }

    /// Whether the display-refresh loop is running.
    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    /// Engage for a break that started at `start_time` (epoch ms) and lasts
    /// `duration` seconds. Focus phases are never locked.
    pub fn engage(&mut self, phase: Phase, start_time: u64, duration: u64) -> bool {
        if !phase.is_break() {
            tracing::debug!(?phase, "lock not engaged for non-break phase");
            return false;
        }
        if self.locked.is_some() {
            self.guard.uninstall();
        }
        self.locked = Some(LockedBreak {
            phase,
            start_time,
            duration,
        });
        self.controls_enabled = false;
        self.guard.install(&BLOCKED_GESTURES, Gesture::EmergencyStop);
        self.refreshing = true;
        tracing::info!(?phase, duration, "break lock engaged");
        true
    }

    /// One step of the display loop.
    pub fn refresh(&mut self, now_ms: u64) -> Option<LockRefresh> {
        if !self.refreshing {
            return None;
        }
        let locked = self.locked?;
        let remaining_ms = locked.end_time().saturating_sub(now_ms);
        Some(LockRefresh {
            remaining: remaining_ms.div_ceil(1000),
            total: locked.duration,
            expired: remaining_ms == 0,
        })
    }

    pub fn handle_gesture(&self, gesture: Gesture) -> GestureVerdict {
        if self.locked.is_none() {
            return GestureVerdict::PassThrough;
        }
        match gesture {
            Gesture::EmergencyStop => GestureVerdict::EmergencyStop,
            g if BLOCKED_GESTURES.contains(&g) => {
                tracing::debug!(gesture = ?g, "gesture blocked during break");
                GestureVerdict::Blocked
            }
            _ => GestureVerdict::PassThrough,
        }
    }

    /// Release after the break ended normally.
    pub fn release(&mut self) -> bool {
        if self.locked.is_none() {
            return false;
        }
        self.force_hide();
        true
    }

    /// Tear everything down whatever the internal flags say. Safe to call
    /// when not locked.
    pub fn force_hide(&mut self) {
        self.refreshing = false;
        self.locked = None;
        self.controls_enabled = true;
        self.guard.uninstall();
    }

    /// Build the interrupted record for the break being enforced, from the
    /// enforcer's own timing pair.
    pub fn interrupted_record(&self, now_ms: u64) -> Option<SessionRecord> {
        let locked = self.locked?;
        Some(SessionRecord {
            phase: locked.phase,
            start_time: Some(locked.start_time),
            end_time: Some(now_ms),
            expected_duration: Some(locked.duration),
            actual_duration: elapsed_secs(locked.start_time, now_ms),
            completed: false,
            skipped: false,
            emergency_stop: true,
        })
    }
}

impl std::fmt::Debug for LockEnforcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockEnforcer")
            .field("locked", &self.locked)
            .field("controls_enabled", &self.controls_enabled)
            .field("refreshing", &self.refreshing)
            .finish()
    }
}
