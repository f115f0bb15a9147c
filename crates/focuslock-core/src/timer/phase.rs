//! Focus/break cycle.
//!
//! A focus session is followed by a short break, except every
//! `sessions_until_long_break`-th focus session, which earns a long break.
//! Every break returns to focus.

use serde::{Deserialize, Serialize};

use crate::session::{Phase, Settings};

/// A phase change produced by the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: Phase,
    pub to: Phase,
    pub session_index: u32,
}

/// Owns the current phase and the focus-session counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseMachine {
    phase: Phase,
    session_index: u32,
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self {
            phase: Phase::Focus,
            session_index: 1,
        }
    }
}

impl PhaseMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted values. A zero counter is treated as 1.
    pub fn from_parts(phase: Phase, session_index: u32) -> Self {
        Self {
            phase,
            session_index: session_index.max(1),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session_index(&self) -> u32 {
        self.session_index
    }

    /// Phase that would follow a completion of the current one.
    pub fn peek_next(&self, settings: &Settings) -> Phase {
        match self.phase {
            Phase::Focus => {
                let cycle = settings.sessions_until_long_break.max(1);
                if self.session_index % cycle == 0 {
                    Phase::LongBreak
                } else {
                    Phase::ShortBreak
                }
            }
            Phase::ShortBreak | Phase::LongBreak => Phase::Focus,
        }
    }

    /// Advance after a completed (or skipped) session.
    pub fn complete(&mut self, settings: &Settings) -> Transition {
        let from = self.phase;
        let to = self.peek_next(settings);
        if from == Phase::Focus {
            self.session_index = self.session_index.saturating_add(1);
        }
        self.phase = to;
        tracing::debug!(?from, ?to, session_index = self.session_index, "phase advanced");
        Transition {
            from,
            to,
            session_index: self.session_index,
        }
    }

    /// Force the phase back to focus without counting a completion.
    /// Returns the transition if the phase actually changed.
    pub fn reset_to_focus(&mut self) -> Option<Transition> {
        if self.phase == Phase::Focus {
            return None;
        }
        let from = self.phase;
        self.phase = Phase::Focus;
        Some(Transition {
            from,
            to: Phase::Focus,
            session_index: self.session_index,
        })
    }

    /// Adopt the phase of a restored session.
    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }
}
