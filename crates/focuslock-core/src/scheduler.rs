//! Focus-session scheduler.
//!
//! [`FocusScheduler`] is the context object that owns the settings, phase
//! machine, history and timer engine, and talks to the outside world only
//! through injected ports: a [`Clock`], a [`KeyValueStore`], an optional
//! [`Notifier`], an optional [`LockEnforcer`] and any number of
//! [`SessionObserver`]s. Everything runs on the caller's thread; the caller
//! drives the countdown by calling [`FocusScheduler::tick`].
//!
//! Every session ends in exactly one of four ways (expiry, skip, stop,
//! emergency stop), and each appends exactly one [`SessionRecord`] and
//! deletes the running-session snapshot. Only expiry and skip advance the
//! phase; stop and emergency stop return to focus without counting.

use chrono::{DateTime, TimeZone};
use serde::Serialize;

use crate::clock::Clock;
use crate::error::{OperationError, Result};
use crate::events::{ClearReason, Event, Notifier, NotifyVariant, SessionObserver};
use crate::lock::{Gesture, GestureVerdict, LockEnforcer};
use crate::session::{Phase, SessionRecord, SessionStore, Settings};
use crate::stats::{calculate_stats, calculate_stats_at, Stats};
use crate::storage::KeyValueStore;
use crate::timer::{PhaseMachine, TimerEngine, Transition};

/// Result of reading the running-session snapshot at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum RestoreOutcome {
    /// Nothing to resume.
    Idle,
    /// The snapshot had already ended; it was discarded unrecorded.
    Expired { phase: Phase },
    Resumed { phase: Phase, remaining_secs: u64 },
}

/// Point-in-time view for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub phase: Phase,
    pub session_index: u32,
    pub running: bool,
    pub remaining: Option<u64>,
    pub total: Option<u64>,
    pub end_time: Option<u64>,
    pub locked: bool,
    pub next_phase: Phase,
    pub sessions_recorded: usize,
}

pub struct FocusScheduler {
    clock: Box<dyn Clock>,
    store: SessionStore,
    settings: Settings,
    machine: PhaseMachine,
    sessions: Vec<SessionRecord>,
    engine: TimerEngine,
    lock: Option<LockEnforcer>,
    notifier: Option<Box<dyn Notifier>>,
    observers: Vec<Box<dyn SessionObserver>>,
}

impl FocusScheduler {
    /// Build an idle scheduler from persisted settings and state.
    pub fn new(clock: Box<dyn Clock>, kv: Box<dyn KeyValueStore>) -> Self {
        let store = SessionStore::new(kv);
        let settings = store.load_settings();
        let state = store.load_state();
        tracing::debug!(
            phase = ?state.current_phase,
            session_index = state.current_session_index,
            sessions = state.sessions.len(),
            "scheduler state loaded"
        );
        Self {
            clock,
            store,
            settings,
            machine: PhaseMachine::from_parts(state.current_phase, state.current_session_index),
            sessions: state.sessions,
            engine: TimerEngine::new(),
            lock: None,
            notifier: None,
            observers: Vec::new(),
        }
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_lock_enforcer(mut self, lock: LockEnforcer) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn SessionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn subscribe(&mut self, observer: Box<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn phase(&self) -> Phase {
        self.machine.phase()
    }

    pub fn session_index(&self) -> u32 {
        self.machine.session_index()
    }

    pub fn sessions(&self) -> &[SessionRecord] {
        &self.sessions
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    pub fn is_locked(&self) -> bool {
        self.lock.as_ref().is_some_and(LockEnforcer::is_locked)
    }

    pub fn status(&self) -> StatusSnapshot {
        let now = self.clock.now_ms();
        let active = self.engine.active();
        StatusSnapshot {
            phase: self.machine.phase(),
            session_index: self.machine.session_index(),
            running: active.is_some(),
            remaining: active.map(|s| s.remaining_secs(now)),
            total: active.map(|s| s.countdown_secs),
            end_time: active.map(|s| s.end_time),
            locked: self.is_locked(),
            next_phase: self.machine.peek_next(&self.settings),
            sessions_recorded: self.sessions.len(),
        }
    }

    pub fn stats(&self) -> Stats {
        calculate_stats(&self.sessions)
    }

    pub fn stats_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Stats {
        calculate_stats_at(&self.sessions, now)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Resume the session persisted by a previous process, if it is still
    /// in progress.
    pub fn restore(&mut self) -> RestoreOutcome {
        if self.engine.is_running() {
            tracing::warn!("restore called while a session is running; ignored");
            return RestoreOutcome::Idle;
        }
        let Some(snapshot) = self.store.load_snapshot() else {
            return RestoreOutcome::Idle;
        };
        // Already recorded; its delete failed when the session ended.
        if self
            .sessions
            .iter()
            .rev()
            .any(|r| r.start_time == Some(snapshot.start_time))
        {
            tracing::warn!(
                phase = ?snapshot.phase,
                start_time = snapshot.start_time,
                "stale snapshot of a recorded session; discarded"
            );
            self.clear_snapshot();
            return RestoreOutcome::Idle;
        }

        let now = self.clock.now_ms();
        let remaining_ms = snapshot.remaining_ms(now);
        if remaining_ms == 0 {
            tracing::info!(
                phase = ?snapshot.phase,
                end_time = snapshot.end_time,
                "running session expired while away; discarded"
            );
            self.clear_snapshot();
            self.emit(Event::SnapshotExpired {
                phase: snapshot.phase,
                end_time: snapshot.end_time,
                at: self.clock.now(),
            });
            return RestoreOutcome::Expired {
                phase: snapshot.phase,
            };
        }

        self.machine.set_phase(snapshot.phase);
        let Some(event) = self.engine.resume_session(&snapshot, now) else {
            return RestoreOutcome::Idle;
        };
        self.emit(event);
        self.on_session_started(snapshot.phase, snapshot.start_time, snapshot.duration);
        self.persist_state();
        tracing::debug!(phase = ?snapshot.phase, remaining_ms, "session restored");
        RestoreOutcome::Resumed {
            phase: snapshot.phase,
            remaining_secs: remaining_ms.div_ceil(1000),
        }
    }

    /// Start the current phase for its configured duration.
    pub fn start(&mut self) -> Result<()> {
        self.ensure_controls_unlocked("start")?;
        if self.engine.is_running() {
            tracing::warn!("start rejected: a session is already running");
            return Err(OperationError::SessionAlreadyRunning.into());
        }
        self.begin_current_phase()
    }

    /// Advance the countdown. Returns the record when the session expired
    /// on this tick.
    pub fn tick(&mut self) -> Option<SessionRecord> {
        let now = self.clock.now_ms();
        match self.engine.tick(now) {
            Some(Event::SessionCompleted { record, .. }) => {
                self.complete_current(record.clone());
                return Some(record);
            }
            Some(event) => self.emit(event),
            None => {}
        }
        self.refresh_lock(now);
        None
    }

    /// End the running session now and move on to the next phase.
    pub fn skip(&mut self) -> Result<SessionRecord> {
        self.ensure_controls_unlocked("skip")?;
        let now = self.clock.now_ms();
        let Some(record) = self.engine.complete_session(true, now) else {
            tracing::warn!("skip rejected: no session is running");
            return Err(OperationError::NoActiveSession.into());
        };
        self.complete_current(record.clone());
        Ok(record)
    }

    /// Abort the running session and return to focus without counting it.
    /// With nothing running this is a no-op.
    pub fn stop(&mut self) -> Result<Option<SessionRecord>> {
        self.ensure_controls_unlocked("stop")?;
        let now = self.clock.now_ms();
        let record = self.engine.clear_session(ClearReason::Stop, now);
        match &record {
            Some(record) => self.abort_current(record.clone(), ClearReason::Stop),
            None => tracing::debug!("stop with no running session"),
        }
        Ok(record)
    }

    /// Unconditionally leave any state, including a forced break, and reset
    /// to focus. Never fails; a no-op when neither a session nor a lock is
    /// active.
    pub fn emergency_stop(&mut self) -> Option<SessionRecord> {
        let now = self.clock.now_ms();

        let mut lock_record = None;
        let mut was_locked = false;
        if let Some(lock) = self.lock.as_mut() {
            lock_record = lock.interrupted_record(now);
            was_locked = lock.is_locked();
            lock.force_hide();
        }
        if was_locked {
            self.emit(Event::LockReleased {
                at: self.clock.now(),
            });
        }

        let record = self
            .engine
            .clear_session(ClearReason::Emergency, now)
            .or(lock_record);
        self.clear_snapshot();

        match &record {
            Some(record) => {
                tracing::warn!(phase = ?record.phase, "emergency stop");
                self.sessions.push(record.clone());
                self.emit(Event::SessionAborted {
                    record: record.clone(),
                    reason: ClearReason::Emergency,
                    at: self.clock.now(),
                });
            }
            None if was_locked => tracing::warn!("emergency stop released an orphaned lock"),
            None => {
                tracing::info!("emergency stop with no running session");
                return None;
            }
        }
        self.reset_phase();
        self.persist_state();
        self.notify(
            "Emergency stop: session ended, back to focus.",
            NotifyVariant::Warning,
        );
        record
    }

    /// Route an intercepted input gesture through the break lock.
    pub fn handle_gesture(&mut self, gesture: Gesture) -> GestureVerdict {
        let verdict = self
            .lock
            .as_ref()
            .map_or(GestureVerdict::PassThrough, |lock| lock.handle_gesture(gesture));
        match verdict {
            GestureVerdict::Blocked => {
                self.emit(Event::GestureBlocked {
                    gesture,
                    at: self.clock.now(),
                });
                self.notify(
                    "Break in progress. Use the emergency stop to exit.",
                    NotifyVariant::Info,
                );
            }
            GestureVerdict::EmergencyStop => {
                self.emergency_stop();
            }
            GestureVerdict::PassThrough => {}
        }
        verdict
    }

    /// Replace the settings. Only allowed while idle.
    pub fn update_settings(&mut self, settings: Settings) -> Result<()> {
        if self.engine.is_running() {
            tracing::warn!("settings update rejected: a session is running");
            return Err(OperationError::SettingsLocked.into());
        }
        settings.validate()?;
        self.store.save_settings(&settings)?;
        self.settings = settings;
        self.emit(Event::SettingsUpdated {
            at: self.clock.now(),
        });
        Ok(())
    }

    /// Drop the whole session history. Returns the number of records removed.
    pub fn clear_history(&mut self) -> Result<usize> {
        self.store
            .save_state(self.machine.phase(), self.machine.session_index(), &[])?;
        let removed = self.sessions.len();
        self.sessions.clear();
        tracing::info!(removed, "session history cleared");
        self.emit(Event::HistoryCleared {
            removed,
            at: self.clock.now(),
        });
        Ok(removed)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn ensure_controls_unlocked(&self, action: &str) -> Result<()> {
        if self.is_locked() {
            tracing::warn!(action, "rejected: controls are locked during a forced break");
            return Err(OperationError::ControlsLocked.into());
        }
        Ok(())
    }

    fn begin_current_phase(&mut self) -> Result<()> {
        let phase = self.machine.phase();
        let duration = self.settings.duration_for(phase);
        let now = self.clock.now_ms();
        let Some(event) = self.engine.run_session(phase, duration, now) else {
            return Err(OperationError::SessionAlreadyRunning.into());
        };
        if let Some(active) = self.engine.active() {
            if let Err(e) = self.store.save_snapshot(&active.snapshot()) {
                tracing::error!(error = %e, "failed to persist running session");
            }
        }
        self.emit(event);
        self.notify(&format!("{} started.", phase.label()), NotifyVariant::Info);
        self.on_session_started(phase, now, duration);
        Ok(())
    }

    /// Fires once per session start, fresh or restored.
    fn on_session_started(&mut self, phase: Phase, start_time: u64, duration: u64) {
        if !phase.is_break() || !self.settings.lock_screen_enabled {
            return;
        }
        let Some(lock) = self.lock.as_mut() else {
            tracing::warn!(?phase, "lock enforcement unavailable; break runs unlocked");
            return;
        };
        if lock.engage(phase, start_time, duration) {
            let end_time = start_time.saturating_add(duration.saturating_mul(1000));
            self.emit(Event::LockEngaged {
                phase,
                end_time,
                at: self.clock.now(),
            });
        }
    }

    fn refresh_lock(&mut self, now: u64) {
        let Some(refresh) = self.lock.as_mut().and_then(|lock| lock.refresh(now)) else {
            return;
        };
        self.emit(Event::LockTicked {
            remaining: refresh.remaining,
            total: refresh.total,
            at: self.clock.now(),
        });
        // The engine finishes a running break on the same tick; a lock that
        // expires on its own has no session behind it.
        if refresh.expired && !self.engine.is_running() {
            self.release_lock();
        }
    }

    fn release_lock(&mut self) {
        if self.lock.as_mut().is_some_and(LockEnforcer::release) {
            self.emit(Event::LockReleased {
                at: self.clock.now(),
            });
        }
    }

    /// Shared tail of every terminal event.
    fn close_session(&mut self, record: SessionRecord) {
        self.clear_snapshot();
        self.release_lock();
        self.sessions.push(record);
    }

    /// Expiry or skip: record, advance, maybe auto-start.
    fn complete_current(&mut self, record: SessionRecord) {
        let finished = record.phase;
        self.close_session(record.clone());
        self.emit(Event::SessionCompleted {
            record,
            at: self.clock.now(),
        });

        let transition = self.machine.complete(&self.settings);
        self.emit_transition(transition);
        self.persist_state();

        let message = match transition.to {
            Phase::ShortBreak => "Focus session complete. Time for a short break.",
            Phase::LongBreak => "Focus session complete. Time for a long break.",
            Phase::Focus => "Break over. Ready to focus.",
        };
        tracing::info!(?finished, next = ?transition.to, "session finished");
        self.notify(message, NotifyVariant::Success);

        let auto_start = if transition.to.is_break() {
            self.settings.auto_start_breaks
        } else {
            self.settings.auto_start_focus
        };
        if auto_start {
            if let Err(e) = self.begin_current_phase() {
                tracing::warn!(error = %e, "auto-start failed");
            }
        }
    }

    /// Stop: record, back to focus.
    fn abort_current(&mut self, record: SessionRecord, reason: ClearReason) {
        self.close_session(record.clone());
        self.emit(Event::SessionAborted {
            record,
            reason,
            at: self.clock.now(),
        });
        self.reset_phase();
        self.persist_state();
        self.notify("Session stopped.", NotifyVariant::Warning);
    }

    fn reset_phase(&mut self) {
        if let Some(transition) = self.machine.reset_to_focus() {
            self.emit_transition(transition);
        }
    }

    fn emit_transition(&mut self, transition: Transition) {
        self.emit(Event::PhaseChanged {
            from: transition.from,
            to: transition.to,
            session_index: transition.session_index,
            at: self.clock.now(),
        });
    }

    fn clear_snapshot(&self) {
        if let Err(e) = self.store.clear_snapshot() {
            tracing::error!(error = %e, "failed to delete running session snapshot");
        }
    }

    fn persist_state(&self) {
        if let Err(e) = self.store.save_state(
            self.machine.phase(),
            self.machine.session_index(),
            &self.sessions,
        ) {
            tracing::error!(error = %e, "failed to persist scheduler state");
        }
    }

    fn emit(&mut self, event: Event) {
        for observer in self.observers.iter_mut() {
            observer.on_event(&event);
        }
    }

    fn notify(&mut self, message: &str, variant: NotifyVariant) {
        if let Some(notifier) = self.notifier.as_mut() {
            notifier.notify(message, variant);
        }
    }
}

impl std::fmt::Debug for FocusScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FocusScheduler")
            .field("settings", &self.settings)
            .field("machine", &self.machine)
            .field("sessions", &self.sessions.len())
            .field("engine", &self.engine)
            .field("lock", &self.lock)
            .finish()
    }
}
