//! Integration tests for the focus scheduler.
//!
//! Drives full focus/break cycles through a manual clock, simulates process
//! restarts by building a second scheduler over the same store, and covers
//! the forced-break lock including its emergency exit, and checks that a
//! failing store never undoes an in-memory transition.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use focuslock_core::session::{RUNNING_SESSION_KEY, SETTINGS_KEY, STATE_KEY};
use focuslock_core::{
    CoreError, Database, Event, FocusScheduler, Gesture, GestureVerdict, KeyValueStore, LockEnforcer,
    LogInputGuard, ManualClock, MemoryStore, Notifier, NotifyVariant, OperationError, Phase,
    RestoreOutcome, Settings, StorageError,
};

const T0: u64 = 1_700_000_000_000;

fn quick_settings() -> Settings {
    Settings {
        focus_duration: 60,
        short_break_duration: 10,
        long_break_duration: 30,
        ..Settings::default()
    }
}

fn scheduler_over(clock: &ManualClock, kv: &MemoryStore) -> FocusScheduler {
    FocusScheduler::new(Box::new(clock.clone()), Box::new(kv.clone()))
}

fn locking_scheduler(clock: &ManualClock, kv: &MemoryStore) -> FocusScheduler {
    let mut scheduler = scheduler_over(clock, kv)
        .with_lock_enforcer(LockEnforcer::new(Box::new(LogInputGuard::default())));
    scheduler
        .update_settings(Settings {
            lock_screen_enabled: true,
            ..quick_settings()
        })
        .unwrap();
    scheduler
}

fn recorded_events(scheduler: &mut FocusScheduler) -> Rc<RefCell<Vec<Event>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    scheduler.subscribe(Box::new(move |event: &Event| sink.borrow_mut().push(event.clone())));
    events
}

/// Memory store whose reads, writes and deletes can be switched to fail.
#[derive(Clone, Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_get: Arc<AtomicBool>,
    fail_set: Arc<AtomicBool>,
    fail_remove: Arc<AtomicBool>,
}

impl FlakyStore {
    fn fail_writes(&self, fail: bool) {
        self.fail_set.store(fail, Ordering::SeqCst);
        self.fail_remove.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool) -> Result<(), StorageError> {
        if flag.load(Ordering::SeqCst) {
            Err(StorageError::QueryFailed("disk I/O error".into()))
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Self::check(&self.fail_get)?;
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        Self::check(&self.fail_set)?;
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        Self::check(&self.fail_remove)?;
        self.inner.remove(key)
    }
}

fn flaky_scheduler(clock: &ManualClock, kv: &FlakyStore) -> FocusScheduler {
    FocusScheduler::new(Box::new(clock.clone()), Box::new(kv.clone()))
}

#[derive(Clone, Default)]
struct RecordingNotifier(Rc<RefCell<Vec<(String, NotifyVariant)>>>);

impl Notifier for RecordingNotifier {
    fn notify(&mut self, message: &str, variant: NotifyVariant) {
        self.0.borrow_mut().push((message.to_string(), variant));
    }
}

/// Start the current phase and let it run out.
fn run_to_completion(scheduler: &mut FocusScheduler, clock: &ManualClock) {
    scheduler.start().unwrap();
    let total = scheduler.status().total.unwrap();
    clock.advance_secs(total);
    assert!(scheduler.tick().is_some());
}

#[test]
fn test_full_cycle_earns_long_break_after_fourth_focus() {
    let clock = ManualClock::new(T0);
    let kv = MemoryStore::new();
    let mut scheduler = scheduler_over(&clock, &kv);
    scheduler.update_settings(quick_settings()).unwrap();
    let events = recorded_events(&mut scheduler);

    for _ in 0..8 {
        run_to_completion(&mut scheduler, &clock);
    }

    let phases: Vec<Phase> = events
        .borrow()
        .iter()
        .filter_map(|e| match e {
            Event::PhaseChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            Phase::ShortBreak,
            Phase::Focus,
            Phase::ShortBreak,
            Phase::Focus,
            Phase::ShortBreak,
            Phase::Focus,
            Phase::LongBreak,
            Phase::Focus,
        ]
    );
    assert_eq!(scheduler.session_index(), 5);
    assert_eq!(scheduler.sessions().len(), 8);
    assert!(scheduler.sessions().iter().all(|r| r.completed));

    let stats = scheduler.stats();
    assert_eq!(stats.completed_sessions, 8);
    assert_eq!(stats.current_streak, 4);
    assert_eq!(stats.total_focus_time, 4);
}

#[test]
fn test_ticks_report_remaining_from_wall_clock() {
    let clock = ManualClock::new(T0);
    let kv = MemoryStore::new();
    let mut scheduler = scheduler_over(&clock, &kv);
    let events = recorded_events(&mut scheduler);

    scheduler.start().unwrap();
    clock.advance_ms(1_000);
    scheduler.tick();
    // Process stalled for ten minutes between ticks.
    clock.advance_ms(600_000);
    scheduler.tick();

    let remaining: Vec<u64> = events
        .borrow()
        .iter()
        .filter_map(|e| match e {
            Event::SessionTicked { remaining, .. } => Some(*remaining),
            _ => None,
        })
        .collect();
    assert_eq!(remaining, vec![1499, 899]);
}

#[test]
fn test_restore_resumes_with_original_duration() {
    let clock = ManualClock::new(T0);
    let kv = MemoryStore::new();
    {
        let mut first = scheduler_over(&clock, &kv);
        first.start().unwrap();
        clock.advance_secs(1000);
        first.tick();
    }

    let mut second = scheduler_over(&clock, &kv);
    assert_eq!(
        second.restore(),
        RestoreOutcome::Resumed {
            phase: Phase::Focus,
            remaining_secs: 500,
        }
    );
    assert!(second.is_running());
    assert_eq!(second.status().remaining, Some(500));

    clock.advance_secs(500);
    let record = second.tick().unwrap();
    assert_eq!(record.expected_duration, Some(1500));
    assert_eq!(record.start_time, Some(T0));
    assert_eq!(record.actual_duration, 1500);
    assert!(record.completed);
    assert_eq!(second.phase(), Phase::ShortBreak);
    assert!(kv.get(RUNNING_SESSION_KEY).unwrap().is_none());
}

#[test]
fn test_expired_snapshot_is_discarded_unrecorded() {
    let clock = ManualClock::new(T0);
    let kv = MemoryStore::new();
    {
        let mut first = scheduler_over(&clock, &kv);
        first.start().unwrap();
    }
    clock.advance_secs(2000);

    let mut second = scheduler_over(&clock, &kv);
    let events = recorded_events(&mut second);
    assert_eq!(
        second.restore(),
        RestoreOutcome::Expired {
            phase: Phase::Focus
        }
    );
    assert!(second.sessions().is_empty());
    assert!(!second.is_running());
    assert!(kv.get(RUNNING_SESSION_KEY).unwrap().is_none());
    assert!(matches!(
        events.borrow().as_slice(),
        [Event::SnapshotExpired { .. }]
    ));

    // Nothing left to resume.
    assert_eq!(scheduler_over(&clock, &kv).restore(), RestoreOutcome::Idle);
}

#[test]
fn test_restored_break_reengages_lock() {
    let clock = ManualClock::new(T0);
    let kv = MemoryStore::new();
    {
        let mut first = locking_scheduler(&clock, &kv);
        run_to_completion(&mut first, &clock);
        first.start().unwrap();
        assert!(first.is_locked());
    }
    clock.advance_secs(4);

    let mut second = locking_scheduler_without_reset(&clock, &kv);
    assert_eq!(
        second.restore(),
        RestoreOutcome::Resumed {
            phase: Phase::ShortBreak,
            remaining_secs: 6,
        }
    );
    assert!(second.is_locked());
    assert!(second.start().is_err());
}

/// Lock-capable scheduler that keeps whatever settings are stored.
fn locking_scheduler_without_reset(clock: &ManualClock, kv: &MemoryStore) -> FocusScheduler {
    scheduler_over(clock, kv).with_lock_enforcer(LockEnforcer::new(Box::new(LogInputGuard::default())))
}

#[test]
fn test_controls_rejected_while_locked() {
    let clock = ManualClock::new(T0);
    let kv = MemoryStore::new();
    let mut scheduler = locking_scheduler(&clock, &kv);
    run_to_completion(&mut scheduler, &clock);
    scheduler.start().unwrap();

    for result in [
        scheduler.start().map(|_| ()),
        scheduler.skip().map(|_| ()),
        scheduler.stop().map(|_| ()),
    ] {
        assert!(matches!(
            result,
            Err(CoreError::Operation(OperationError::ControlsLocked))
        ));
    }
    assert!(scheduler.is_running());
    assert_eq!(scheduler.sessions().len(), 1);
}

#[test]
fn test_emergency_stop_during_locked_break() {
    let clock = ManualClock::new(T0);
    let kv = MemoryStore::new();
    let mut scheduler = locking_scheduler(&clock, &kv);
    run_to_completion(&mut scheduler, &clock);
    scheduler.start().unwrap();
    clock.advance_secs(3);

    let verdict = scheduler.handle_gesture(Gesture::CloseWindow);
    assert_eq!(verdict, GestureVerdict::Blocked);
    assert!(scheduler.is_locked());

    let verdict = scheduler.handle_gesture(Gesture::EmergencyStop);
    assert_eq!(verdict, GestureVerdict::EmergencyStop);

    assert!(!scheduler.is_locked());
    assert!(!scheduler.is_running());
    assert_eq!(scheduler.phase(), Phase::Focus);
    assert_eq!(scheduler.sessions().len(), 2);
    let record = &scheduler.sessions()[1];
    assert!(record.emergency_stop);
    assert!(!record.completed);
    assert_eq!(record.phase, Phase::ShortBreak);
    assert_eq!(record.actual_duration, 3);
    assert!(kv.get(RUNNING_SESSION_KEY).unwrap().is_none());

    // Controls are back.
    scheduler.start().unwrap();
    assert_eq!(scheduler.status().phase, Phase::Focus);
}

#[test]
fn test_emergency_stop_with_stale_lock_records_once() {
    let clock = ManualClock::new(T0);
    let kv = MemoryStore::new();
    let mut lock = LockEnforcer::new(Box::new(LogInputGuard::default()));
    lock.engage(Phase::LongBreak, T0, 30);
    let mut scheduler = scheduler_over(&clock, &kv).with_lock_enforcer(lock);
    assert!(scheduler.is_locked());
    assert!(!scheduler.is_running());
    clock.advance_secs(12);

    let record = scheduler.emergency_stop().unwrap();
    assert!(record.emergency_stop);
    assert_eq!(record.phase, Phase::LongBreak);
    assert_eq!(record.start_time, Some(T0));
    assert_eq!(record.expected_duration, Some(30));
    assert_eq!(record.actual_duration, 12);
    assert_eq!(scheduler.sessions().len(), 1);
    assert!(!scheduler.is_locked());

    // Idempotent.
    assert!(scheduler.emergency_stop().is_none());
    assert_eq!(scheduler.sessions().len(), 1);
}

#[test]
fn test_emergency_stop_when_idle_is_safe() {
    let clock = ManualClock::new(T0);
    let kv = MemoryStore::new();
    let mut scheduler = scheduler_over(&clock, &kv);
    assert!(scheduler.emergency_stop().is_none());
    assert!(scheduler.sessions().is_empty());
    assert_eq!(scheduler.phase(), Phase::Focus);
}

#[test]
fn test_skip_advances_but_stop_does_not() {
    let clock = ManualClock::new(T0);
    let kv = MemoryStore::new();
    let mut scheduler = scheduler_over(&clock, &kv);
    scheduler.update_settings(quick_settings()).unwrap();

    scheduler.start().unwrap();
    clock.advance_secs(20);
    let skipped = scheduler.skip().unwrap();
    assert!(skipped.skipped);
    assert!(!skipped.completed);
    assert_eq!(scheduler.phase(), Phase::ShortBreak);
    assert_eq!(scheduler.session_index(), 2);

    scheduler.start().unwrap();
    clock.advance_secs(2);
    scheduler.stop().unwrap();
    assert_eq!(scheduler.phase(), Phase::Focus);
    assert_eq!(scheduler.session_index(), 2);
    assert_eq!(scheduler.sessions().len(), 2);

    let stats = scheduler.stats();
    assert_eq!(stats.completed_sessions, 0);
    assert_eq!(stats.early_stops, 2);
}

#[test]
fn test_state_survives_restart() {
    let clock = ManualClock::new(T0);
    let kv = MemoryStore::new();
    {
        let mut first = scheduler_over(&clock, &kv);
        first.update_settings(quick_settings()).unwrap();
        run_to_completion(&mut first, &clock);
    }

    let second = scheduler_over(&clock, &kv);
    assert_eq!(second.settings(), &quick_settings());
    assert_eq!(second.phase(), Phase::ShortBreak);
    assert_eq!(second.session_index(), 2);
    assert_eq!(second.sessions().len(), 1);
}

#[test]
fn test_database_backed_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("focuslock.db");
    let clock = ManualClock::new(T0);
    {
        let db = Database::open_at(&path).unwrap();
        let mut scheduler = FocusScheduler::new(Box::new(clock.clone()), Box::new(db));
        scheduler.start().unwrap();
    }
    clock.advance_secs(300);

    let db = Database::open_at(&path).unwrap();
    let mut scheduler = FocusScheduler::new(Box::new(clock.clone()), Box::new(db));
    assert_eq!(
        scheduler.restore(),
        RestoreOutcome::Resumed {
            phase: Phase::Focus,
            remaining_secs: 1200,
        }
    );
    assert_eq!(scheduler.clear_history().unwrap(), 0);
}

#[test]
fn test_history_clear_persists() {
    let clock = ManualClock::new(T0);
    let kv = MemoryStore::new();
    {
        let mut first = scheduler_over(&clock, &kv);
        first.update_settings(quick_settings()).unwrap();
        run_to_completion(&mut first, &clock);
        run_to_completion(&mut first, &clock);
        assert_eq!(first.clear_history().unwrap(), 2);
    }
    let second = scheduler_over(&clock, &kv);
    assert!(second.sessions().is_empty());
    assert_eq!(second.session_index(), 2);
}

#[test]
fn test_snapshot_left_by_failed_delete_is_not_resumed() {
    let clock = ManualClock::new(T0);
    let kv = FlakyStore::default();
    {
        let mut first = flaky_scheduler(&clock, &kv);
        first.start().unwrap();
        clock.advance_secs(100);
        kv.fail_remove.store(true, Ordering::SeqCst);
        let record = first.stop().unwrap().unwrap();
        assert_eq!(record.start_time, Some(T0));
        assert_eq!(first.sessions().len(), 1);
    }
    assert!(kv.inner.get(RUNNING_SESSION_KEY).unwrap().is_some());
    kv.fail_remove.store(false, Ordering::SeqCst);

    let mut second = flaky_scheduler(&clock, &kv);
    let events = recorded_events(&mut second);
    assert_eq!(second.restore(), RestoreOutcome::Idle);
    assert!(!second.is_running());
    assert!(events.borrow().is_empty());
    assert!(kv.inner.get(RUNNING_SESSION_KEY).unwrap().is_none());

    second.stop().unwrap();
    assert_eq!(second.sessions().len(), 1);
    assert_eq!(flaky_scheduler(&clock, &kv).restore(), RestoreOutcome::Idle);
}

#[test]
fn test_unreadable_store_starts_from_defaults() {
    let clock = ManualClock::new(T0);
    let kv = FlakyStore::default();
    {
        let mut first = flaky_scheduler(&clock, &kv);
        first.update_settings(quick_settings()).unwrap();
        run_to_completion(&mut first, &clock);
        first.start().unwrap();
    }
    assert!(kv.inner.get(SETTINGS_KEY).unwrap().is_some());
    kv.fail_get.store(true, Ordering::SeqCst);

    let mut second = flaky_scheduler(&clock, &kv);
    assert_eq!(second.settings(), &Settings::default());
    assert_eq!(second.phase(), Phase::Focus);
    assert_eq!(second.session_index(), 1);
    assert!(second.sessions().is_empty());
    assert_eq!(second.restore(), RestoreOutcome::Idle);
    assert!(!second.is_running());
}

#[test]
fn test_write_failures_keep_transitions() {
    let clock = ManualClock::new(T0);
    let kv = FlakyStore::default();
    let mut scheduler = flaky_scheduler(&clock, &kv)
        .with_lock_enforcer(LockEnforcer::new(Box::new(LogInputGuard::default())));
    scheduler
        .update_settings(Settings {
            lock_screen_enabled: true,
            ..quick_settings()
        })
        .unwrap();
    kv.fail_writes(true);

    assert!(matches!(
        scheduler.update_settings(quick_settings()),
        Err(CoreError::Storage(StorageError::QueryFailed(_)))
    ));
    assert!(scheduler.settings().lock_screen_enabled);

    scheduler.start().unwrap();
    assert!(scheduler.is_running());
    assert!(kv.inner.get(RUNNING_SESSION_KEY).unwrap().is_none());

    clock.advance_secs(60);
    let record = scheduler.tick().unwrap();
    assert!(record.completed);
    assert!(!scheduler.is_running());
    assert_eq!(scheduler.phase(), Phase::ShortBreak);
    assert_eq!(scheduler.session_index(), 2);

    scheduler.start().unwrap();
    assert!(scheduler.is_locked());
    clock.advance_secs(10);
    assert!(scheduler.tick().is_some());
    assert!(!scheduler.is_locked());
    assert_eq!(scheduler.phase(), Phase::Focus);

    scheduler.start().unwrap();
    clock.advance_secs(5);
    let stopped = scheduler.stop().unwrap().unwrap();
    assert_eq!(stopped.actual_duration, 5);
    assert!(!scheduler.is_running());

    scheduler.start().unwrap();
    let aborted = scheduler.emergency_stop().unwrap();
    assert!(aborted.emergency_stop);
    assert!(!scheduler.is_running());
    assert_eq!(scheduler.sessions().len(), 4);
    assert!(kv.inner.get(STATE_KEY).unwrap().is_none());

    // The next successful write carries the whole history.
    kv.fail_writes(false);
    scheduler.start().unwrap();
    scheduler.skip().unwrap();
    let restarted = flaky_scheduler(&clock, &kv);
    assert_eq!(restarted.sessions().len(), 5);
    assert_eq!(restarted.phase(), Phase::ShortBreak);
}

#[test]
fn test_idle_stops_keep_phase_and_stay_quiet() {
    let clock = ManualClock::new(T0);
    let kv = MemoryStore::new();
    let notifier = RecordingNotifier::default();
    let mut scheduler = scheduler_over(&clock, &kv).with_notifier(Box::new(notifier.clone()));
    scheduler.update_settings(quick_settings()).unwrap();
    run_to_completion(&mut scheduler, &clock);
    assert_eq!(scheduler.phase(), Phase::ShortBreak);
    notifier.0.borrow_mut().clear();
    let events = recorded_events(&mut scheduler);

    assert_eq!(scheduler.stop().unwrap(), None);
    assert!(scheduler.emergency_stop().is_none());

    assert_eq!(scheduler.phase(), Phase::ShortBreak);
    assert_eq!(scheduler.session_index(), 2);
    assert_eq!(scheduler.sessions().len(), 1);
    assert!(notifier.0.borrow().is_empty());
    assert!(events.borrow().is_empty());
    assert_eq!(scheduler_over(&clock, &kv).phase(), Phase::ShortBreak);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Start,
        Advance(u64),
        Skip,
        Stop,
        Emergency,
        Gesture(Gesture),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Start),
            (1u64..90).prop_map(Op::Advance),
            Just(Op::Skip),
            Just(Op::Stop),
            Just(Op::Emergency),
            prop_oneof![
                Just(Gesture::CloseTab),
                Just(Gesture::QuitApp),
                Just(Gesture::EmergencyStop),
            ]
            .prop_map(Op::Gesture),
        ]
    }

    proptest! {
        #[test]
        fn history_grows_by_at_most_one_per_action(
            ops in prop::collection::vec(op(), 1..60),
            lock_screen in any::<bool>(),
        ) {
            let clock = ManualClock::new(T0);
            let kv = MemoryStore::new();
            let mut scheduler = scheduler_over(&clock, &kv)
                .with_lock_enforcer(LockEnforcer::new(Box::new(LogInputGuard::default())));
            scheduler
                .update_settings(Settings { lock_screen_enabled: lock_screen, ..quick_settings() })
                .unwrap();

            for op in ops {
                let before = scheduler.sessions().len();
                let was_running = scheduler.is_running();
                let phase_before = scheduler.phase();
                match op {
                    Op::Start => { let _ = scheduler.start(); }
                    Op::Advance(secs) => {
                        clock.advance_secs(secs);
                        scheduler.tick();
                    }
                    Op::Skip => { let _ = scheduler.skip(); }
                    Op::Stop => { let _ = scheduler.stop(); }
                    Op::Emergency => {
                        scheduler.emergency_stop();
                        prop_assert_eq!(scheduler.sessions().len(), before + usize::from(was_running));
                        let expected = if was_running { Phase::Focus } else { phase_before };
                        prop_assert_eq!(scheduler.phase(), expected);
                    }
                    Op::Gesture(g) => { scheduler.handle_gesture(g); }
                }
                let after = scheduler.sessions().len();
                prop_assert!(after >= before);
                prop_assert!(after <= before + 1);
                prop_assert_eq!(
                    scheduler.is_running(),
                    kv.get(RUNNING_SESSION_KEY).unwrap().is_some()
                );
                prop_assert!(!scheduler.is_locked() || scheduler.is_running());
                prop_assert!(scheduler.session_index() >= 1);
            }
        }
    }
}
