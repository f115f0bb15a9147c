//! # Focuslock Core Library
//!
//! This library provides the core logic for the Focuslock focus/break timer.
//! It follows a CLI-first approach: every operation is available through the
//! standalone `focuslock` binary, which is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Phase Machine**: focus → short/long break → focus cycle with a
//!   session counter
//! - **Timer Engine**: a wall-clock countdown that requires the caller to
//!   periodically invoke `tick()`; it re-derives remaining time from the
//!   stored end timestamp so it never drifts
//! - **Session Persistence**: a running-session snapshot that lets a new
//!   process resume where the last one left off
//! - **Break Lock**: optional input lockdown during breaks with a single
//!   emergency exit
//! - **Stats**: pure aggregation over the session history
//! - **Storage**: SQLite key/value store for scheduler state and TOML for
//!   application configuration
//!
//! ## Key Components
//!
//! - [`FocusScheduler`]: context object tying the pieces together
//! - [`TimerEngine`]: countdown state machine
//! - [`LockEnforcer`]: break lock
//! - [`Database`]: persistent key/value store
//! - [`Config`]: application configuration management

pub mod clock;
pub mod error;
pub mod events;
pub mod lock;
pub mod scheduler;
pub mod session;
pub mod stats;
pub mod storage;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, OperationError, StorageError, ValidationError};
pub use events::{ClearReason, Event, Notifier, NotifyVariant, SessionObserver};
pub use lock::{Gesture, GestureVerdict, InputGuard, LockEnforcer, LogInputGuard};
pub use scheduler::{FocusScheduler, RestoreOutcome, StatusSnapshot};
pub use session::{AppState, Phase, RunningSessionSnapshot, SessionRecord, Settings};
pub use stats::{calculate_stats, calculate_stats_at, is_completed, Stats};
pub use storage::{Config, Database, KeyValueStore, MemoryStore};
pub use timer::{PhaseMachine, TimerEngine};
