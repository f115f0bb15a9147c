//! Typed access to the three persisted scheduler records.
//!
//! Reads never fail: missing keys, unreadable stores and corrupt JSON fall
//! back to defaults with a warning. Writes report their error to the caller.

use serde::{Deserialize, Serialize};

use super::{AppState, Phase, RunningSessionSnapshot, SessionRecord, Settings};
use crate::error::{CoreError, Result};
use crate::storage::KeyValueStore;

pub const RUNNING_SESSION_KEY: &str = "runningSession";
pub const STATE_KEY: &str = "state";
pub const SETTINGS_KEY: &str = "settings";

/// Borrowed view of [`AppState`] for writing without cloning the history.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AppStateRef<'a> {
    current_phase: Phase,
    #[serde(rename = "currentSession")]
    current_session_index: u32,
    sessions: &'a [SessionRecord],
}

pub struct SessionStore {
    kv: Box<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(kv: Box<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    fn read<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        let raw = match self.kv.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read persisted record; using default");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "corrupt persisted record; using default");
                None
            }
        }
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.kv.set(key, &json).map_err(CoreError::from)
    }

    /// Stored settings, or defaults when absent, corrupt or invalid.
    pub fn load_settings(&self) -> Settings {
        match self.read::<Settings>(SETTINGS_KEY) {
            Some(settings) => match settings.validate() {
                Ok(()) => settings,
                Err(e) => {
                    tracing::warn!(error = %e, "stored settings are invalid; using defaults");
                    Settings::default()
                }
            },
            None => Settings::default(),
        }
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.write(SETTINGS_KEY, settings)
    }

    pub fn load_state(&self) -> AppState {
        self.read(STATE_KEY).unwrap_or_default()
    }

    pub fn save_state(
        &self,
        current_phase: Phase,
        current_session_index: u32,
        sessions: &[SessionRecord],
    ) -> Result<()> {
        self.write(
            STATE_KEY,
            &AppStateRef {
                current_phase,
                current_session_index,
                sessions,
            },
        )
    }

    pub fn load_snapshot(&self) -> Option<RunningSessionSnapshot> {
        self.read(RUNNING_SESSION_KEY)
    }

    pub fn save_snapshot(&self, snapshot: &RunningSessionSnapshot) -> Result<()> {
        self.write(RUNNING_SESSION_KEY, snapshot)
    }

    pub fn clear_snapshot(&self) -> Result<()> {
        self.kv.remove(RUNNING_SESSION_KEY).map_err(CoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::storage::MemoryStore;

    /// Store whose every call fails.
    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> std::result::Result<Option<String>, StorageError> {
            Err(StorageError::QueryFailed("disk unavailable".into()))
        }

        fn set(&self, _key: &str, _value: &str) -> std::result::Result<(), StorageError> {
            Err(StorageError::QueryFailed("disk unavailable".into()))
        }

        fn remove(&self, _key: &str) -> std::result::Result<(), StorageError> {
            Err(StorageError::QueryFailed("disk unavailable".into()))
        }
    }

    fn store() -> (SessionStore, MemoryStore) {
        let kv = MemoryStore::new();
        (SessionStore::new(Box::new(kv.clone())), kv)
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let (store, _) = store();
        assert_eq!(store.load_settings(), Settings::default());
        assert_eq!(store.load_state(), AppState::default());
        assert!(store.load_snapshot().is_none());
    }

    #[test]
    fn corrupt_json_falls_back_to_defaults() {
        let (store, kv) = store();
        kv.set(SETTINGS_KEY, "{not json").unwrap();
        kv.set(STATE_KEY, "[]").unwrap();
        kv.set(RUNNING_SESSION_KEY, "{\"type\":\"nap\"}").unwrap();
        assert_eq!(store.load_settings(), Settings::default());
        assert_eq!(store.load_state(), AppState::default());
        assert!(store.load_snapshot().is_none());
    }

    #[test]
    fn read_errors_fall_back_and_write_errors_surface() {
        let store = SessionStore::new(Box::new(BrokenStore));
        assert_eq!(store.load_settings(), Settings::default());
        assert_eq!(store.load_state(), AppState::default());
        assert!(store.load_snapshot().is_none());

        assert!(matches!(
            store.save_settings(&Settings::default()),
            Err(CoreError::Storage(StorageError::QueryFailed(_)))
        ));
        assert!(store.save_state(Phase::Focus, 1, &[]).is_err());
        assert!(store.clear_snapshot().is_err());
    }

    #[test]
    fn invalid_settings_fall_back_to_defaults() {
        let (store, kv) = store();
        kv.set(SETTINGS_KEY, r#"{"focusDuration":0}"#).unwrap();
        assert_eq!(store.load_settings(), Settings::default());
    }

    #[test]
    fn partial_settings_fill_defaults() {
        let (store, kv) = store();
        kv.set(SETTINGS_KEY, r#"{"focusDuration":600,"lockScreenEnabled":true}"#)
            .unwrap();
        let settings = store.load_settings();
        assert_eq!(settings.focus_duration, 600);
        assert!(settings.lock_screen_enabled);
        assert_eq!(settings.sessions_until_long_break, 4);
    }

    #[test]
    fn state_roundtrip_uses_persisted_keys() {
        let (store, kv) = store();
        let record = SessionRecord {
            phase: Phase::Focus,
            start_time: Some(1),
            end_time: Some(1_500_001),
            expected_duration: Some(1500),
            actual_duration: 1500,
            completed: true,
            skipped: false,
            emergency_stop: false,
        };
        store
            .save_state(Phase::ShortBreak, 2, std::slice::from_ref(&record))
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&kv.get(STATE_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(raw["currentPhase"], "shortBreak");
        assert_eq!(raw["currentSession"], 2);
        assert_eq!(raw["sessions"][0]["emergencyStop"], false);

        let state = store.load_state();
        assert_eq!(state.current_phase, Phase::ShortBreak);
        assert_eq!(state.current_session_index, 2);
        assert_eq!(state.sessions, vec![record]);
    }

    #[test]
    fn snapshot_write_and_clear() {
        let (store, kv) = store();
        let snap = RunningSessionSnapshot {
            phase: Phase::LongBreak,
            duration: 900,
            start_time: 5,
            end_time: 900_005,
        };
        store.save_snapshot(&snap).unwrap();
        assert_eq!(store.load_snapshot(), Some(snap));
        store.clear_snapshot().unwrap();
        assert!(kv.get(RUNNING_SESSION_KEY).unwrap().is_none());
        store.clear_snapshot().unwrap();
    }
}
