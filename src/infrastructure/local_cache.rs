use crate::domain::models::{CustomCapture, Preferences, TaskRecord, TaskRecordPatch, TimerSessionState};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::kv_store::KeyValueStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

pub const TASKS_KEY: &str = "tasktimer_tasks";
pub const TIMER_STATE_KEY: &str = "tasktimer_timer_state";
pub const CUSTOM_CAPTURE_KEY: &str = "tasktimer_custom_capture";
pub const SOUND_ENABLED_KEY: &str = "tasktimer_sound_enabled";
pub const NOTIFICATION_ENABLED_KEY: &str = "tasktimer_notification_enabled";

/// Typed view over the persisted keys.
///
/// Reads never fail: a missing, unreadable or malformed value yields the
/// documented default. Task-collection mutations run under a single writer
/// lock so concurrent read-modify-write sequences cannot drop each other.
pub struct LocalCache<K: KeyValueStore> {
    store: Arc<K>,
    write_guard: Mutex<()>,
}

impl<K: KeyValueStore> LocalCache<K> {
    pub fn new(store: Arc<K>) -> Self {
        Self {
            store,
            write_guard: Mutex::new(()),
        }
    }

    pub fn tasks(&self) -> Vec<TaskRecord> {
        self.read_json(TASKS_KEY).unwrap_or_default()
    }

    /// Inserts at the front so newest-first order holds without sorting.
    pub fn prepend_task(&self, record: &TaskRecord) -> Result<(), InfraError> {
        let _guard = self.lock_writer()?;
        let mut tasks = self.tasks();
        tasks.insert(0, record.clone());
        self.write_json(TASKS_KEY, &tasks)
    }

    pub fn update_task(
        &self,
        id: &str,
        patch: &TaskRecordPatch,
    ) -> Result<Option<TaskRecord>, InfraError> {
        let _guard = self.lock_writer()?;
        let mut tasks = self.tasks();
        let Some(record) = tasks.iter_mut().find(|record| record.id == id) else {
            return Ok(None);
        };
        patch.apply_to(record);
        let updated = record.clone();
        self.write_json(TASKS_KEY, &tasks)?;
        Ok(Some(updated))
    }

    /// Returns whether a record was removed; a missing id writes nothing.
    pub fn delete_task(&self, id: &str) -> Result<bool, InfraError> {
        let _guard = self.lock_writer()?;
        let mut tasks = self.tasks();
        let before = tasks.len();
        tasks.retain(|record| record.id != id);
        if tasks.len() == before {
            return Ok(false);
        }
        self.write_json(TASKS_KEY, &tasks)?;
        Ok(true)
    }

    pub fn timer_state(&self) -> TimerSessionState {
        self.read_json(TIMER_STATE_KEY).unwrap_or_default()
    }

    pub fn save_timer_state(&self, state: &TimerSessionState) -> Result<(), InfraError> {
        self.write_json(TIMER_STATE_KEY, state)
    }

    pub fn clear_timer_state(&self) -> Result<(), InfraError> {
        self.store.remove(TIMER_STATE_KEY)
    }

    pub fn custom_capture(&self) -> CustomCapture {
        self.read_json(CUSTOM_CAPTURE_KEY).unwrap_or_default()
    }

    pub fn save_custom_capture(&self, capture: &CustomCapture) -> Result<(), InfraError> {
        self.write_json(CUSTOM_CAPTURE_KEY, capture)
    }

    pub fn clear_custom_capture(&self) -> Result<(), InfraError> {
        self.store.remove(CUSTOM_CAPTURE_KEY)
    }

    pub fn preferences(&self) -> Preferences {
        Preferences {
            sound_enabled: self.read_flag(SOUND_ENABLED_KEY).as_deref() != Some("false"),
            notification_enabled: self.read_flag(NOTIFICATION_ENABLED_KEY).as_deref() == Some("true"),
        }
    }

    pub fn set_sound_enabled(&self, enabled: bool) -> Result<(), InfraError> {
        self.store.set(SOUND_ENABLED_KEY, enabled.to_string().as_bytes())
    }

    pub fn set_notification_enabled(&self, enabled: bool) -> Result<(), InfraError> {
        self.store
            .set(NOTIFICATION_ENABLED_KEY, enabled.to_string().as_bytes())
    }

    fn lock_writer(&self) -> Result<MutexGuard<'_, ()>, InfraError> {
        self.write_guard
            .lock()
            .map_err(|error| InfraError::LockPoisoned(format!("local cache writer: {error}")))
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key) {
            Ok(raw) => raw?,
            Err(error) => {
                tracing::warn!(key, error = %error, "failed to read local cache entry");
                return None;
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(key, error = %error, "malformed local cache entry, using default");
                None
            }
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), InfraError> {
        let payload = serde_json::to_vec(value)?;
        self.store.set(key, &payload)
    }

    fn read_flag(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(raw) => raw.map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string()),
            Err(error) => {
                tracing::warn!(key, error = %error, "failed to read preference flag");
                None
            }
        }
    }
}
