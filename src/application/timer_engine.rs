use crate::domain::clock::{
    duration_between, elapsed_seconds, format_duration, generate_id, local_time_of_day, today_in,
};
use crate::domain::models::{CustomCapture, TaskRecord, TimerSessionState, UNTITLED_TASK_NAME};
use crate::infrastructure::alerts::{AudioAlert, Notification, Notifier};
use crate::infrastructure::kv_store::KeyValueStore;
use crate::infrastructure::local_cache::LocalCache;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;

pub const INTERVAL_MINUTES: u64 = 30;
pub const INTERVAL_SECONDS: u64 = INTERVAL_MINUTES * 60;

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub elapsed_seconds: u64,
    /// Boundary (in minutes) whose reminder fired on this tick.
    pub reminder_minutes: Option<u64>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub is_running: bool,
    pub start_timestamp: Option<i64>,
    pub elapsed_seconds: u64,
    pub elapsed_display: String,
    pub task_name: String,
    pub task_notes: String,
    pub last_alert_minutes: u64,
    pub custom_capture: CustomCapture,
}

/// Stopwatch for a single session with 30-minute break reminders.
///
/// Elapsed time is always derived from the start timestamp, never counted
/// from ticks, so late or missed ticks cannot drift it. Every state change
/// rewrites the whole persisted session object; `stop` and `reset` remove it.
pub struct TimerEngine<K: KeyValueStore> {
    cache: Arc<LocalCache<K>>,
    notifier: Arc<dyn Notifier>,
    audio: Arc<dyn AudioAlert>,
    time_zone: Tz,
    now_provider: NowProvider,
    is_running: bool,
    start_timestamp: Option<i64>,
    elapsed_before_pause: u64,
    elapsed_seconds: u64,
    last_alert_minutes: u64,
    task_name: String,
    task_notes: String,
    custom_capture: CustomCapture,
}

impl<K: KeyValueStore> TimerEngine<K> {
    pub fn new(
        cache: Arc<LocalCache<K>>,
        notifier: Arc<dyn Notifier>,
        audio: Arc<dyn AudioAlert>,
        time_zone: Tz,
    ) -> Self {
        Self {
            cache,
            notifier,
            audio,
            time_zone,
            now_provider: Arc::new(Utc::now),
            is_running: false,
            start_timestamp: None,
            elapsed_before_pause: 0,
            elapsed_seconds: 0,
            last_alert_minutes: 0,
            task_name: String::new(),
            task_notes: String::new(),
            custom_capture: CustomCapture::default(),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    /// Rebuilds in-memory state from the persisted session.
    ///
    /// A running session gets its elapsed time recomputed from the start
    /// timestamp and its reminder marker set to the last boundary already
    /// passed, so nothing re-fires and the next boundary stays armed.
    pub fn restore(&mut self) {
        let saved = self.cache.timer_state();
        self.custom_capture = self.cache.custom_capture();
        self.task_name = saved.current_task_name;
        self.task_notes = saved.current_task_notes;

        match (saved.is_running, saved.start_timestamp) {
            (true, Some(start_timestamp)) => {
                let elapsed =
                    saved.elapsed_before_pause + elapsed_seconds(start_timestamp, self.now_ms());
                self.is_running = true;
                self.start_timestamp = Some(start_timestamp);
                self.elapsed_before_pause = saved.elapsed_before_pause;
                self.elapsed_seconds = elapsed;
                self.last_alert_minutes = (elapsed / INTERVAL_SECONDS) * INTERVAL_MINUTES;
                if let Err(error) = self.audio.initialize() {
                    tracing::warn!(error = %error, "audio alert initialization failed");
                }
                tracing::info!(
                    elapsed_seconds = elapsed,
                    last_alert_minutes = self.last_alert_minutes,
                    "restored running timer session"
                );
            }
            _ => {
                self.is_running = false;
                self.start_timestamp = None;
                self.elapsed_before_pause = 0;
                self.elapsed_seconds = saved.elapsed_before_pause;
                self.last_alert_minutes = 0;
            }
        }
    }

    /// Returns `false` when a session is already running.
    pub fn start(&mut self) -> bool {
        if self.is_running {
            tracing::warn!("start ignored: timer already running");
            return false;
        }

        self.is_running = true;
        self.start_timestamp = Some(self.now_ms());
        self.elapsed_before_pause = 0;
        self.elapsed_seconds = 0;
        self.last_alert_minutes = 0;
        self.custom_capture = CustomCapture::default();
        if let Err(error) = self.cache.clear_custom_capture() {
            tracing::error!(error = %error, "failed to clear custom capture");
        }

        if let Err(error) = self.audio.initialize() {
            tracing::warn!(error = %error, "audio alert initialization failed");
        }
        self.persist();
        self.notify(Notification::timer_started());
        tracing::info!(task_name = %self.task_name, "timer started");
        true
    }

    /// Advances a running session. The persisted session is re-read first,
    /// so a stop, reset, restart or draft edit made by another process is
    /// picked up instead of overwritten.
    pub fn tick(&mut self) -> TickOutcome {
        self.reload_persisted();
        let Some(start_timestamp) = self.start_timestamp.filter(|_| self.is_running) else {
            return TickOutcome {
                elapsed_seconds: self.elapsed_seconds,
                reminder_minutes: None,
            };
        };

        self.elapsed_seconds =
            self.elapsed_before_pause + elapsed_seconds(start_timestamp, self.now_ms());
        let reminder_minutes = self.check_reminder();
        self.persist();

        TickOutcome {
            elapsed_seconds: self.elapsed_seconds,
            reminder_minutes,
        }
    }

    /// Finalizes the running session into a record. No-op while idle.
    pub fn stop(&mut self) -> Option<TaskRecord> {
        if !self.is_running {
            return None;
        }
        let start_timestamp = self.start_timestamp?;
        let now_ms = self.now_ms();
        let measured = self.elapsed_before_pause + elapsed_seconds(start_timestamp, now_ms);
        let record = self.build_record(start_timestamp, now_ms, measured);

        self.is_running = false;
        self.start_timestamp = None;
        self.elapsed_before_pause = 0;
        self.elapsed_seconds = measured;
        self.task_name.clear();
        self.task_notes.clear();
        self.custom_capture = CustomCapture::default();
        self.clear_persisted();

        self.notify(Notification::timer_stopped(
            &record.task_name,
            &format_duration(record.duration),
        ));
        tracing::info!(
            task_id = %record.id,
            duration = record.duration,
            "timer stopped"
        );
        Some(record)
    }

    /// Abandons the session and drafts without producing a record.
    pub fn reset(&mut self) {
        self.is_running = false;
        self.start_timestamp = None;
        self.elapsed_before_pause = 0;
        self.elapsed_seconds = 0;
        self.last_alert_minutes = 0;
        self.task_name.clear();
        self.task_notes.clear();
        self.custom_capture = CustomCapture::default();
        self.clear_persisted();
        tracing::info!("timer reset");
    }

    pub fn set_task_name(&mut self, task_name: impl Into<String>) {
        self.task_name = task_name.into();
        self.persist();
    }

    pub fn set_task_notes(&mut self, task_notes: impl Into<String>) {
        self.task_notes = task_notes.into();
        self.persist();
    }

    pub fn set_custom_capture(&mut self, capture: CustomCapture) {
        if let Err(error) = self.cache.save_custom_capture(&capture) {
            tracing::error!(error = %error, "failed to persist custom capture");
        }
        self.custom_capture = capture;
    }

    pub fn clear_custom_capture(&mut self) {
        self.custom_capture = CustomCapture::default();
        if let Err(error) = self.cache.clear_custom_capture() {
            tracing::error!(error = %error, "failed to clear custom capture");
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    pub fn task_notes(&self) -> &str {
        &self.task_notes
    }

    pub fn last_alert_minutes(&self) -> u64 {
        self.last_alert_minutes
    }

    pub fn custom_capture(&self) -> &CustomCapture {
        &self.custom_capture
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            is_running: self.is_running,
            start_timestamp: self.start_timestamp,
            elapsed_seconds: self.elapsed_seconds,
            elapsed_display: format_duration(self.elapsed_seconds),
            task_name: self.task_name.clone(),
            task_notes: self.task_notes.clone(),
            last_alert_minutes: self.last_alert_minutes,
            custom_capture: self.custom_capture.clone(),
        }
    }

    fn now_ms(&self) -> i64 {
        (self.now_provider)().timestamp_millis()
    }

    fn check_reminder(&mut self) -> Option<u64> {
        let current_minutes = self.elapsed_seconds / 60;
        let alert_point = (current_minutes / INTERVAL_MINUTES) * INTERVAL_MINUTES;
        if alert_point == 0 || alert_point <= self.last_alert_minutes {
            return None;
        }

        self.last_alert_minutes = alert_point;
        if self.cache.preferences().sound_enabled {
            if let Err(error) = self.audio.play() {
                tracing::warn!(error = %error, "failed to play break reminder sound");
            }
        }
        self.notify(Notification::break_reminder(alert_point));
        tracing::info!(minutes = alert_point, "break reminder fired");
        Some(alert_point)
    }

    fn build_record(&self, start_timestamp: i64, now_ms: i64, measured: u64) -> TaskRecord {
        let task_name = self.task_name.trim();
        let task_name = if task_name.is_empty() {
            UNTITLED_TASK_NAME
        } else {
            task_name
        };

        let (date, start_time, end_time, duration) = match self.custom_capture.complete() {
            Some((date, start, end)) => {
                let duration = duration_between(date, start, end).unwrap_or_else(|| {
                    tracing::warn!(
                        date,
                        start,
                        end,
                        "custom times could not be parsed, using measured duration"
                    );
                    measured
                });
                (date.to_string(), start.to_string(), end.to_string(), duration)
            }
            None => {
                let now = DateTime::from_timestamp_millis(now_ms).unwrap_or_else(Utc::now);
                (
                    today_in(self.time_zone, now),
                    local_time_of_day(self.time_zone, start_timestamp),
                    local_time_of_day(self.time_zone, now_ms),
                    measured,
                )
            }
        };

        TaskRecord {
            id: generate_id(now_ms),
            date,
            task_name: task_name.to_string(),
            notes: self.task_notes.clone(),
            start_time,
            end_time,
            duration,
            created_at: now_ms,
        }
    }

    fn reload_persisted(&mut self) {
        let saved = self.cache.timer_state();
        let same_session = self.is_running
            && saved.is_running
            && saved.start_timestamp == self.start_timestamp;
        if same_session {
            self.elapsed_before_pause = saved.elapsed_before_pause;
            self.task_name = saved.current_task_name;
            self.task_notes = saved.current_task_notes;
            self.custom_capture = self.cache.custom_capture();
            return;
        }
        if self.is_running || saved.is_running {
            tracing::info!(
                was_running = self.is_running,
                now_running = saved.is_running,
                "timer session changed elsewhere, reloading"
            );
            self.restore();
        }
    }

    fn persist(&self) {
        let state = TimerSessionState {
            is_running: self.is_running,
            start_timestamp: self.start_timestamp,
            elapsed_before_pause: if self.is_running {
                self.elapsed_before_pause
            } else {
                self.elapsed_seconds
            },
            current_task_name: self.task_name.clone(),
            current_task_notes: self.task_notes.clone(),
        };
        if let Err(error) = self.cache.save_timer_state(&state) {
            tracing::error!(error = %error, "failed to persist timer state");
        }
    }

    fn clear_persisted(&self) {
        if let Err(error) = self.cache.clear_timer_state() {
            tracing::error!(error = %error, "failed to clear timer state");
        }
        if let Err(error) = self.cache.clear_custom_capture() {
            tracing::error!(error = %error, "failed to clear custom capture");
        }
    }

    fn notify(&self, notification: Notification) {
        if !self.notifier.is_permission_granted() {
            return;
        }
        if let Err(error) = self.notifier.show(&notification) {
            tracing::warn!(tag = %notification.tag, error = %error, "failed to show notification");
        }
    }
}
