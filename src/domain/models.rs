use crate::domain::clock::parse_time_of_day;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const UNTITLED_TASK_NAME: &str = "Untitled Task";

/// One completed timing session.
///
/// The local cache stores this exact shape as JSON (camelCase keys); the
/// remote adapter translates it to snake_case columns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,
    pub date: String,
    pub task_name: String,
    #[serde(default)]
    pub notes: String,
    pub start_time: String,
    pub end_time: String,
    pub duration: u64,
    pub created_at: i64,
}

impl TaskRecord {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "task.id")?;
        validate_date(&self.date, "task.date")?;
        validate_time_of_day(&self.start_time, "task.start_time")?;
        validate_time_of_day(&self.end_time, "task.end_time")?;
        if self.created_at < 0 {
            return Err("task.created_at must be >= 0".to_string());
        }
        Ok(())
    }
}

/// Partial update of a [`TaskRecord`]. `id` and `created_at` are immutable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecordPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl TaskRecordPatch {
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.task_name.is_none()
            && self.notes.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.duration.is_none()
    }

    pub fn apply_to(&self, record: &mut TaskRecord) {
        if let Some(date) = &self.date {
            record.date = date.clone();
        }
        if let Some(task_name) = &self.task_name {
            record.task_name = task_name.clone();
        }
        if let Some(notes) = &self.notes {
            record.notes = notes.clone();
        }
        if let Some(start_time) = &self.start_time {
            record.start_time = start_time.clone();
        }
        if let Some(end_time) = &self.end_time {
            record.end_time = end_time.clone();
        }
        if let Some(duration) = self.duration {
            record.duration = duration;
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(date) = &self.date {
            validate_date(date, "patch.date")?;
        }
        if let Some(start_time) = &self.start_time {
            validate_time_of_day(start_time, "patch.start_time")?;
        }
        if let Some(end_time) = &self.end_time {
            validate_time_of_day(end_time, "patch.end_time")?;
        }
        Ok(())
    }
}

/// Persisted shape of the in-progress session. Always written whole.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct TimerSessionState {
    pub is_running: bool,
    pub start_timestamp: Option<i64>,
    pub elapsed_before_pause: u64,
    pub current_task_name: String,
    pub current_task_notes: String,
}

impl Default for TimerSessionState {
    fn default() -> Self {
        Self {
            is_running: false,
            start_timestamp: None,
            elapsed_before_pause: 0,
            current_task_name: String::new(),
            current_task_notes: String::new(),
        }
    }
}

/// User-supplied date and times that replace the measured values on stop.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CustomCapture {
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

impl CustomCapture {
    /// Returns `(date, start, end)` only when all three are present and non-blank.
    pub fn complete(&self) -> Option<(&str, &str, &str)> {
        let date = non_blank(self.date.as_deref())?;
        let start = non_blank(self.start_time.as_deref())?;
        let end = non_blank(self.end_time.as_deref())?;
        Some((date, start, end))
    }

    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.start_time.is_none() && self.end_time.is_none()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub sound_enabled: bool,
    pub notification_enabled: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            notification_enabled: false,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

fn validate_date(value: &str, field_name: &str) -> Result<(), String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| format!("{field_name} must be YYYY-MM-DD"))
}

fn validate_time_of_day(value: &str, field_name: &str) -> Result<(), String> {
    parse_time_of_day(value)
        .map(|_| ())
        .ok_or_else(|| format!("{field_name} must look like 09:30 AM"))
}
