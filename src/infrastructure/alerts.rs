use crate::infrastructure::error::InfraError;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

pub const TIMER_STATUS_TAG: &str = "timer-status";
pub const BREAK_REMINDER_TAG: &str = "break-reminder";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub tag: String,
    pub require_interaction: bool,
}

impl Notification {
    pub fn timer_started() -> Self {
        Self {
            title: "Timer Started!".to_string(),
            body: "Your task timer is now running.".to_string(),
            tag: TIMER_STATUS_TAG.to_string(),
            require_interaction: false,
        }
    }

    pub fn timer_stopped(task_name: &str, duration: &str) -> Self {
        let task_name = if task_name.trim().is_empty() { "Task" } else { task_name };
        Self {
            title: "Timer Stopped!".to_string(),
            body: format!("{task_name} completed - Duration: {duration}"),
            tag: TIMER_STATUS_TAG.to_string(),
            require_interaction: false,
        }
    }

    pub fn break_reminder(minutes: u64) -> Self {
        Self {
            title: format!("{minutes} Minutes Passed!"),
            body: "Take a quick break or switch task.".to_string(),
            tag: BREAK_REMINDER_TAG.to_string(),
            require_interaction: true,
        }
    }
}

/// Fire-and-forget user notifications.
pub trait Notifier: Send + Sync {
    fn is_permission_granted(&self) -> bool;
    fn request_permission(&self) -> bool;
    fn show(&self, notification: &Notification) -> Result<(), InfraError>;
}

/// Best-effort alert sound.
pub trait AudioAlert: Send + Sync {
    fn initialize(&self) -> Result<bool, InfraError>;
    fn play(&self) -> Result<(), InfraError>;
}

/// Emits notifications as structured log events. Permission mirrors the
/// persisted notification preference.
#[derive(Debug, Default)]
pub struct LogNotifier {
    granted: AtomicBool,
}

impl LogNotifier {
    pub fn new(granted: bool) -> Self {
        Self {
            granted: AtomicBool::new(granted),
        }
    }
}

impl Notifier for LogNotifier {
    fn is_permission_granted(&self) -> bool {
        self.granted.load(Ordering::Relaxed)
    }

    fn request_permission(&self) -> bool {
        self.granted.store(true, Ordering::Relaxed);
        true
    }

    fn show(&self, notification: &Notification) -> Result<(), InfraError> {
        if !self.is_permission_granted() {
            return Ok(());
        }
        tracing::info!(
            target: "tasktimer::notification",
            tag = %notification.tag,
            require_interaction = notification.require_interaction,
            body = %notification.body,
            "{}",
            notification.title
        );
        Ok(())
    }
}

/// Rings the terminal bell on stderr. Stays silent until initialized.
#[derive(Debug, Default)]
pub struct TerminalBell {
    initialized: AtomicBool,
}

impl TerminalBell {
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Relaxed)
    }
}

impl AudioAlert for TerminalBell {
    fn initialize(&self) -> Result<bool, InfraError> {
        let mut stderr = std::io::stderr();
        stderr.flush()?;
        self.initialized.store(true, Ordering::Relaxed);
        Ok(true)
    }

    fn play(&self) -> Result<(), InfraError> {
        if !self.is_initialized() {
            tracing::debug!("terminal bell not initialized, skipping");
            return Ok(());
        }
        let mut stderr = std::io::stderr();
        stderr.write_all(b"\x07")?;
        stderr.flush()?;
        Ok(())
    }
}
