use crate::application::bootstrap::{bootstrap_workspace, BootstrapResult, WorkspaceLayout};
use crate::application::task_store::{PushReport, TaskStore};
use crate::application::timer_engine::{TickOutcome, TimerEngine, TimerSnapshot};
use crate::domain::clock::{parse_time_of_day, recompute_duration, today_in};
use crate::domain::models::{CustomCapture, Preferences, TaskRecord, TaskRecordPatch};
use crate::domain::summary::{daily_total, filter_records, period_stats, Period, PeriodStats};
use crate::infrastructure::alerts::{AudioAlert, LogNotifier, Notifier, TerminalBell};
use crate::infrastructure::config::{resolve_remote_settings, AppConfig};
use crate::infrastructure::credential_store::{CredentialStore, KeyringCredentialStore};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::kv_store::SqliteKeyValueStore;
use crate::infrastructure::local_cache::LocalCache;
use crate::infrastructure::remote_store::{
    PostgrestRemoteTaskStore, RemoteTaskStore, UnconfiguredRemoteTaskStore, REMOTE_SCHEMA_SQL,
};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

const TICK_INTERVAL: Duration = Duration::from_secs(1);

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct AppState {
    layout: WorkspaceLayout,
    config: AppConfig,
    time_zone: Tz,
    cache: Arc<LocalCache<SqliteKeyValueStore>>,
    tasks: TaskStore<SqliteKeyValueStore, dyn RemoteTaskStore>,
    remote_configured: bool,
    credentials: Arc<dyn CredentialStore>,
    notifier: Arc<LogNotifier>,
    audio: Arc<dyn AudioAlert>,
    now_provider: NowProvider,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        Self::from_lookup(
            workspace_root,
            |key| std::env::var(key).ok(),
            Arc::new(KeyringCredentialStore::default()),
        )
    }

    /// Resolves the remote store from `lookup` (environment), config and `credentials`.
    pub fn from_lookup<F>(
        workspace_root: PathBuf,
        lookup: F,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, InfraError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let remote = build_remote_store(&bootstrap.config, lookup, credentials.as_ref());
        Self::assemble(bootstrap, remote, credentials)
    }

    pub fn with_remote(
        workspace_root: PathBuf,
        remote: Arc<dyn RemoteTaskStore>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        Self::assemble(bootstrap, Some(remote), credentials)
    }

    fn assemble(
        bootstrap: BootstrapResult,
        remote: Option<Arc<dyn RemoteTaskStore>>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, InfraError> {
        let BootstrapResult { layout, config } = bootstrap;
        let time_zone = config.time_zone()?;
        let cache = Arc::new(LocalCache::new(Arc::new(SqliteKeyValueStore::new(
            &layout.database_path,
        ))));

        let remote_configured = remote.is_some();
        let remote: Arc<dyn RemoteTaskStore> = match remote {
            Some(remote) => remote,
            None => {
                tracing::info!("remote store not configured, working from local cache");
                Arc::new(UnconfiguredRemoteTaskStore)
            }
        };
        let audio: Arc<dyn AudioAlert> = Arc::new(TerminalBell::default());
        let notifier = Arc::new(LogNotifier::new(cache.preferences().notification_enabled));

        Ok(Self {
            layout,
            config,
            time_zone,
            tasks: TaskStore::new(Arc::clone(&cache), remote),
            cache,
            remote_configured,
            credentials,
            notifier,
            audio,
            now_provider: Arc::new(Utc::now),
        })
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn is_remote_configured(&self) -> bool {
        self.remote_configured
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        tracing::error!(command, error = %error, "command failed");
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        tracing::info!(command, "{message}");
    }

    fn timer_engine(&self) -> TimerEngine<SqliteKeyValueStore> {
        let notifier: Arc<dyn Notifier> = self.notifier.clone();
        let mut engine = TimerEngine::new(
            Arc::clone(&self.cache),
            notifier,
            Arc::clone(&self.audio),
            self.time_zone,
        )
        .with_now_provider(Arc::clone(&self.now_provider));
        engine.restore();
        engine
    }

    fn today(&self) -> (String, NaiveDate) {
        let now = (self.now_provider)();
        (
            today_in(self.time_zone, now),
            now.with_timezone(&self.time_zone).date_naive(),
        )
    }
}

fn build_remote_store<F>(
    config: &AppConfig,
    lookup: F,
    credentials: &dyn CredentialStore,
) -> Option<Arc<dyn RemoteTaskStore>>
where
    F: Fn(&str) -> Option<String>,
{
    let settings = resolve_remote_settings(config, lookup, credentials)?;
    match PostgrestRemoteTaskStore::new(&settings.url, &settings.table, settings.api_key) {
        Ok(store) => {
            let store: Arc<dyn RemoteTaskStore> = Arc::new(store);
            Some(store)
        }
        Err(error) => {
            tracing::error!(error = %error, "invalid remote settings, working from local cache");
            None
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StartTimerResponse {
    pub started: bool,
    pub timer: TimerSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskListResponse {
    pub today: String,
    pub today_total_seconds: u64,
    pub tasks: Vec<TaskRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct EditTaskInput {
    pub task_name: Option<String>,
    pub notes: Option<String>,
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub duration: Option<u64>,
}

#[derive(Debug, Clone)]
pub enum WatchEvent {
    Tick {
        outcome: TickOutcome,
        timer: TimerSnapshot,
    },
    Refresh {
        task_count: usize,
        today_total_seconds: u64,
    },
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct WatchReport {
    pub ticks: u64,
    pub refreshes: u64,
    pub reminders: Vec<u64>,
}

pub fn start_timer_impl(
    state: &AppState,
    task_name: Option<String>,
    task_notes: Option<String>,
) -> StartTimerResponse {
    let mut engine = state.timer_engine();
    if !engine.is_running() {
        if let Some(task_name) = task_name {
            engine.set_task_name(task_name.trim());
        }
        if let Some(task_notes) = task_notes {
            engine.set_task_notes(task_notes);
        }
    }

    let started = engine.start();
    if !started {
        state.log_info("start_timer", "timer already running");
    }
    StartTimerResponse {
        started,
        timer: engine.snapshot(),
    }
}

pub fn timer_status_impl(state: &AppState) -> TimerSnapshot {
    state.timer_engine().snapshot()
}

pub fn set_task_name_impl(state: &AppState, task_name: String) -> TimerSnapshot {
    let mut engine = state.timer_engine();
    engine.set_task_name(task_name);
    engine.snapshot()
}

pub fn set_task_notes_impl(state: &AppState, task_notes: String) -> TimerSnapshot {
    let mut engine = state.timer_engine();
    engine.set_task_notes(task_notes);
    engine.snapshot()
}

/// Fields left as `None` keep their previously captured value.
pub fn set_custom_capture_impl(
    state: &AppState,
    date: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
) -> Result<TimerSnapshot, InfraError> {
    let date = optional_trimmed(date);
    let start_time = optional_trimmed(start_time);
    let end_time = optional_trimmed(end_time);
    if let Some(date) = &date {
        parse_date_input(date, "date")?;
    }
    if let Some(start_time) = &start_time {
        parse_time_input(start_time, "start")?;
    }
    if let Some(end_time) = &end_time {
        parse_time_input(end_time, "end")?;
    }

    let mut engine = state.timer_engine();
    let current = engine.custom_capture().clone();
    engine.set_custom_capture(CustomCapture {
        date: date.or(current.date),
        start_time: start_time.or(current.start_time),
        end_time: end_time.or(current.end_time),
    });
    state.log_info("set_custom_capture", "updated custom capture");
    Ok(engine.snapshot())
}

pub fn clear_custom_capture_impl(state: &AppState) -> TimerSnapshot {
    let mut engine = state.timer_engine();
    engine.clear_custom_capture();
    engine.snapshot()
}

/// Stops the running session and saves the resulting record.
pub async fn stop_timer_impl(state: &AppState) -> Option<TaskRecord> {
    let mut engine = state.timer_engine();
    let Some(record) = engine.stop() else {
        state.log_info("stop_timer", "timer not running");
        return None;
    };
    state.tasks.save(&record).await;
    Some(record)
}

pub fn reset_timer_impl(state: &AppState) -> TimerSnapshot {
    let mut engine = state.timer_engine();
    engine.reset();
    engine.snapshot()
}

/// Drives the engine once per second and refreshes the task list on the
/// configured interval until `for_seconds` elapses or Ctrl-C is received.
pub async fn watch_impl<F>(
    state: &AppState,
    for_seconds: Option<u64>,
    mut on_event: F,
) -> WatchReport
where
    F: FnMut(WatchEvent),
{
    let mut engine = state.timer_engine();
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut refresher =
        tokio::time::interval(Duration::from_secs(state.config.refresh_interval_seconds()));
    refresher.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let deadline = for_seconds.map(|seconds| Instant::now() + Duration::from_secs(seconds));

    let mut report = WatchReport::default();
    loop {
        let until_deadline = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = until_deadline => break,
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let outcome = engine.tick();
                report.ticks += 1;
                if let Some(minutes) = outcome.reminder_minutes {
                    report.reminders.push(minutes);
                }
                on_event(WatchEvent::Tick { outcome, timer: engine.snapshot() });
            }
            _ = refresher.tick() => {
                let records = state.tasks.list().await;
                let (today, _) = state.today();
                report.refreshes += 1;
                on_event(WatchEvent::Refresh {
                    task_count: records.len(),
                    today_total_seconds: daily_total(&records, &today),
                });
            }
        }
    }

    state.log_info(
        "watch",
        &format!("watch ended after {} ticks, {} refreshes", report.ticks, report.refreshes),
    );
    report
}

pub async fn list_tasks_impl(
    state: &AppState,
    search: Option<String>,
    date: Option<String>,
) -> Result<TaskListResponse, InfraError> {
    let date = optional_trimmed(date);
    if let Some(date) = &date {
        parse_date_input(date, "date")?;
    }

    let records = state.tasks.list().await;
    let (today, _) = state.today();
    let today_total_seconds = daily_total(&records, &today);
    let tasks = filter_records(&records, search.as_deref(), date.as_deref());
    Ok(TaskListResponse {
        today,
        today_total_seconds,
        tasks,
    })
}

/// Changing start or end without an explicit duration recomputes the
/// duration from the edited times (0 when they cannot be parsed).
pub async fn edit_task_impl(
    state: &AppState,
    task_id: String,
    input: EditTaskInput,
) -> Result<TaskRecord, InfraError> {
    let task_id = required_task_id(&task_id)?;
    let mut patch = TaskRecordPatch {
        date: optional_trimmed(input.date),
        task_name: optional_trimmed(input.task_name),
        notes: input.notes,
        start_time: optional_trimmed(input.start_time),
        end_time: optional_trimmed(input.end_time),
        duration: input.duration,
    };
    if patch.is_empty() {
        return Err(InfraError::InvalidInput("nothing to update".to_string()));
    }
    patch.validate().map_err(InfraError::InvalidInput)?;

    let Some(mut current) = state
        .tasks
        .list()
        .await
        .into_iter()
        .find(|record| record.id == task_id)
    else {
        return Err(InfraError::InvalidInput(format!("task not found: {task_id}")));
    };

    if patch.duration.is_none() && (patch.start_time.is_some() || patch.end_time.is_some()) {
        let mut edited = current.clone();
        patch.apply_to(&mut edited);
        patch.duration = Some(recompute_duration(
            &edited.date,
            &edited.start_time,
            &edited.end_time,
        ));
    }

    let updated = match state.tasks.update(task_id, &patch).await {
        Some(updated) => updated,
        None => {
            patch.apply_to(&mut current);
            current
        }
    };
    state.log_info("edit_task", &format!("updated task_id={task_id}"));
    Ok(updated)
}

pub async fn delete_task_impl(state: &AppState, task_id: String) -> Result<bool, InfraError> {
    let task_id = required_task_id(&task_id)?;
    let removed = state.tasks.delete(task_id).await;
    state.log_info(
        "delete_task",
        &format!("deleted task_id={task_id} local_removed={removed}"),
    );
    Ok(removed)
}

pub async fn summary_impl(state: &AppState, period: Period) -> PeriodStats {
    let records = state.tasks.list().await;
    let (_, today) = state.today();
    period_stats(&records, period, today)
}

pub async fn push_local_impl(state: &AppState) -> Result<PushReport, InfraError> {
    if !state.remote_configured {
        return Err(InfraError::RemoteUnconfigured);
    }
    state.tasks.push_local().await
}

pub fn set_sound_enabled_impl(state: &AppState, enabled: bool) -> Result<Preferences, InfraError> {
    state.cache.set_sound_enabled(enabled)?;
    if enabled {
        if let Err(error) = state.audio.initialize() {
            tracing::warn!(error = %error, "audio alert initialization failed");
        }
    }
    state.log_info("set_sound_enabled", &format!("sound_enabled={enabled}"));
    Ok(state.cache.preferences())
}

/// Enabling asks the notifier for permission and stores whether it was granted.
pub fn set_notifications_enabled_impl(
    state: &AppState,
    enabled: bool,
) -> Result<Preferences, InfraError> {
    let granted = enabled && state.notifier.request_permission();
    state.cache.set_notification_enabled(granted)?;
    state.log_info(
        "set_notifications_enabled",
        &format!("notification_enabled={granted}"),
    );
    Ok(state.cache.preferences())
}

pub fn set_remote_key_impl(state: &AppState, api_key: String) -> Result<(), InfraError> {
    let api_key = api_key.trim();
    if api_key.is_empty() {
        return Err(InfraError::InvalidInput("api key must not be empty".to_string()));
    }
    state.credentials.save_api_key(api_key)?;
    state.log_info("set_remote_key", "stored remote api key");
    Ok(())
}

pub fn clear_remote_key_impl(state: &AppState) -> Result<(), InfraError> {
    state.credentials.delete_api_key()?;
    state.log_info("clear_remote_key", "removed remote api key");
    Ok(())
}

pub fn remote_schema_impl() -> &'static str {
    REMOTE_SCHEMA_SQL
}

fn optional_trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required_task_id(task_id: &str) -> Result<&str, InfraError> {
    let task_id = task_id.trim();
    if task_id.is_empty() {
        return Err(InfraError::InvalidInput("task_id must not be empty".to_string()));
    }
    Ok(task_id)
}

fn parse_date_input(value: &str, field_name: &str) -> Result<NaiveDate, InfraError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|error| {
        InfraError::InvalidInput(format!("{field_name} must be YYYY-MM-DD: {error}"))
    })
}

fn parse_time_input(value: &str, field_name: &str) -> Result<(), InfraError> {
    parse_time_of_day(value).map(|_| ()).ok_or_else(|| {
        InfraError::InvalidInput(format!("{field_name} must look like 09:30 AM, got '{value}'"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::credential_store::InMemoryCredentialStore;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
    use std::sync::Mutex;

    static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

    const T0: i64 = 1_771_236_000_000; // 2026-02-16T10:00:00Z

    #[derive(Debug, Default)]
    struct FakeRemoteTaskStore {
        rows: Mutex<Vec<TaskRecord>>,
    }

    #[async_trait]
    impl RemoteTaskStore for FakeRemoteTaskStore {
        async fn list(&self) -> Result<Vec<TaskRecord>, InfraError> {
            let mut rows = self.rows.lock().expect("rows lock").clone();
            rows.sort_by(|left, right| right.created_at.cmp(&left.created_at));
            Ok(rows)
        }

        async fn insert(&self, record: &TaskRecord) -> Result<(), InfraError> {
            let mut rows = self.rows.lock().expect("rows lock");
            if !rows.iter().any(|row| row.id == record.id) {
                rows.push(record.clone());
            }
            Ok(())
        }

        async fn update(&self, id: &str, patch: &TaskRecordPatch) -> Result<(), InfraError> {
            let mut rows = self.rows.lock().expect("rows lock");
            if let Some(row) = rows.iter_mut().find(|row| row.id == id) {
                patch.apply_to(row);
            }
            Ok(())
        }

        async fn delete(&self, id: &str) -> Result<(), InfraError> {
            self.rows.lock().expect("rows lock").retain(|row| row.id != id);
            Ok(())
        }
    }

    /// Answers with the rows as they were, but only after a delay.
    struct SlowListRemote {
        inner: Arc<FakeRemoteTaskStore>,
        delay: Duration,
    }

    #[async_trait]
    impl RemoteTaskStore for SlowListRemote {
        async fn list(&self) -> Result<Vec<TaskRecord>, InfraError> {
            let rows = self.inner.list().await?;
            tokio::time::sleep(self.delay).await;
            Ok(rows)
        }

        async fn insert(&self, record: &TaskRecord) -> Result<(), InfraError> {
            self.inner.insert(record).await
        }

        async fn update(&self, id: &str, patch: &TaskRecordPatch) -> Result<(), InfraError> {
            self.inner.update(id, patch).await
        }

        async fn delete(&self, id: &str) -> Result<(), InfraError> {
            self.inner.delete(id).await
        }
    }

    struct TempWorkspace {
        path: PathBuf,
        clock: Arc<AtomicI64>,
    }

    impl TempWorkspace {
        fn new() -> Self {
            let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "tasktimer-command-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp workspace");
            Self {
                path,
                clock: Arc::new(AtomicI64::new(T0)),
            }
        }

        fn now_provider(&self) -> NowProvider {
            let clock = Arc::clone(&self.clock);
            Arc::new(move || {
                DateTime::from_timestamp_millis(clock.load(Ordering::SeqCst)).expect("valid clock")
            })
        }

        fn offline_state(&self) -> AppState {
            AppState::from_lookup(
                self.path.clone(),
                |_| None,
                Arc::new(InMemoryCredentialStore::default()),
            )
            .expect("initialize app state")
            .with_now_provider(self.now_provider())
        }

        fn online_state(&self, remote: Arc<FakeRemoteTaskStore>) -> AppState {
            AppState::with_remote(
                self.path.clone(),
                remote,
                Arc::new(InMemoryCredentialStore::default()),
            )
            .expect("initialize app state")
            .with_now_provider(self.now_provider())
        }

        fn advance_seconds(&self, seconds: i64) {
            self.clock.fetch_add(seconds * 1000, Ordering::SeqCst);
        }
    }

    impl Drop for TempWorkspace {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[tokio::test]
    async fn timer_session_survives_separate_invocations() {
        let workspace = TempWorkspace::new();

        let started = start_timer_impl(
            &workspace.offline_state(),
            Some("  Write docs ".to_string()),
            None,
        );
        assert!(started.started);
        assert_eq!(started.timer.task_name, "Write docs");

        workspace.advance_seconds(95);
        let status = timer_status_impl(&workspace.offline_state());
        assert!(status.is_running);
        assert_eq!(status.elapsed_seconds, 95);
        assert_eq!(status.elapsed_display, "00:01:35");

        let again = start_timer_impl(&workspace.offline_state(), Some("other".to_string()), None);
        assert!(!again.started);
        assert_eq!(again.timer.task_name, "Write docs");

        let record = stop_timer_impl(&workspace.offline_state())
            .await
            .expect("record saved");
        assert_eq!(record.duration, 95);
        assert_eq!(record.task_name, "Write docs");

        let state = workspace.offline_state();
        assert!(!timer_status_impl(&state).is_running);
        let listed = list_tasks_impl(&state, None, None).await.expect("list");
        assert_eq!(listed.tasks, vec![record]);
        assert_eq!(listed.today, "2026-02-16");
        assert_eq!(listed.today_total_seconds, 95);
    }

    #[tokio::test]
    async fn stop_while_idle_saves_nothing() {
        let workspace = TempWorkspace::new();
        let state = workspace.offline_state();
        assert_eq!(stop_timer_impl(&state).await, None);
        let listed = list_tasks_impl(&state, None, None).await.expect("list");
        assert!(listed.tasks.is_empty());
    }

    #[tokio::test]
    async fn custom_capture_is_merged_and_used_on_stop() {
        let workspace = TempWorkspace::new();
        start_timer_impl(&workspace.offline_state(), None, None);

        set_custom_capture_impl(
            &workspace.offline_state(),
            Some("2026-02-15".to_string()),
            Some("11:30 PM".to_string()),
            None,
        )
        .expect("partial capture");
        let snapshot = set_custom_capture_impl(
            &workspace.offline_state(),
            None,
            None,
            Some("12:15 AM".to_string()),
        )
        .expect("complete capture");
        assert_eq!(snapshot.custom_capture.date.as_deref(), Some("2026-02-15"));

        let record = stop_timer_impl(&workspace.offline_state())
            .await
            .expect("record saved");
        assert_eq!(record.task_name, "Untitled Task");
        assert_eq!(record.date, "2026-02-15");
        assert_eq!(record.duration, 2700);
    }

    #[test]
    fn custom_capture_rejects_malformed_input() {
        let workspace = TempWorkspace::new();
        let state = workspace.offline_state();
        assert!(matches!(
            set_custom_capture_impl(&state, Some("15/02/2026".to_string()), None, None),
            Err(InfraError::InvalidInput(_))
        ));
        assert!(matches!(
            set_custom_capture_impl(&state, None, Some("lunchtime".to_string()), None),
            Err(InfraError::InvalidInput(_))
        ));
    }

    #[test]
    fn reset_discards_running_session() {
        let workspace = TempWorkspace::new();
        start_timer_impl(&workspace.offline_state(), Some("Abandon".to_string()), None);
        workspace.advance_seconds(30);

        let snapshot = reset_timer_impl(&workspace.offline_state());
        assert!(!snapshot.is_running);
        assert_eq!(snapshot.elapsed_seconds, 0);
        assert!(!timer_status_impl(&workspace.offline_state()).is_running);
    }

    #[test]
    fn drafts_persist_while_idle() {
        let workspace = TempWorkspace::new();
        set_task_name_impl(&workspace.offline_state(), "Plan sprint".to_string());
        set_task_notes_impl(&workspace.offline_state(), "with the team".to_string());

        let status = timer_status_impl(&workspace.offline_state());
        assert_eq!(status.task_name, "Plan sprint");
        assert_eq!(status.task_notes, "with the team");
    }

    #[tokio::test]
    async fn edit_recomputes_duration_from_new_times() {
        let workspace = TempWorkspace::new();
        let remote = Arc::new(FakeRemoteTaskStore::default());
        start_timer_impl(&workspace.online_state(Arc::clone(&remote)), None, None);
        workspace.advance_seconds(60);
        let record = stop_timer_impl(&workspace.online_state(Arc::clone(&remote)))
            .await
            .expect("record saved");

        let state = workspace.online_state(Arc::clone(&remote));
        let edited = edit_task_impl(
            &state,
            record.id.clone(),
            EditTaskInput {
                start_time: Some("09:00 AM".to_string()),
                end_time: Some("10:30 AM".to_string()),
                ..EditTaskInput::default()
            },
        )
        .await
        .expect("edit");
        assert_eq!(edited.duration, 5400);
        assert_eq!(remote.rows.lock().expect("rows lock")[0].duration, 5400);

        let explicit = edit_task_impl(
            &state,
            record.id.clone(),
            EditTaskInput {
                end_time: Some("11:00 AM".to_string()),
                duration: Some(42),
                ..EditTaskInput::default()
            },
        )
        .await
        .expect("edit with explicit duration");
        assert_eq!(explicit.duration, 42);
    }

    #[tokio::test]
    async fn edit_rejects_unknown_id_and_empty_patch() {
        let workspace = TempWorkspace::new();
        let state = workspace.offline_state();
        let empty = edit_task_impl(&state, "x".to_string(), EditTaskInput::default()).await;
        assert!(matches!(empty, Err(InfraError::InvalidInput(_))));

        let missing = edit_task_impl(
            &state,
            "missing".to_string(),
            EditTaskInput {
                task_name: Some("Renamed".to_string()),
                ..EditTaskInput::default()
            },
        )
        .await;
        match missing {
            Err(InfraError::InvalidInput(message)) => assert!(message.contains("missing")),
            other => panic!("expected invalid input, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_missing_task_is_not_an_error() {
        let workspace = TempWorkspace::new();
        let state = workspace.offline_state();
        assert!(!delete_task_impl(&state, "missing".to_string())
            .await
            .expect("delete"));
        assert!(delete_task_impl(&state, "  ".to_string()).await.is_err());
    }

    #[tokio::test]
    async fn list_filters_by_search_and_validates_date() {
        let workspace = TempWorkspace::new();
        start_timer_impl(&workspace.offline_state(), Some("Review PR".to_string()), None);
        workspace.advance_seconds(10);
        stop_timer_impl(&workspace.offline_state()).await;
        start_timer_impl(&workspace.offline_state(), Some("Lunch".to_string()), None);
        workspace.advance_seconds(10);
        stop_timer_impl(&workspace.offline_state()).await;

        let state = workspace.offline_state();
        let listed = list_tasks_impl(&state, Some("review".to_string()), None)
            .await
            .expect("list");
        assert_eq!(listed.tasks.len(), 1);
        assert_eq!(listed.today_total_seconds, 20);
        assert!(list_tasks_impl(&state, None, Some("yesterday".to_string()))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn summary_covers_todays_records() {
        let workspace = TempWorkspace::new();
        start_timer_impl(&workspace.offline_state(), Some("Focus".to_string()), None);
        workspace.advance_seconds(600);
        stop_timer_impl(&workspace.offline_state()).await;

        let stats = summary_impl(&workspace.offline_state(), Period::Today).await;
        assert_eq!(stats.total_seconds, 600);
        assert_eq!(stats.task_count, 1);
    }

    #[tokio::test]
    async fn push_requires_configured_remote() {
        let workspace = TempWorkspace::new();
        let offline = workspace.offline_state();
        assert!(!offline.is_remote_configured());
        assert!(matches!(
            push_local_impl(&offline).await,
            Err(InfraError::RemoteUnconfigured)
        ));

        start_timer_impl(&offline, None, None);
        workspace.advance_seconds(5);
        stop_timer_impl(&workspace.offline_state()).await;

        let remote = Arc::new(FakeRemoteTaskStore::default());
        let report = push_local_impl(&workspace.online_state(Arc::clone(&remote)))
            .await
            .expect("push");
        assert_eq!(report.pushed, 1);
        assert_eq!(remote.rows.lock().expect("rows lock").len(), 1);
    }

    #[test]
    fn preferences_toggle_and_persist() {
        let workspace = TempWorkspace::new();
        let state = workspace.offline_state();
        let preferences = set_sound_enabled_impl(&state, false).expect("disable sound");
        assert!(!preferences.sound_enabled);

        let preferences = set_notifications_enabled_impl(&state, true).expect("enable notifications");
        assert!(preferences.notification_enabled);

        let reloaded = workspace.offline_state();
        assert!(reloaded.notifier.is_permission_granted());
        let preferences =
            set_notifications_enabled_impl(&reloaded, false).expect("disable notifications");
        assert!(!preferences.notification_enabled);
    }

    #[test]
    fn remote_key_is_stored_in_credentials() {
        let workspace = TempWorkspace::new();
        let state = workspace.offline_state();
        assert!(set_remote_key_impl(&state, "  ".to_string()).is_err());
        set_remote_key_impl(&state, " anon-key ".to_string()).expect("store key");
        assert_eq!(
            state.credentials.load_api_key().expect("load key"),
            Some("anon-key".to_string())
        );
        clear_remote_key_impl(&state).expect("clear key");
        assert_eq!(state.credentials.load_api_key().expect("load key"), None);
    }

    #[test]
    fn environment_configures_remote_store() {
        let workspace = TempWorkspace::new();
        let state = AppState::from_lookup(
            workspace.path.clone(),
            |key| match key {
                "SUPABASE_URL" => Some("https://example.supabase.co".to_string()),
                "SUPABASE_ANON_KEY" => Some("anon-key".to_string()),
                _ => None,
            },
            Arc::new(InMemoryCredentialStore::default()),
        )
        .expect("initialize app state");
        assert!(state.is_remote_configured());

        let invalid = AppState::from_lookup(
            workspace.path.clone(),
            |key| match key {
                "SUPABASE_URL" => Some("not a url".to_string()),
                "SUPABASE_ANON_KEY" => Some("anon-key".to_string()),
                _ => None,
            },
            Arc::new(InMemoryCredentialStore::default()),
        )
        .expect("initialize app state");
        assert!(!invalid.is_remote_configured());
    }

    #[tokio::test]
    async fn watch_runs_until_deadline() {
        let workspace = TempWorkspace::new();
        let state = AppState::from_lookup(
            workspace.path.clone(),
            |_| None,
            Arc::new(InMemoryCredentialStore::default()),
        )
        .expect("initialize app state");
        start_timer_impl(&state, Some("Watched".to_string()), None);

        let mut events = Vec::new();
        let report = watch_impl(&state, Some(1), |event| events.push(event)).await;
        assert!(report.ticks >= 1);
        assert!(report.refreshes >= 1);
        assert!(report.reminders.is_empty());
        assert!(events
            .iter()
            .any(|event| matches!(event, WatchEvent::Tick { timer, .. } if timer.is_running)));
        assert!(timer_status_impl(&state).is_running);
    }

    #[tokio::test]
    async fn watcher_tick_does_not_undo_commands_from_other_invocations() {
        let workspace = TempWorkspace::new();
        start_timer_impl(&workspace.offline_state(), Some("Watched".to_string()), None);
        let watcher_state = workspace.offline_state();
        let mut watcher = watcher_state.timer_engine();

        workspace.advance_seconds(30);
        watcher.tick();
        set_task_name_impl(&workspace.offline_state(), "Renamed".to_string());
        workspace.advance_seconds(1);
        watcher.tick();
        assert_eq!(timer_status_impl(&workspace.offline_state()).task_name, "Renamed");

        workspace.advance_seconds(29);
        let record = stop_timer_impl(&workspace.offline_state())
            .await
            .expect("first stop saves");
        assert_eq!(record.task_name, "Renamed");
        assert_eq!(record.duration, 60);

        workspace.advance_seconds(1);
        watcher.tick();
        assert!(!timer_status_impl(&workspace.offline_state()).is_running);
        assert_eq!(stop_timer_impl(&workspace.offline_state()).await, None);

        let listed = list_tasks_impl(&workspace.offline_state(), None, None)
            .await
            .expect("list");
        assert_eq!(listed.tasks, vec![record]);
    }

    #[tokio::test]
    async fn refresh_racing_a_delete_does_not_restore_the_record() {
        let workspace = TempWorkspace::new();
        start_timer_impl(&workspace.offline_state(), Some("Local only".to_string()), None);
        workspace.advance_seconds(10);
        let record = stop_timer_impl(&workspace.offline_state())
            .await
            .expect("record saved");

        let remote = Arc::new(FakeRemoteTaskStore::default());
        let refresher = AppState::with_remote(
            workspace.path.clone(),
            Arc::new(SlowListRemote {
                inner: Arc::clone(&remote),
                delay: Duration::from_millis(50),
            }),
            Arc::new(InMemoryCredentialStore::default()),
        )
        .expect("initialize app state")
        .with_now_provider(workspace.now_provider());
        let deleter = workspace.offline_state();

        let (listed, deleted) = tokio::join!(list_tasks_impl(&refresher, None, None), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            delete_task_impl(&deleter, record.id.clone()).await
        });
        assert!(deleted.expect("delete"));
        assert!(listed.expect("list").tasks.is_empty());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(remote.rows.lock().expect("rows lock").is_empty());
        let local = list_tasks_impl(&workspace.offline_state(), None, None)
            .await
            .expect("list");
        assert!(local.tasks.is_empty());
    }

    #[test]
    fn remote_schema_defines_tasks_table() {
        let schema = remote_schema_impl();
        assert!(schema.contains("tasks"));
        assert!(schema.contains("created_at"));
    }
}
