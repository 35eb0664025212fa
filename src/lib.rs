pub mod application;
pub mod domain;
pub mod infrastructure;

use application::commands::{
    clear_custom_capture_impl, clear_remote_key_impl, delete_task_impl, edit_task_impl,
    list_tasks_impl, push_local_impl, remote_schema_impl, reset_timer_impl,
    set_custom_capture_impl, set_notifications_enabled_impl, set_remote_key_impl,
    set_sound_enabled_impl, set_task_name_impl, set_task_notes_impl, start_timer_impl,
    stop_timer_impl, summary_impl, timer_status_impl, watch_impl, AppState, EditTaskInput,
    WatchEvent,
};
use application::timer_engine::TimerSnapshot;
use clap::{Parser, Subcommand, ValueEnum};
use domain::clock::format_duration;
use domain::models::{Preferences, TaskRecord};
use domain::summary::{Period, PeriodStats};
use serde::Serialize;
use std::path::PathBuf;

/// Task timer with 30-minute break reminders and local-first task history.
#[derive(Debug, Parser)]
#[command(name = "tasktimer", version, about)]
pub struct Cli {
    /// Workspace directory (defaults to TASKTIMER_HOME or the platform data dir).
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start timing a task.
    Start {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Show the current session.
    Status,
    /// Set the name of the current task.
    Name { text: String },
    /// Set notes for the current task.
    Notes { text: String },
    /// Override date and times recorded when the timer stops.
    Capture {
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        /// Drop any captured values instead.
        #[arg(long, conflicts_with_all = ["date", "start", "end"])]
        clear: bool,
    },
    /// Stop the timer and save the task.
    Stop,
    /// Discard the current session without saving.
    Reset,
    /// Keep the timer ticking in the foreground, firing break reminders.
    Watch {
        #[arg(long)]
        for_seconds: Option<u64>,
    },
    /// List saved tasks, newest first.
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        date: Option<String>,
    },
    /// Edit a saved task.
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        /// Duration in seconds; recomputed from start/end when omitted.
        #[arg(long)]
        duration: Option<u64>,
    },
    /// Delete a saved task.
    Delete { id: String },
    /// Totals for a period.
    Summary {
        #[arg(long, value_enum, default_value = "today")]
        period: PeriodArg,
    },
    /// Copy tasks that only exist locally to the remote store.
    Push,
    /// Turn the break reminder sound on or off.
    Sound { state: Toggle },
    /// Turn notifications on or off.
    Notifications { state: Toggle },
    /// Store the remote API key in the OS keyring.
    SetRemoteKey { key: String },
    /// Remove the stored remote API key.
    ClearRemoteKey,
    /// Print the SQL that creates the remote tasks table.
    RemoteSchema,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PeriodArg {
    Today,
    Week,
    Month,
    All,
}

impl From<PeriodArg> for Period {
    fn from(value: PeriodArg) -> Self {
        match value {
            PeriodArg::Today => Self::Today,
            PeriodArg::Week => Self::Week,
            PeriodArg::Month => Self::Month,
            PeriodArg::All => Self::All,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    fn enabled(self) -> bool {
        matches!(self, Self::On)
    }
}

/// Runs one command against the workspace at `workspace_root`.
pub async fn run(cli: Cli, workspace_root: PathBuf) -> Result<(), String> {
    let state = AppState::new(workspace_root).map_err(|error| error.to_string())?;
    let json = cli.json;

    match cli.command {
        Command::Start { name, notes } => {
            let response = start_timer_impl(&state, name, notes);
            if json {
                return print_json(&response);
            }
            if !response.started {
                println!("Timer already running.");
            }
            print_timer(&response.timer);
            Ok(())
        }
        Command::Status => emit(json, &timer_status_impl(&state), print_timer),
        Command::Name { text } => emit(json, &set_task_name_impl(&state, text), print_timer),
        Command::Notes { text } => emit(json, &set_task_notes_impl(&state, text), print_timer),
        Command::Capture {
            date,
            start,
            end,
            clear,
        } => {
            let snapshot = if clear {
                clear_custom_capture_impl(&state)
            } else {
                set_custom_capture_impl(&state, date, start, end)
                    .map_err(|error| state.command_error("capture", &error))?
            };
            emit(json, &snapshot, print_timer)
        }
        Command::Stop => match stop_timer_impl(&state).await {
            Some(record) => emit(json, &record, |record| {
                println!("Saved:");
                print_record(record);
            }),
            None => emit(json, &Option::<TaskRecord>::None, |_| {
                println!("Timer is not running.")
            }),
        },
        Command::Reset => emit(json, &reset_timer_impl(&state), print_timer),
        Command::Watch { for_seconds } => {
            let report = watch_impl(&state, for_seconds, |event| {
                if json {
                    return;
                }
                match event {
                    WatchEvent::Tick { outcome, timer } => {
                        if let Some(minutes) = outcome.reminder_minutes {
                            println!("{minutes} minutes passed. Take a quick break or switch task.");
                        }
                        if timer.is_running && outcome.elapsed_seconds % 60 == 0 {
                            println!("{} {}", timer.elapsed_display, display_name(&timer.task_name));
                        }
                    }
                    WatchEvent::Refresh {
                        task_count,
                        today_total_seconds,
                    } => {
                        tracing::debug!(task_count, today_total_seconds, "task list refreshed");
                    }
                }
            })
            .await;
            emit(json, &report, |report| {
                println!(
                    "Watched {} ticks, {} reminders.",
                    report.ticks,
                    report.reminders.len()
                )
            })
        }
        Command::List { search, date } => {
            let response = list_tasks_impl(&state, search, date)
                .await
                .map_err(|error| state.command_error("list_tasks", &error))?;
            emit(json, &response, |response| {
                println!(
                    "Today ({}): {}",
                    response.today,
                    format_duration(response.today_total_seconds)
                );
                for record in &response.tasks {
                    print_record(record);
                }
            })
        }
        Command::Edit {
            id,
            name,
            notes,
            date,
            start,
            end,
            duration,
        } => {
            let input = EditTaskInput {
                task_name: name,
                notes,
                date,
                start_time: start,
                end_time: end,
                duration,
            };
            let record = edit_task_impl(&state, id, input)
                .await
                .map_err(|error| state.command_error("edit_task", &error))?;
            emit(json, &record, print_record)
        }
        Command::Delete { id } => {
            let removed = delete_task_impl(&state, id)
                .await
                .map_err(|error| state.command_error("delete_task", &error))?;
            emit(json, &removed, |removed| {
                if *removed {
                    println!("Deleted.");
                } else {
                    println!("No local task with that id; remote delete attempted.");
                }
            })
        }
        Command::Summary { period } => {
            let stats = summary_impl(&state, period.into()).await;
            emit(json, &stats, print_stats)
        }
        Command::Push => {
            let report = push_local_impl(&state)
                .await
                .map_err(|error| state.command_error("push_local", &error))?;
            emit(json, &report, |report| {
                println!(
                    "Pushed {}, failed {}, already remote {}.",
                    report.pushed, report.failed, report.already_remote
                )
            })
        }
        Command::Sound { state: toggle } => {
            let preferences = set_sound_enabled_impl(&state, toggle.enabled())
                .map_err(|error| state.command_error("set_sound_enabled", &error))?;
            emit(json, &preferences, print_preferences)
        }
        Command::Notifications { state: toggle } => {
            let preferences = set_notifications_enabled_impl(&state, toggle.enabled())
                .map_err(|error| state.command_error("set_notifications_enabled", &error))?;
            emit(json, &preferences, print_preferences)
        }
        Command::SetRemoteKey { key } => {
            set_remote_key_impl(&state, key)
                .map_err(|error| state.command_error("set_remote_key", &error))?;
            println!("Remote API key stored.");
            Ok(())
        }
        Command::ClearRemoteKey => {
            clear_remote_key_impl(&state)
                .map_err(|error| state.command_error("clear_remote_key", &error))?;
            println!("Remote API key removed.");
            Ok(())
        }
        Command::RemoteSchema => {
            print!("{}", remote_schema_impl());
            Ok(())
        }
    }
}

fn emit<T, F>(json: bool, value: &T, human: F) -> Result<(), String>
where
    T: Serialize,
    F: FnOnce(&T),
{
    if json {
        return print_json(value);
    }
    human(value);
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), String> {
    let formatted = serde_json::to_string_pretty(value).map_err(|error| error.to_string())?;
    println!("{formatted}");
    Ok(())
}

fn display_name(task_name: &str) -> &str {
    if task_name.trim().is_empty() {
        "(untitled)"
    } else {
        task_name
    }
}

fn print_timer(timer: &TimerSnapshot) {
    let status = if timer.is_running { "running" } else { "idle" };
    println!(
        "{} [{status}] {}",
        timer.elapsed_display,
        display_name(&timer.task_name)
    );
    if !timer.task_notes.is_empty() {
        println!("  notes: {}", timer.task_notes);
    }
    if let Some((date, start, end)) = timer.custom_capture.complete() {
        println!("  recorded as {date} {start} - {end}");
    }
}

fn print_record(record: &TaskRecord) {
    println!(
        "{}  {}  {} - {}  {}  {}",
        record.id,
        record.date,
        record.start_time,
        record.end_time,
        format_duration(record.duration),
        record.task_name
    );
    if !record.notes.is_empty() {
        println!("    {}", record.notes);
    }
}

fn print_stats(stats: &PeriodStats) {
    println!(
        "Total {} over {} tasks ({} days)",
        format_duration(stats.total_seconds),
        stats.task_count,
        stats.distinct_days
    );
    println!(
        "Average per task {}, per day {}",
        format_duration(stats.average_task_seconds.round() as u64),
        format_duration(stats.average_day_seconds.round() as u64)
    );
    for record in &stats.top_tasks {
        print_record(record);
    }
}

fn print_preferences(preferences: &Preferences) {
    println!(
        "sound: {}, notifications: {}",
        on_off(preferences.sound_enabled),
        on_off(preferences.notification_enabled)
    );
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}
