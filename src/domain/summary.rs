use crate::domain::models::TaskRecord;
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::collections::HashSet;

const TOP_TASK_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Today,
    Week,
    Month,
    All,
}

impl Period {
    /// First calendar day included in the period; weeks start on Sunday.
    fn start(self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Today => Some(today),
            Self::Week => {
                Some(today - Duration::days(i64::from(today.weekday().num_days_from_sunday())))
            }
            Self::Month => today.with_day(1),
            Self::All => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PeriodStats {
    pub period: Period,
    pub total_seconds: u64,
    pub task_count: usize,
    pub average_task_seconds: f64,
    pub distinct_days: usize,
    pub average_day_seconds: f64,
    pub top_tasks: Vec<TaskRecord>,
}

pub fn daily_total(records: &[TaskRecord], date: &str) -> u64 {
    records
        .iter()
        .filter(|record| record.date == date)
        .map(|record| record.duration)
        .sum()
}

/// Case-insensitive search over name and notes, optionally pinned to one date.
pub fn filter_records(records: &[TaskRecord], query: Option<&str>, date: Option<&str>) -> Vec<TaskRecord> {
    let query = query
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_lowercase);
    let date = date.map(str::trim).filter(|value| !value.is_empty());

    records
        .iter()
        .filter(|record| {
            query
                .as_deref()
                .map(|query| {
                    record.task_name.to_lowercase().contains(query)
                        || record.notes.to_lowercase().contains(query)
                })
                .unwrap_or(true)
        })
        .filter(|record| date.map(|date| record.date == date).unwrap_or(true))
        .cloned()
        .collect()
}

pub fn period_stats(records: &[TaskRecord], period: Period, today: NaiveDate) -> PeriodStats {
    let start = period.start(today);
    let in_period = records
        .iter()
        .filter(|record| {
            let Ok(date) = NaiveDate::parse_from_str(&record.date, "%Y-%m-%d") else {
                return false;
            };
            date <= today && start.map(|start| date >= start).unwrap_or(true)
        })
        .collect::<Vec<_>>();

    let total_seconds = in_period.iter().map(|record| record.duration).sum::<u64>();
    let task_count = in_period.len();
    let distinct_days = in_period
        .iter()
        .map(|record| record.date.as_str())
        .collect::<HashSet<_>>()
        .len();

    let mut top_tasks = in_period.into_iter().cloned().collect::<Vec<_>>();
    top_tasks.sort_by(|left, right| right.duration.cmp(&left.duration));
    top_tasks.truncate(TOP_TASK_LIMIT);

    PeriodStats {
        period,
        total_seconds,
        task_count,
        average_task_seconds: average(total_seconds, task_count),
        distinct_days,
        average_day_seconds: average(total_seconds, distinct_days),
        top_tasks,
    }
}

fn average(total: u64, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    total as f64 / count as f64
}
