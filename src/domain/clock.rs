use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use rand::Rng;

const TIME_OF_DAY_FORMAT: &str = "%I:%M %p";
const ID_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Formats a wall-clock instant as `hh:mm AM`, the display form stored on records.
pub fn format_time_of_day<Z: TimeZone>(value: &DateTime<Z>) -> String
where
    Z::Offset: std::fmt::Display,
{
    value.format(TIME_OF_DAY_FORMAT).to_string()
}

pub fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    ["%I:%M %p", "%I:%M:%S %p", "%I:%M%p", "%H:%M", "%H:%M:%S"]
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(value, format).ok())
}

/// Seconds between two time-of-day strings on `date`. An end before the
/// start rolls over to the next day.
pub fn duration_between(date: &str, start: &str, end: &str) -> Option<u64> {
    let day = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
    let start_at = day.and_time(parse_time_of_day(start)?);
    let mut end_at = day.and_time(parse_time_of_day(end)?);
    if end_at < start_at {
        end_at += Duration::days(1);
    }
    u64::try_from((end_at - start_at).num_seconds()).ok()
}

/// Same as [`duration_between`] but falls back to zero for ad-hoc edits.
pub fn recompute_duration(date: &str, start: &str, end: &str) -> u64 {
    duration_between(date, start, end).unwrap_or(0)
}

pub fn elapsed_seconds(start_ms: i64, now_ms: i64) -> u64 {
    u64::try_from(now_ms.saturating_sub(start_ms).div_euclid(1000)).unwrap_or(0)
}

pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

pub fn today_in(time_zone: Tz, now: DateTime<Utc>) -> String {
    now.with_timezone(&time_zone).format("%Y-%m-%d").to_string()
}

pub fn local_time_of_day(time_zone: Tz, epoch_ms: i64) -> String {
    let instant = DateTime::from_timestamp_millis(epoch_ms).unwrap_or_default();
    format_time_of_day(&instant.with_timezone(&time_zone))
}

/// `"{epoch_ms}-{9 base36 chars}"`, unique across devices in practice.
pub fn generate_id(now_ms: i64) -> String {
    let mut rng = rand::thread_rng();
    let suffix = (0..ID_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect::<String>();
    format!("{now_ms}-{suffix}")
}
