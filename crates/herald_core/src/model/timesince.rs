//! Elapsed-time and calendar-day phrasing for notification timestamps.
//!
//! # Invariants
//! - At most two adjacent units are rendered ("1 week, 3 days").
//! - Future timestamps and gaps under one minute render as "0 minutes".

use chrono::{DateTime, Duration, NaiveDate, Utc};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 365 * DAY;

const CHUNKS: &[(i64, &str, &str)] = &[
    (YEAR, "year", "years"),
    (MONTH, "month", "months"),
    (WEEK, "week", "weeks"),
    (DAY, "day", "days"),
    (HOUR, "hour", "hours"),
    (MINUTE, "minute", "minutes"),
];

/// Renders the time elapsed between `since` and `now`, e.g. "2 hours, 5 minutes".
pub fn timesince(since: DateTime<Utc>, now: DateTime<Utc>) -> String {
    format_elapsed(now.signed_duration_since(since))
}

/// Renders a non-negative duration with the two largest adjacent units.
pub fn format_elapsed(elapsed: Duration) -> String {
    let seconds = elapsed.num_seconds();
    if seconds <= 0 {
        return plural(0, "minute", "minutes");
    }

    let Some(index) = CHUNKS
        .iter()
        .position(|(chunk_seconds, _, _)| seconds / chunk_seconds != 0)
    else {
        return plural(0, "minute", "minutes");
    };

    let (chunk_seconds, singular, plural_name) = CHUNKS[index];
    let count = seconds / chunk_seconds;
    let mut rendered = plural(count, singular, plural_name);

    if let Some((next_seconds, next_singular, next_plural)) = CHUNKS.get(index + 1) {
        let remainder = (seconds - chunk_seconds * count) / next_seconds;
        if remainder != 0 {
            rendered.push_str(", ");
            rendered.push_str(&plural(remainder, next_singular, next_plural));
        }
    }

    rendered
}

/// Names the calendar day of `value` relative to `today`.
///
/// Returns `today`, `yesterday` or `tomorrow` when applicable, otherwise the
/// ISO date (`YYYY-MM-DD`).
pub fn naturalday(value: DateTime<Utc>, today: NaiveDate) -> String {
    let day = value.date_naive();
    match (day - today).num_days() {
        0 => "today".to_string(),
        -1 => "yesterday".to_string(),
        1 => "tomorrow".to_string(),
        _ => day.format("%Y-%m-%d").to_string(),
    }
}

fn plural(count: i64, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{count} {singular}")
    } else {
        format!("{count} {plural}")
    }
}
