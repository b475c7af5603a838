use std::fmt;

use chrono::{
    DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, SecondsFormat,
    TimeZone,
};
use chrono_tz::Tz;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampIssue {
    Unparsed(String),
}

impl fmt::Display for TimestampIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unparsed(value) => write!(f, "unparsed timestamp: {value}"),
        }
    }
}

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Re-render `value` as RFC 3339 (whole seconds) in `tz`.
///
/// Tried in order: RFC 3339 with offset, `YYYY-MM-DD HH:MM:SS`, then bare
/// `YYYY-MM-DD` (midnight). Offset-less forms are read as local time in `tz`;
/// an ambiguous local time takes the earlier instant, and a non-existent one
/// (DST gap) is read with the offset in force before the gap, landing past
/// it. Empty input stays empty.
pub fn normalize_timestamp(value: &str, tz: Tz) -> Result<String, TimestampIssue> {
    if value.is_empty() {
        return Ok(String::new());
    }

    let parsed = DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&tz))
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
                .ok()
                .and_then(|naive| in_zone(naive, tz))
        })
        .or_else(|| {
            NaiveDate::parse_from_str(value, DATE_FORMAT)
                .ok()
                .and_then(|date| in_zone(date.and_time(NaiveTime::MIN), tz))
        });

    match parsed {
        Some(dt) => Ok(dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
        None => Err(TimestampIssue::Unparsed(value.to_string())),
    }
}

fn in_zone(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earlier, _) => Some(earlier),
        LocalResult::None => {
            let before = tz
                .offset_from_utc_datetime(&naive.checked_sub_signed(Duration::days(1))?)
                .fix();
            let shift = Duration::seconds(i64::from(before.local_minus_utc()));
            let utc = naive.checked_sub_signed(shift)?;
            Some(tz.from_utc_datetime(&utc))
        }
    }
}
