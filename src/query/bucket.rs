//! Time buckets: timestamp rounding and default granularity selection
//!
//! Rounding is evaluated in the local time zone, matching how the
//! volkszaehler middleware groups its tuples.

use chrono::{Datelike, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Timelike};
use std::fmt;

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 365 * DAY;

/// Time granularity understood by the middleware's `group` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    /// One minute
    Minute,
    /// One clock hour
    Hour,
    /// One calendar day
    Day,
    /// One week
    Week,
    /// One calendar month
    Month,
    /// One year
    Year,
}

impl Bucket {
    /// Parse a lower-case group keyword
    pub fn parse(keyword: &str) -> Option<Self> {
        match keyword {
            "minute" => Some(Bucket::Minute),
            "hour" => Some(Bucket::Hour),
            "day" => Some(Bucket::Day),
            "week" => Some(Bucket::Week),
            "month" => Some(Bucket::Month),
            "year" => Some(Bucket::Year),
            _ => None,
        }
    }

    /// Keyword sent to the middleware
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Minute => "minute",
            Bucket::Hour => "hour",
            Bucket::Day => "day",
            Bucket::Week => "week",
            Bucket::Month => "month",
            Bucket::Year => "year",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Round a millisecond timestamp down to the start of its bucket
///
/// Only `hour`, `day` and `month` truncate; any other keyword, including
/// the empty string, returns `ts_ms` unchanged. Sub-second precision is
/// dropped for the truncating buckets.
pub fn round_timestamp(ts_ms: i64, group: &str) -> i64 {
    round_timestamp_in(&chrono::Local, ts_ms, group)
}

/// [`round_timestamp`] against an explicit time zone
pub fn round_timestamp_in<Tz: TimeZone>(tz: &Tz, ts_ms: i64, group: &str) -> i64 {
    let bucket = match Bucket::parse(group) {
        Some(bucket @ (Bucket::Hour | Bucket::Day | Bucket::Month)) => bucket,
        _ => return ts_ms,
    };

    let secs = ts_ms.div_euclid(1000);
    let local = match tz.timestamp_opt(secs, 0) {
        LocalResult::Single(t) => t,
        _ => return ts_ms,
    };

    let start = match bucket {
        // Hour start: the instant minus the elapsed wall-clock minutes and seconds
        Bucket::Hour => Some(secs - i64::from(local.minute() * 60 + local.second())),
        Bucket::Day => local
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .and_then(|naive| start_at_or_before(tz, naive, secs)),
        _ => NaiveDate::from_ymd_opt(local.year(), local.month(), 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .and_then(|naive| start_at_or_before(tz, naive, secs)),
    };

    match start {
        Some(start) => start * 1000,
        None => ts_ms,
    }
}

/// Resolve a local wall-clock time to the latest instant not after `secs`
///
/// On a DST fold both candidates are considered. A wall-clock time that
/// does not exist resolves to nothing.
fn start_at_or_before<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime, secs: i64) -> Option<i64> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(t) => Some(t.timestamp()),
        LocalResult::Ambiguous(a, b) => [a.timestamp(), b.timestamp()]
            .into_iter()
            .filter(|&candidate| candidate <= secs)
            .max(),
        LocalResult::None => None,
    }
}

/// Pick a default bucket for a time span and a target point count
///
/// The average sample period `span_secs / points` is classified with
/// 365-day years and 30-day months. Periods of a minute or less need no
/// bucketing.
pub fn infer_bucket(span_secs: i64, points: usize) -> Option<Bucket> {
    if points == 0 {
        return None;
    }
    let period = span_secs / points as i64;

    if period > YEAR {
        Some(Bucket::Year)
    } else if period > MONTH {
        Some(Bucket::Month)
    } else if period > WEEK {
        Some(Bucket::Week)
    } else if period > DAY {
        Some(Bucket::Day)
    } else if period > HOUR {
        Some(Bucket::Hour)
    } else if period > MINUTE {
        Some(Bucket::Minute)
    } else {
        None
    }
}
