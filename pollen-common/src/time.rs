//! Calendar-day helpers
//!
//! Every date in the store is a UTC calendar day. Timestamps coming from
//! clients or upstream sources are truncated to UTC midnight before use.

use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Truncate a timestamp to its UTC calendar day
pub fn timestamp_to_date<Tz: TimeZone>(timestamp: &DateTime<Tz>) -> NaiveDate {
    timestamp.with_timezone(&Utc).date_naive()
}

/// Today's UTC calendar day
pub fn today() -> NaiveDate {
    timestamp_to_date(&now())
}

/// The UTC calendar day after `date`
///
/// Saturates at `NaiveDate::MAX`.
pub fn next_day(date: NaiveDate) -> NaiveDate {
    date.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX)
}

/// UTC midnight at the start of `date`
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}
