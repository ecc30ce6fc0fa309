use chrono::{DateTime, Datelike, TimeZone};

/// ISO 8601 week number of the timestamp's local date (weeks start Monday,
/// week 1 holds the year's first Thursday)
pub fn week_index<Tz: TimeZone>(timestamp: &DateTime<Tz>) -> u32 {
    timestamp.date_naive().iso_week().week()
}
