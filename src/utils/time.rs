use chrono::{NaiveDate, NaiveDateTime, ParseResult};

/// Format of the `date` attribute of a day bucket and of the project `due-date`.
pub const DAY_FORMAT: &str = "%d/%m/%Y";

/// Format of the `datetime` attribute of a snapshot. The fraction is omitted when it's zero.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// This is the standard way of converting a date to a string in squirrel files.
pub fn format_day(date: NaiveDate) -> String {
    date.format(DAY_FORMAT).to_string()
}

pub fn parse_day(value: &str) -> ParseResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DAY_FORMAT)
}

pub fn format_timestamp(moment: NaiveDateTime) -> String {
    moment.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(value: &str) -> ParseResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT)
}

/// Whole days from `today` until `due`. Negative once the due date has passed.
pub fn days_until(today: NaiveDate, due: NaiveDate) -> i64 {
    (due - today).num_days()
}
