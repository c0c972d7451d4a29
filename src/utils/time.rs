use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;

/// Today's date on the wall clock of `tz`
pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

/// Long display form, e.g. "Monday, March 10, 2025"
pub fn long_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

/// Month name for a zero-based month
pub fn month_name(month0: u32) -> &'static str {
    const MONTHS: [&str; 12] = [
        "January", "February", "March", "April", "May", "June", "July", "August", "September",
        "October", "November", "December",
    ];
    MONTHS.get(month0 as usize).copied().unwrap_or("")
}

/// Unix timestamp in seconds
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}
