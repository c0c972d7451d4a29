//! Month grid generation for the calendar view.
//!
//! A grid is always 6 weeks of 7 days, Sunday first. Cells before day 1 are borrowed from
//! the end of the previous month and cells after the last day count up from the 1st of the
//! next month. Date strings are built from integers, never by parsing, so there is no
//! timezone involved anywhere.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// Number of cells in a month grid (6 rows × 7 columns)
pub const GRID_CELLS: usize = 42;

/// Years a `YearMonth` may hold
pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;

/// Which month a grid cell belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MonthPosition {
    Previous,
    Current,
    Next,
}

/// One day slot of the month grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarCell {
    /// Day of month shown in the cell
    pub day: u32,
    /// Month the day belongs to, relative to the displayed month
    pub position: MonthPosition,
    /// Whether this cell is the real-world current date
    pub is_today: bool,
    /// Zero-padded `YYYY-MM-DD`
    pub date_string: String,
}

impl CalendarCell {
    pub fn is_current_month(&self) -> bool {
        self.position == MonthPosition::Current
    }

    pub fn is_prev_month(&self) -> bool {
        self.position == MonthPosition::Previous
    }

    pub fn is_next_month(&self) -> bool {
        self.position == MonthPosition::Next
    }

    /// The cell's date; `None` only for years outside chrono's range
    pub fn date(&self) -> Option<NaiveDate> {
        parse_date_string(&self.date_string)
    }
}

/// A validated year and zero-based month
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct YearMonth {
    year: i32,
    month0: u32,
}

impl YearMonth {
    /// `month0` is zero-based (0 = January)
    pub fn new(year: i32, month0: u32) -> Option<Self> {
        if (MIN_YEAR..=MAX_YEAR).contains(&year) && month0 < 12 {
            Some(Self { year, month0 })
        } else {
            None
        }
    }

    /// The month containing `date`
    pub fn containing(date: NaiveDate) -> Option<Self> {
        Self::new(date.year(), date.month0())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Zero-based month
    pub fn month0(&self) -> u32 {
        self.month0
    }

    /// One-based month, as used in URLs
    pub fn month1(&self) -> u32 {
        self.month0 + 1
    }

    pub fn days_in_month(&self) -> u32 {
        days_in_month(self.year, self.month0)
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month1(), 1)
    }

    /// Month before this one, rolling January back to December of the previous year.
    /// Unlike `previous`, this never fails, so grid filler works at the range edges.
    fn raw_previous(&self) -> (i32, u32) {
        if self.month0 == 0 {
            (self.year - 1, 11)
        } else {
            (self.year, self.month0 - 1)
        }
    }

    fn raw_next(&self) -> (i32, u32) {
        if self.month0 == 11 {
            (self.year + 1, 0)
        } else {
            (self.year, self.month0 + 1)
        }
    }

    pub fn previous(&self) -> Option<Self> {
        let (year, month0) = self.raw_previous();
        Self::new(year, month0)
    }

    pub fn next(&self) -> Option<Self> {
        let (year, month0) = self.raw_next();
        Self::new(year, month0)
    }

    /// Same month, `delta` years away
    pub fn add_years(&self, delta: i32) -> Option<Self> {
        Self::new(self.year.checked_add(delta)?, self.month0)
    }

    /// Same year, another zero-based month
    pub fn with_month(&self, month0: u32) -> Option<Self> {
        Self::new(self.year, month0)
    }
}

/// True for Gregorian leap years
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in a zero-based month
pub fn days_in_month(year: i32, month0: u32) -> u32 {
    match month0 {
        1 if is_leap_year(year) => 29,
        1 => 28,
        3 | 5 | 8 | 10 => 30,
        _ => 31,
    }
}

/// Canonical `YYYY-MM-DD` string for a zero-based month
pub fn format_date_string(year: i32, month0: u32, day: u32) -> String {
    format!("{:04}-{:02}-{:02}", year, month0 + 1, day)
}

/// Parse a canonical `YYYY-MM-DD` string
pub fn parse_date_string(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Sunday-based weekday (0 = Sunday) of the first day of the month
fn first_weekday(year: i32, month0: u32) -> u32 {
    // Sakamoto's method keeps this independent of chrono's supported range
    const OFFSETS: [i32; 12] = [0, 3, 2, 5, 0, 3, 5, 1, 4, 6, 2, 4];
    let y = if month0 < 2 { year - 1 } else { year };
    let w = y + y.div_euclid(4) - y.div_euclid(100) + y.div_euclid(400) + OFFSETS[month0 as usize] + 1;
    w.rem_euclid(7) as u32
}

/// Build the 42-cell grid for `month`, flagging the cell equal to `today`
pub fn month_grid(month: YearMonth, today: NaiveDate) -> Vec<CalendarCell> {
    let (year, month0) = (month.year, month.month0);
    let mut cells = Vec::with_capacity(GRID_CELLS);

    // Previous month's trailing days
    let leading = first_weekday(year, month0);
    let (prev_year, prev_month0) = month.raw_previous();
    let prev_len = days_in_month(prev_year, prev_month0);
    for day in (prev_len + 1 - leading)..=prev_len {
        cells.push(CalendarCell {
            day,
            position: MonthPosition::Previous,
            is_today: false,
            date_string: format_date_string(prev_year, prev_month0, day),
        });
    }

    // Current month
    let today_in_month = today.year() == year && today.month0() == month0;
    for day in 1..=days_in_month(year, month0) {
        cells.push(CalendarCell {
            day,
            position: MonthPosition::Current,
            is_today: today_in_month && today.day() == day,
            date_string: format_date_string(year, month0, day),
        });
    }

    // Next month's leading days
    let (next_year, next_month0) = month.raw_next();
    let remaining = GRID_CELLS - cells.len();
    for day in 1..=remaining as u32 {
        cells.push(CalendarCell {
            day,
            position: MonthPosition::Next,
            is_today: false,
            date_string: format_date_string(next_year, next_month0, day),
        });
    }

    cells
}
