//! Time and calendar-date helpers.

use chrono::{DateTime, Months, NaiveDate, Utc};

/// UTC timestamp used for geometry observations and close dates.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Return the current UTC calendar date.
#[must_use]
pub fn today() -> NaiveDate {
    now().date_naive()
}

/// Return the date `years` whole years before `date`.
///
/// February 29th maps to February 28th when the target year is not a leap year.
#[must_use]
pub fn years_before(date: NaiveDate, years: u32) -> NaiveDate {
    date.checked_sub_months(Months::new(years * 12))
        .unwrap_or(NaiveDate::MIN)
}
