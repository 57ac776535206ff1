//! Turning index levels into per-component price changes.
//!
//! Monthly dates are normalized to the first day of their month everywhere in
//! the crate; `month_start` and `months_back` are the only calendar helpers.

use chrono::{Datelike, Months, NaiveDate};

pub mod builder;

pub use builder::*;

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// The month-start `k` calendar months before `date`.
pub fn months_back(date: NaiveDate, k: u32) -> Option<NaiveDate> {
    month_start(date).checked_sub_months(Months::new(k))
}
