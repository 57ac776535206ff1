//! The single source of "today" used to stamp output file names.

use chrono::{Local, NaiveDate};

pub trait Clock {
    fn today(&self) -> NaiveDate;
}

/// Local wall-clock date.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock pinned to one date (tests, reproducible reruns).
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
