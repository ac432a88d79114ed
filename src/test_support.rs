//! Shared fixtures for unit tests.

use chrono::{NaiveDate, NaiveDateTime};

/// `h` o'clock on day `d` of January 2024.
pub fn at(d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}
