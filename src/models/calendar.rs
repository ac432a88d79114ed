//! Working-time calendar.
//!
//! Defines when work happens: a daily working window, optional weekend
//! exclusion, and holidays (blocked days).
//!
//! # Time Model
//! Dates are `NaiveDateTime` at minute resolution. Each working day has one
//! window `[day_start, day_end)` expressed in minutes after midnight.
//!
//! # Precedence
//! Holidays override the weekly pattern. A minute is working time iff:
//! - its day is a working weekday (or weekends are included), AND
//! - its day is not a holiday, AND
//! - it falls within the daily window.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// Longest run of consecutive non-working days the calendar will scan.
const MAX_DAY_SCAN: usize = 36_600;

/// Working-time calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkingCalendar {
    /// Working window start, minutes after midnight (default 08:00).
    pub day_start_minute: u32,
    /// Working window end, minutes after midnight (default 17:00).
    pub day_end_minute: u32,
    /// Whether Saturday and Sunday are working days.
    pub include_weekends: bool,
    /// Non-working dates.
    pub holidays: Vec<NaiveDate>,
}

impl Default for WorkingCalendar {
    fn default() -> Self {
        Self {
            day_start_minute: 8 * 60,
            day_end_minute: 17 * 60,
            include_weekends: true,
            holidays: Vec::new(),
        }
    }
}

impl WorkingCalendar {
    /// Creates the default calendar (08:00–17:00, every day).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the daily working window (hours, 0..=24).
    pub fn with_hours(mut self, start_hour: u32, end_hour: u32) -> Self {
        self.day_start_minute = start_hour.min(24) * 60;
        self.day_end_minute = end_hour.min(24) * 60;
        self
    }

    /// Excludes Saturdays and Sundays.
    pub fn without_weekends(mut self) -> Self {
        self.include_weekends = false;
        self
    }

    /// Adds a holiday.
    pub fn with_holiday(mut self, date: NaiveDate) -> Self {
        self.holidays.push(date);
        self
    }

    /// Working minutes in one full working day.
    #[inline]
    pub fn minutes_per_day(&self) -> i64 {
        (self.day_end_minute as i64 - self.day_start_minute as i64).max(0)
    }

    /// Whether `date` has a working window at all.
    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        if self.minutes_per_day() == 0 || self.holidays.contains(&date) {
            return false;
        }
        self.include_weekends || !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// The working window `[start, end)` of `date`, if it is a working day.
    pub fn window(&self, date: NaiveDate) -> Option<(NaiveDateTime, NaiveDateTime)> {
        if !self.is_working_day(date) {
            return None;
        }
        let midnight = date.and_time(NaiveTime::MIN);
        Some((
            midnight + Duration::minutes(self.day_start_minute as i64),
            midnight + Duration::minutes(self.day_end_minute as i64),
        ))
    }

    /// Whether `time` is inside a working window.
    pub fn is_working_time(&self, time: NaiveDateTime) -> bool {
        self.window(time.date())
            .is_some_and(|(start, end)| time >= start && time < end)
    }

    /// Start of the first working window strictly after `date`.
    pub fn next_window_start(&self, date: NaiveDate) -> Option<NaiveDateTime> {
        let mut day = date;
        for _ in 0..MAX_DAY_SCAN {
            day = day.succ_opt()?;
            if let Some((start, _)) = self.window(day) {
                return Some(start);
            }
        }
        None
    }

    /// End of the last working window strictly before `date`.
    pub fn previous_window_end(&self, date: NaiveDate) -> Option<NaiveDateTime> {
        let mut day = date;
        for _ in 0..MAX_DAY_SCAN {
            day = day.pred_opt()?;
            if let Some((_, end)) = self.window(day) {
                return Some(end);
            }
        }
        None
    }

    /// Earliest working instant at or after `time`.
    ///
    /// An instant at the end of a window belongs to the next window.
    pub fn next_working_time(&self, time: NaiveDateTime) -> NaiveDateTime {
        match self.window(time.date()) {
            Some((start, _)) if time < start => start,
            Some((_, end)) if time < end => time,
            _ => self.next_window_start(time.date()).unwrap_or(time),
        }
    }

    /// Latest working instant at or before `time`, treated as an end point.
    ///
    /// An instant at the start of a window belongs to the previous window.
    pub fn previous_working_time(&self, time: NaiveDateTime) -> NaiveDateTime {
        match self.window(time.date()) {
            Some((_, end)) if time > end => end,
            Some((start, _)) if time > start => time,
            _ => self.previous_window_end(time.date()).unwrap_or(time),
        }
    }

    /// Moves `minutes` of working time forward from `from`.
    pub fn add_working_minutes(&self, from: NaiveDateTime, minutes: i64) -> NaiveDateTime {
        let mut time = self.next_working_time(from);
        let mut remaining = minutes.max(0);
        for _ in 0..MAX_DAY_SCAN {
            let Some((_, end)) = self.window(time.date()) else {
                return time;
            };
            let available = (end - time).num_minutes();
            if remaining <= available {
                return time + Duration::minutes(remaining);
            }
            remaining -= available;
            match self.next_window_start(time.date()) {
                Some(next) => time = next,
                None => return end,
            }
        }
        time
    }

    /// Moves `minutes` of working time backward from `from`.
    pub fn subtract_working_minutes(&self, from: NaiveDateTime, minutes: i64) -> NaiveDateTime {
        let mut time = self.previous_working_time(from);
        let mut remaining = minutes.max(0);
        for _ in 0..MAX_DAY_SCAN {
            let Some((start, _)) = self.window(time.date()) else {
                return time;
            };
            let available = (time - start).num_minutes();
            if remaining <= available {
                return time - Duration::minutes(remaining);
            }
            remaining -= available;
            match self.previous_window_end(time.date()) {
                Some(prev) => time = prev,
                None => return start,
            }
        }
        time
    }

    /// Working minutes within `[start, end)`; zero when `end <= start`.
    pub fn working_minutes_in_range(&self, start: NaiveDateTime, end: NaiveDateTime) -> i64 {
        if end <= start {
            return 0;
        }
        let mut total = 0;
        let mut day = start.date();
        let last = end.date();
        while day <= last {
            if let Some((ws, we)) = self.window(day) {
                let from = ws.max(start);
                let to = we.min(end);
                if to > from {
                    total += (to - from).num_minutes();
                }
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_window() {
        let cal = WorkingCalendar::new();
        let (s, e) = cal.window(at(1, 0, 0).date()).unwrap();
        assert_eq!(s, at(1, 8, 0));
        assert_eq!(e, at(1, 17, 0));
        assert_eq!(cal.minutes_per_day(), 540);
    }

    #[test]
    fn test_weekends_and_holidays() {
        // 2024-01-06 is a Saturday.
        let cal = WorkingCalendar::new()
            .without_weekends()
            .with_holiday(at(8, 0, 0).date());
        assert!(!cal.is_working_day(at(6, 0, 0).date()));
        assert!(!cal.is_working_day(at(7, 0, 0).date()));
        assert!(!cal.is_working_day(at(8, 0, 0).date()));
        assert!(cal.is_working_day(at(9, 0, 0).date()));
        assert_eq!(cal.next_window_start(at(5, 0, 0).date()), Some(at(9, 8, 0)));
    }

    #[test]
    fn test_next_working_time() {
        let cal = WorkingCalendar::new();
        assert_eq!(cal.next_working_time(at(2, 6, 0)), at(2, 8, 0));
        assert_eq!(cal.next_working_time(at(2, 10, 0)), at(2, 10, 0));
        assert_eq!(cal.next_working_time(at(2, 17, 0)), at(3, 8, 0));
    }

    #[test]
    fn test_previous_working_time() {
        let cal = WorkingCalendar::new();
        assert_eq!(cal.previous_working_time(at(2, 20, 0)), at(2, 17, 0));
        assert_eq!(cal.previous_working_time(at(2, 8, 0)), at(1, 17, 0));
        assert_eq!(cal.previous_working_time(at(2, 12, 0)), at(2, 12, 0));
    }

    #[test]
    fn test_add_working_minutes_spans_days() {
        let cal = WorkingCalendar::new();
        // Five full days from Jan 1 08:00 ends Jan 5 17:00.
        assert_eq!(cal.add_working_minutes(at(1, 8, 0), 5 * 540), at(5, 17, 0));
        // Zero minutes from a day end stays there.
        assert_eq!(cal.add_working_minutes(at(1, 16, 0), 60), at(1, 17, 0));
        assert_eq!(cal.add_working_minutes(at(1, 16, 0), 120), at(2, 9, 0));
    }

    #[test]
    fn test_subtract_working_minutes() {
        let cal = WorkingCalendar::new();
        assert_eq!(cal.subtract_working_minutes(at(5, 17, 0), 5 * 540), at(1, 8, 0));
        assert_eq!(cal.subtract_working_minutes(at(2, 9, 0), 120), at(1, 16, 0));
    }

    #[test]
    fn test_working_minutes_in_range() {
        let cal = WorkingCalendar::new().without_weekends();
        // Fri Jan 5 08:00 .. Mon Jan 8 17:00 = two working days.
        assert_eq!(cal.working_minutes_in_range(at(5, 8, 0), at(8, 17, 0)), 1080);
        assert_eq!(cal.working_minutes_in_range(at(8, 17, 0), at(5, 8, 0)), 0);
    }

    #[test]
    fn test_empty_window_is_not_working() {
        let cal = WorkingCalendar::new().with_hours(9, 9);
        assert!(!cal.is_working_day(at(1, 0, 0).date()));
        assert!(!cal.is_working_time(at(1, 9, 0)));
    }
}
