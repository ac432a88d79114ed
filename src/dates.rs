//! Date calculation service.
//!
//! The engine never does calendar arithmetic itself: it asks a
//! [`DateService`] to turn start + duration into an end date (and back),
//! to measure the working duration between two dates, and to snap dates
//! onto working time. [`WorkingCalendar`] is the default implementation.
//!
//! # Contract
//! - `end_date(s, d)` followed by `duration(s, end)` returns `d` whenever
//!   `s` is already a working instant.
//! - `duration` is signed: negative when `end < start`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use crate::models::{DurationUnit, WorkingCalendar};

/// Calendar-aware date arithmetic consumed by the engine.
pub trait DateService: Send + Sync {
    /// End date of a task starting at `start` lasting `duration` units.
    fn end_date(
        &self,
        start: NaiveDateTime,
        duration: f64,
        unit: DurationUnit,
        is_milestone: bool,
    ) -> NaiveDateTime;

    /// Start date of a task ending at `end` lasting `duration` units.
    fn start_date(&self, end: NaiveDateTime, duration: f64, unit: DurationUnit) -> NaiveDateTime;

    /// Working duration between two dates, in `unit`.
    fn duration(&self, start: NaiveDateTime, end: NaiveDateTime, unit: DurationUnit) -> f64;

    /// Snaps a start date forward onto working time.
    fn check_start_date(&self, date: NaiveDateTime) -> NaiveDateTime;

    /// Snaps an end date backward onto working time.
    fn check_end_date(&self, date: NaiveDateTime) -> NaiveDateTime;

    /// Working minutes in one `unit`.
    fn minutes_per(&self, unit: DurationUnit) -> f64;

    /// Parses a date cell.
    ///
    /// Accepts RFC 3339, ISO date-times with or without seconds, and plain
    /// dates (midnight).
    fn parse_date(&self, text: &str) -> Option<NaiveDateTime> {
        let text = text.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(dt.naive_local());
        }
        const DATE_TIME_FORMATS: [&str; 5] = [
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%d %H:%M",
            "%m/%d/%Y %H:%M",
        ];
        for fmt in DATE_TIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
                return Some(dt);
            }
        }
        for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
            if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
                return Some(d.and_time(NaiveTime::MIN));
            }
        }
        None
    }

    /// Converts a duration to working minutes.
    fn to_minutes(&self, duration: f64, unit: DurationUnit) -> i64 {
        (duration * self.minutes_per(unit)).round() as i64
    }
}

impl DateService for WorkingCalendar {
    fn end_date(
        &self,
        start: NaiveDateTime,
        duration: f64,
        unit: DurationUnit,
        is_milestone: bool,
    ) -> NaiveDateTime {
        let start = self.check_start_date(start);
        if is_milestone || duration <= 0.0 {
            return start;
        }
        self.add_working_minutes(start, self.to_minutes(duration, unit))
    }

    fn start_date(&self, end: NaiveDateTime, duration: f64, unit: DurationUnit) -> NaiveDateTime {
        let end = self.check_end_date(end);
        if duration <= 0.0 {
            return end;
        }
        let start = self.subtract_working_minutes(end, self.to_minutes(duration, unit));
        self.check_start_date(start)
    }

    fn duration(&self, start: NaiveDateTime, end: NaiveDateTime, unit: DurationUnit) -> f64 {
        let per_unit = self.minutes_per(unit);
        if per_unit <= 0.0 {
            return 0.0;
        }
        if end < start {
            return -(self.working_minutes_in_range(end, start) as f64 / per_unit);
        }
        self.working_minutes_in_range(start, end) as f64 / per_unit
    }

    fn check_start_date(&self, date: NaiveDateTime) -> NaiveDateTime {
        self.next_working_time(date)
    }

    fn check_end_date(&self, date: NaiveDateTime) -> NaiveDateTime {
        self.previous_working_time(date)
    }

    fn minutes_per(&self, unit: DurationUnit) -> f64 {
        match unit {
            DurationUnit::Day => self.minutes_per_day() as f64,
            DurationUnit::Hour => 60.0,
            DurationUnit::Minute => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::at;

    #[test]
    fn test_end_date_days() {
        let cal = WorkingCalendar::new();
        assert_eq!(cal.end_date(at(1, 8), 5.0, DurationUnit::Day, false), at(5, 17));
        // Midnight start snaps to the working window first.
        assert_eq!(cal.end_date(at(1, 0), 1.0, DurationUnit::Day, false), at(1, 17));
    }

    #[test]
    fn test_end_date_milestone() {
        let cal = WorkingCalendar::new();
        assert_eq!(cal.end_date(at(3, 8), 4.0, DurationUnit::Day, true), at(3, 8));
        assert_eq!(cal.end_date(at(3, 8), 0.0, DurationUnit::Day, false), at(3, 8));
    }

    #[test]
    fn test_start_date_days() {
        let cal = WorkingCalendar::new();
        assert_eq!(cal.start_date(at(5, 17), 5.0, DurationUnit::Day), at(1, 8));
        assert_eq!(cal.start_date(at(2, 12), 4.0, DurationUnit::Hour), at(2, 8));
    }

    #[test]
    fn test_duration_signed() {
        let cal = WorkingCalendar::new();
        assert_eq!(cal.duration(at(1, 8), at(5, 17), DurationUnit::Day), 5.0);
        assert_eq!(cal.duration(at(5, 17), at(1, 8), DurationUnit::Day), -5.0);
        assert_eq!(cal.duration(at(1, 8), at(1, 12), DurationUnit::Hour), 4.0);
        assert_eq!(cal.duration(at(1, 17), at(2, 8), DurationUnit::Day), 0.0);
    }

    #[test]
    fn test_round_trip_end_duration() {
        let cal = WorkingCalendar::new().without_weekends();
        for days in [0.5, 1.0, 3.0, 7.0, 12.25] {
            let end = cal.end_date(at(3, 8), days, DurationUnit::Day, false);
            let back = cal.duration(at(3, 8), end, DurationUnit::Day);
            assert!((back - days).abs() < 1e-9, "days={days} back={back}");
            assert_eq!(cal.start_date(end, days, DurationUnit::Day), at(3, 8));
        }
    }

    #[test]
    fn test_check_dates() {
        let cal = WorkingCalendar::new();
        assert_eq!(cal.check_start_date(at(10, 17)), at(11, 8));
        assert_eq!(cal.check_end_date(at(11, 8)), at(10, 17));
    }

    #[test]
    fn test_parse_date_formats() {
        let cal = WorkingCalendar::new();
        assert_eq!(cal.parse_date("2024-01-02T08:00:00"), Some(at(2, 8)));
        assert_eq!(cal.parse_date("2024-01-02 08:00"), Some(at(2, 8)));
        assert_eq!(cal.parse_date("2024-01-02"), Some(at(2, 0)));
        assert_eq!(cal.parse_date("01/02/2024"), Some(at(2, 0)));
        assert_eq!(cal.parse_date("not a date"), None);
    }
}
