//! Joint resolution of start, end and duration.

use chrono::NaiveDateTime;
use tracing::warn;

use crate::dates::DateService;
use crate::error::EditError;
use crate::mapper::{ScheduleEdit, SegmentInput};
use crate::models::{GanttProperties, TaskSegment};

/// Resolves the schedule fields of an edit against `props`.
///
/// # Algorithm
///
/// | present fields | derived |
/// |---|---|
/// | start | end from current duration (or duration from current end) |
/// | end | duration from current start (or start from current duration) |
/// | duration | end from current start (or start from current end) |
/// | start + end | duration |
/// | end + duration | start |
/// | start + duration, or all three | end |
///
/// A unit-only change keeps the number and re-derives the end. A zero
/// duration makes the task a milestone (`end == start`); an end before the
/// start collapses to a milestone as well.
///
/// Missing values are legal only when `allow_unscheduled` is set.
pub fn resolve_dates(
    props: &mut GanttProperties,
    edit: &ScheduleEdit,
    dates: &dyn DateService,
    allow_unscheduled: bool,
) -> Result<(), EditError> {
    if let Some(unit) = edit.duration_unit {
        props.duration_unit = unit;
    }
    if let Some(Some(d)) = edit.duration {
        if d < 0.0 || !d.is_finite() {
            return Err(EditError::invalid("duration", "duration must be non-negative"));
        }
    }
    let mut r = Resolver {
        props,
        dates,
        allow_unscheduled,
    };
    let current = (r.props.start_date, r.props.end_date, r.props.duration);

    match (edit.start, edit.end, edit.duration) {
        (Some(s), _, Some(d)) => r.from_start_duration(s, d),
        (Some(s), Some(e), None) => r.from_start_end(s, e),
        (None, Some(e), Some(d)) => r.from_end_duration(e, d),
        (Some(s), None, None) => match current.2 {
            Some(d) => r.from_start_duration(s, Some(d)),
            None => r.from_start_end(s, current.1),
        },
        (None, Some(e), None) => match current.0 {
            Some(s) => r.from_start_end(Some(s), e),
            None => r.from_end_duration(e, current.2),
        },
        (None, None, Some(d)) => match (current.0, current.1) {
            (None, Some(e)) => r.from_end_duration(Some(e), d),
            (s, _) => r.from_start_duration(s, d),
        },
        (None, None, None) if edit.duration_unit.is_some() => {
            r.from_start_duration(current.0, current.2)
        }
        (None, None, None) => Ok(()),
    }
}

struct Resolver<'a> {
    props: &'a mut GanttProperties,
    dates: &'a dyn DateService,
    allow_unscheduled: bool,
}

impl Resolver<'_> {
    fn unscheduled(&self, field: &str) -> Result<(), EditError> {
        if self.allow_unscheduled {
            Ok(())
        } else {
            Err(EditError::invalid(field, "a value is required"))
        }
    }

    fn from_start_duration(
        &mut self,
        start: Option<NaiveDateTime>,
        duration: Option<f64>,
    ) -> Result<(), EditError> {
        let unit = self.props.duration_unit;
        match (start, duration) {
            (Some(s), Some(d)) => {
                let start = self.dates.check_start_date(s);
                let end = self.dates.end_date(start, d, unit, d == 0.0);
                self.set(Some(start), Some(end), Some(d));
            }
            (Some(s), None) => {
                self.unscheduled("duration")?;
                let start = self.dates.check_start_date(s);
                self.set(Some(start), None, None);
            }
            (None, d) => {
                self.unscheduled("start date")?;
                self.set(None, None, d);
            }
        }
        Ok(())
    }

    fn from_start_end(
        &mut self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<(), EditError> {
        let unit = self.props.duration_unit;
        match (start, end) {
            (Some(s), Some(e)) => {
                let start = self.dates.check_start_date(s);
                let end = self.dates.check_end_date(e);
                if end <= start {
                    self.set(Some(start), Some(start), Some(0.0));
                } else {
                    let duration = self.dates.duration(start, end, unit);
                    self.set(Some(start), Some(end), Some(duration));
                }
            }
            (s, e) => {
                self.unscheduled(if s.is_none() { "start date" } else { "end date" })?;
                let dates = self.dates;
                let s = s.map(|s| dates.check_start_date(s));
                let e = e.map(|e| dates.check_end_date(e));
                self.set(s, e, None);
            }
        }
        Ok(())
    }

    fn from_end_duration(
        &mut self,
        end: Option<NaiveDateTime>,
        duration: Option<f64>,
    ) -> Result<(), EditError> {
        let unit = self.props.duration_unit;
        match (end, duration) {
            (Some(e), Some(d)) => {
                let end = self.dates.check_end_date(e);
                let start = if d == 0.0 {
                    end
                } else {
                    self.dates.start_date(end, d, unit)
                };
                self.set(Some(start), Some(end), Some(d));
            }
            (e, d) => {
                self.unscheduled(if e.is_none() { "end date" } else { "duration" })?;
                let dates = self.dates;
                self.set(None, e.map(|e| dates.check_end_date(e)), d);
            }
        }
        Ok(())
    }

    fn set(
        &mut self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
        duration: Option<f64>,
    ) {
        self.props.start_date = start;
        self.props.end_date = end;
        self.props.duration = duration;
        self.props.is_milestone = duration == Some(0.0);
    }
}

/// Replaces the segments of a split task and re-derives its dates.
///
/// Segments without a start are dropped. Each segment gets its end from
/// its duration (or its duration from its end). The task then spans the
/// first start to the last end with the summed segment durations.
pub fn apply_segments(
    props: &mut GanttProperties,
    inputs: &[SegmentInput],
    dates: &dyn DateService,
) {
    let unit = props.duration_unit;
    let mut segments: Vec<TaskSegment> = inputs
        .iter()
        .filter_map(|input| {
            let Some(start) = input.start.map(|s| dates.check_start_date(s)) else {
                warn!("dropping segment without a start date");
                return None;
            };
            let (end, duration) = match (input.end, input.duration) {
                (_, Some(d)) => (dates.end_date(start, d, unit, false), d),
                (Some(e), None) => {
                    let end = dates.check_end_date(e).max(start);
                    (end, dates.duration(start, end, unit))
                }
                (None, None) => (dates.end_date(start, 1.0, unit, false), 1.0),
            };
            Some(TaskSegment {
                start_date: start,
                end_date: end,
                duration,
            })
        })
        .collect();
    segments.sort_by_key(|s| s.start_date);

    if let (Some(first), Some(last)) = (segments.first(), segments.last()) {
        props.start_date = Some(first.start_date);
        props.end_date = Some(last.end_date);
        props.duration = Some(segments.iter().map(|s| s.duration).sum());
        props.is_milestone = false;
    }
    props.segments = segments;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::at;
    use crate::models::{DurationUnit, WorkingCalendar};

    fn task() -> GanttProperties {
        GanttProperties::new("A")
            .with_start(at(1, 8))
            .with_end(at(5, 17))
            .with_duration(5.0)
    }

    fn resolve(props: &mut GanttProperties, edit: ScheduleEdit) -> Result<(), EditError> {
        resolve_dates(props, &edit, &WorkingCalendar::new(), false)
    }

    #[test]
    fn test_start_only_keeps_duration() {
        let mut p = task();
        resolve(
            &mut p,
            ScheduleEdit {
                start: Some(Some(at(8, 8))),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(p.start_date, Some(at(8, 8)));
        assert_eq!(p.end_date, Some(at(12, 17)));
        assert_eq!(p.duration, Some(5.0));
    }

    #[test]
    fn test_end_only_recomputes_duration() {
        let mut p = task();
        resolve(
            &mut p,
            ScheduleEdit {
                end: Some(Some(at(10, 17))),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(p.start_date, Some(at(1, 8)));
        assert_eq!(p.duration, Some(10.0));
    }

    #[test]
    fn test_duration_only_recomputes_end() {
        let mut p = task();
        resolve(
            &mut p,
            ScheduleEdit {
                duration: Some(Some(2.0)),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(p.end_date, Some(at(2, 17)));
    }

    #[test]
    fn test_pairs() {
        let mut p = task();
        resolve(
            &mut p,
            ScheduleEdit {
                end: Some(Some(at(10, 17))),
                duration: Some(Some(3.0)),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(p.start_date, Some(at(8, 8)));

        let mut p = task();
        resolve(
            &mut p,
            ScheduleEdit {
                start: Some(Some(at(2, 8))),
                end: Some(Some(at(3, 17))),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(p.duration, Some(2.0));
    }

    #[test]
    fn test_all_three_duration_wins() {
        let mut p = task();
        resolve(
            &mut p,
            ScheduleEdit {
                start: Some(Some(at(2, 8))),
                end: Some(Some(at(20, 17))),
                duration: Some(Some(1.0)),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(p.end_date, Some(at(2, 17)));
    }

    #[test]
    fn test_end_before_start_is_milestone() {
        let mut p = task();
        resolve(
            &mut p,
            ScheduleEdit {
                start: Some(Some(at(5, 8))),
                end: Some(Some(at(3, 17))),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(p.duration, Some(0.0));
        assert_eq!(p.end_date, p.start_date);
        assert!(p.is_milestone);
    }

    #[test]
    fn test_unit_change_rederives_end() {
        let mut p = task();
        resolve(
            &mut p,
            ScheduleEdit {
                duration_unit: Some(DurationUnit::Hour),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(p.end_date, Some(at(1, 13)));
    }

    #[test]
    fn test_unscheduled_requires_setting() {
        let cal = WorkingCalendar::new();
        let edit = ScheduleEdit {
            start: Some(Some(at(2, 8))),
            duration: Some(None),
            ..Default::default()
        };
        let mut p = task();
        assert!(resolve_dates(&mut p, &edit, &cal, false).is_err());
        resolve_dates(&mut p, &edit, &cal, true).unwrap();
        assert_eq!(p.start_date, Some(at(2, 8)));
        assert_eq!(p.duration, None);
        assert_eq!(p.end_date, None);
    }

    #[test]
    fn test_joint_round_trip() {
        let cal = WorkingCalendar::new();
        for d in [1.0, 2.5, 7.0] {
            let mut p = task();
            resolve(
                &mut p,
                ScheduleEdit {
                    start: Some(Some(at(3, 8))),
                    duration: Some(Some(d)),
                    ..Default::default()
                },
            )
            .unwrap();
            let end = p.end_date;
            let mut q = task();
            resolve(
                &mut q,
                ScheduleEdit {
                    start: Some(Some(at(3, 8))),
                    end: Some(end),
                    ..Default::default()
                },
            )
            .unwrap();
            assert!((q.duration.unwrap() - d).abs() < 1e-9);
            assert_eq!(cal.end_date(at(3, 8), d, DurationUnit::Day, false), end.unwrap());
        }
    }

    #[test]
    fn test_segments() {
        let cal = WorkingCalendar::new();
        let mut p = task();
        apply_segments(
            &mut p,
            &[
                SegmentInput {
                    start: Some(at(8, 8)),
                    end: Some(at(9, 17)),
                    duration: None,
                },
                SegmentInput {
                    start: Some(at(2, 8)),
                    end: None,
                    duration: Some(1.0),
                },
                SegmentInput::default(),
            ],
            &cal,
        );
        assert_eq!(p.segments.len(), 2);
        assert_eq!(p.start_date, Some(at(2, 8)));
        assert_eq!(p.end_date, Some(at(9, 17)));
        assert_eq!(p.duration, Some(3.0));
    }
}
