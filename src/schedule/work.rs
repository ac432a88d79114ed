//! Work / unit / duration triangle.
//!
//! # Algorithm
//!
//! With `units` the summed resource allocation (1.0 = one full-time
//! resource) and durations converted to working minutes:
//!
//! - work from duration: `work = duration × units`
//! - duration from work: `duration = work / units`
//! - unit from work: each resource gets `work / duration / n × 100`
//!
//! Which side moves depends on the task type, the trigger, and whether the
//! task is auto-scheduled:
//!
//! | task type | trigger | auto | manual |
//! |---|---|---|---|
//! | FixedUnit | work, resources | duration from work | unit from work |
//! | FixedUnit | duration | work from duration | work from duration |
//! | FixedWork | duration | unit from work (zero duration zeroes work) | work from duration |
//! | FixedWork | work, resources | duration from work | unit from work |
//! | FixedDuration | work, or resources while effort-driven | unit from work | work from duration |
//! | FixedDuration | otherwise | work from duration | work from duration |
//!
//! FixedUnit and FixedWork tasks without resources are left untouched.
//! FixedDuration tasks without resources count as one full-time resource.

use crate::dates::DateService;
use crate::models::{total_units, GanttProperties, TaskType};

/// What changed on the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkTrigger {
    /// The work value was edited.
    Work,
    /// The resource assignment changed.
    Resources,
    /// Duration or end date changed.
    Duration,
}

/// Applies the triangle rules to a leaf task.
pub fn apply_work_rules(props: &mut GanttProperties, trigger: WorkTrigger, dates: &dyn DateService) {
    let has_resources = !props.resource_info.is_empty();
    let auto = props.is_auto_schedule;
    match props.task_type {
        TaskType::FixedUnit => {
            if !has_resources {
                return;
            }
            match trigger {
                WorkTrigger::Work | WorkTrigger::Resources if auto => duration_from_work(props, dates),
                WorkTrigger::Work | WorkTrigger::Resources => unit_from_work(props, dates),
                WorkTrigger::Duration => work_from_duration(props, dates),
            }
        }
        TaskType::FixedWork => {
            if !has_resources {
                return;
            }
            match trigger {
                WorkTrigger::Duration if auto => {
                    if props.duration == Some(0.0) {
                        props.work = 0.0;
                    } else {
                        unit_from_work(props, dates);
                    }
                }
                WorkTrigger::Duration => work_from_duration(props, dates),
                _ if auto => duration_from_work(props, dates),
                _ => unit_from_work(props, dates),
            }
        }
        TaskType::FixedDuration => {
            let special = trigger == WorkTrigger::Work
                || (trigger == WorkTrigger::Resources && props.effort_driven);
            if special && auto && has_resources {
                unit_from_work(props, dates);
            } else if !(special && auto) {
                work_from_duration(props, dates);
            }
        }
    }
}

fn units(props: &GanttProperties) -> f64 {
    if props.resource_info.is_empty() && props.task_type == TaskType::FixedDuration {
        1.0
    } else {
        total_units(&props.resource_info)
    }
}

fn duration_minutes(props: &GanttProperties, dates: &dyn DateService) -> f64 {
    props
        .duration
        .map(|d| d * dates.minutes_per(props.duration_unit))
        .unwrap_or(0.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `work = duration × units`, in the work unit.
pub fn work_from_duration(props: &mut GanttProperties, dates: &dyn DateService) {
    let per_work_unit = dates.minutes_per(props.work_unit);
    if per_work_unit <= 0.0 {
        return;
    }
    props.work = round2(duration_minutes(props, dates) * units(props) / per_work_unit);
}

/// `duration = work / units`; the end date follows from the start.
pub fn duration_from_work(props: &mut GanttProperties, dates: &dyn DateService) {
    let units = units(props);
    let per_unit = dates.minutes_per(props.duration_unit);
    if units <= 0.0 || per_unit <= 0.0 {
        return;
    }
    let minutes = props.work * dates.minutes_per(props.work_unit) / units;
    let duration = round2(minutes / per_unit);
    props.duration = Some(duration);
    props.is_milestone = duration == 0.0;
    if let Some(start) = props.start_date {
        props.end_date = Some(dates.end_date(start, duration, props.duration_unit, props.is_milestone));
    }
}

/// Spreads the work evenly over the assigned resources.
pub fn unit_from_work(props: &mut GanttProperties, dates: &dyn DateService) {
    let minutes = duration_minutes(props, dates);
    let n = props.resource_info.len();
    if minutes <= 0.0 || n == 0 {
        return;
    }
    let work_minutes = props.work * dates.minutes_per(props.work_unit);
    let unit = round2(work_minutes / minutes / n as f64 * 100.0);
    for resource in &mut props.resource_info {
        resource.unit = unit;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::at;
    use crate::models::{DurationUnit, ResourceRef, WorkingCalendar};

    fn task(task_type: TaskType, resources: usize) -> GanttProperties {
        let mut p = GanttProperties::new("A")
            .with_start(at(1, 8))
            .with_end(at(2, 17))
            .with_duration(2.0);
        p.task_type = task_type;
        p.resource_info = (0..resources as i64).map(ResourceRef::new).collect();
        p
    }

    #[test]
    fn test_fixed_unit_work_from_duration() {
        let cal = WorkingCalendar::new();
        let mut p = task(TaskType::FixedUnit, 2);
        apply_work_rules(&mut p, WorkTrigger::Duration, &cal);
        // 2 days × 9 h × 2 resources
        assert_eq!(p.work, 36.0);
    }

    #[test]
    fn test_fixed_unit_duration_from_work() {
        let cal = WorkingCalendar::new();
        let mut p = task(TaskType::FixedUnit, 1);
        p.work = 27.0;
        apply_work_rules(&mut p, WorkTrigger::Work, &cal);
        assert_eq!(p.duration, Some(3.0));
        assert_eq!(p.end_date, Some(at(3, 17)));
    }

    #[test]
    fn test_fixed_unit_manual_recomputes_units() {
        let cal = WorkingCalendar::new();
        let mut p = task(TaskType::FixedUnit, 2).manual();
        p.work = 9.0;
        apply_work_rules(&mut p, WorkTrigger::Work, &cal);
        assert_eq!(p.duration, Some(2.0));
        assert_eq!(p.resource_info[0].unit, 25.0);
        assert_eq!(p.resource_info[1].unit, 25.0);
    }

    #[test]
    fn test_no_resources_skips_fixed_unit() {
        let cal = WorkingCalendar::new();
        let mut p = task(TaskType::FixedUnit, 0);
        p.work = 5.0;
        apply_work_rules(&mut p, WorkTrigger::Work, &cal);
        assert_eq!(p.duration, Some(2.0));
        assert_eq!(p.work, 5.0);
    }

    #[test]
    fn test_fixed_work_duration_change() {
        let cal = WorkingCalendar::new();
        let mut p = task(TaskType::FixedWork, 1);
        p.work = 9.0;
        apply_work_rules(&mut p, WorkTrigger::Duration, &cal);
        assert_eq!(p.resource_info[0].unit, 50.0);

        p.duration = Some(0.0);
        apply_work_rules(&mut p, WorkTrigger::Duration, &cal);
        assert_eq!(p.work, 0.0);
    }

    #[test]
    fn test_fixed_duration_without_resources() {
        let cal = WorkingCalendar::new();
        let mut p = task(TaskType::FixedDuration, 0);
        apply_work_rules(&mut p, WorkTrigger::Duration, &cal);
        assert_eq!(p.work, 18.0);
    }

    #[test]
    fn test_fixed_duration_work_edit_moves_units() {
        let cal = WorkingCalendar::new();
        let mut p = task(TaskType::FixedDuration, 1);
        p.work = 36.0;
        apply_work_rules(&mut p, WorkTrigger::Work, &cal);
        assert_eq!(p.duration, Some(2.0));
        assert_eq!(p.resource_info[0].unit, 200.0);
        assert_eq!(p.duration_unit, DurationUnit::Day);
    }
}
