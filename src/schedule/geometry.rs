//! Taskbar geometry.
//!
//! Pure functions of dates: calendar minutes from the timeline origin,
//! scaled by the pixel width of one calendar day.

use chrono::NaiveDateTime;

use crate::models::GanttProperties;

const MINUTES_PER_DAY: f64 = 1440.0;

fn span_px(from: NaiveDateTime, to: NaiveDateTime, day_width: f64) -> f64 {
    (to - from).num_minutes() as f64 / MINUTES_PER_DAY * day_width
}

/// Recomputes `left`, `width`, `progress_width` and the baseline geometry.
///
/// Milestones have zero width; unscheduled tasks collapse to zero.
pub fn update_geometry(props: &mut GanttProperties, origin: NaiveDateTime, day_width: f64) {
    match props.start_date {
        Some(start) => {
            props.left = span_px(origin, start, day_width);
            props.width = match props.end_date {
                Some(end) if !props.is_milestone && end > start => span_px(start, end, day_width),
                _ => 0.0,
            };
        }
        None => {
            props.left = 0.0;
            props.width = 0.0;
        }
    }
    props.progress_width = props.width * props.progress / 100.0;
    update_baseline_geometry(props, origin, day_width);
}

/// Recomputes `baseline_left` and `baseline_width` only.
pub fn update_baseline_geometry(props: &mut GanttProperties, origin: NaiveDateTime, day_width: f64) {
    match (props.baseline_start_date, props.baseline_end_date) {
        (Some(start), end) => {
            props.baseline_left = span_px(origin, start, day_width);
            props.baseline_width = end
                .filter(|&e| e > start)
                .map(|e| span_px(start, e, day_width))
                .unwrap_or(0.0);
        }
        (None, _) => {
            props.baseline_left = 0.0;
            props.baseline_width = 0.0;
        }
    }
}
