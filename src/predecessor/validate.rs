//! Required dates, violations and their resolution.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::links::{incoming, remove_edge, set_offset};
use crate::config::{GanttSettings, LinkResolution};
use crate::context::EditContext;
use crate::dates::DateService;
use crate::models::{DurationUnit, GanttProperties, LinkType, PredecessorEdge, TaskId, TaskRecord, UniqueId};
use crate::schedule::move_task;

/// Why a link check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationType {
    /// A directly edited task starts before its links allow.
    TaskWarning,
    /// A task moved with its parent starts before its links allow.
    ParentTaskWarning,
}

/// A task whose start violates one or more incoming links.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkViolation {
    pub violation_type: ViolationType,
    pub task_id: TaskId,
    pub unique_id: UniqueId,
    /// The violated edges.
    pub edges: Vec<PredecessorEdge>,
    /// Earliest start the links allow.
    pub required_start: NaiveDateTime,
}

/// Moves `date` by a signed link offset.
pub fn apply_offset(
    dates: &dyn DateService,
    date: NaiveDateTime,
    offset: f64,
    unit: DurationUnit,
) -> NaiveDateTime {
    if offset > 0.0 {
        dates.end_date(date, offset, unit, false)
    } else if offset < 0.0 {
        dates.start_date(date, -offset, unit)
    } else {
        date
    }
}

/// Earliest start of `succ` allowed by `edge` from `pred`.
pub fn required_start(
    dates: &dyn DateService,
    edge: &PredecessorEdge,
    pred: &GanttProperties,
    succ: &GanttProperties,
) -> Option<NaiveDateTime> {
    let shifted = |date: NaiveDateTime| apply_offset(dates, date, edge.offset, edge.offset_unit);
    let from_end = |end: NaiveDateTime| {
        let end = dates.check_end_date(end);
        match succ.duration {
            Some(d) if d > 0.0 && !succ.is_milestone => dates.start_date(end, d, succ.duration_unit),
            _ => end,
        }
    };
    Some(match edge.link_type {
        LinkType::FS => dates.check_start_date(shifted(pred.end_date?)),
        LinkType::SS => dates.check_start_date(shifted(pred.start_date?)),
        LinkType::FF => from_end(shifted(pred.end_date?)),
        LinkType::SF => from_end(shifted(pred.start_date?)),
    })
}

/// Offset that makes `edge` exactly match the current dates.
pub fn offset_between(
    dates: &dyn DateService,
    edge: &PredecessorEdge,
    pred: &GanttProperties,
    succ: &GanttProperties,
) -> Option<f64> {
    let (from, to) = match edge.link_type {
        LinkType::FS => (pred.end_date?, succ.start_date?),
        LinkType::SS => (pred.start_date?, succ.start_date?),
        LinkType::FF => (pred.end_date?, succ.end_date?),
        LinkType::SF => (pred.start_date?, succ.end_date?),
    };
    let offset = dates.duration(from, to, edge.offset_unit);
    Some((offset * 100.0).round() / 100.0)
}

/// One incoming edge with the start it demands.
#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
    pub edge: PredecessorEdge,
    pub start: NaiveDateTime,
}

/// Whether links drive the dates of `record`.
pub fn is_link_driven(settings: &GanttSettings, record: &TaskRecord) -> bool {
    settings.enable_predecessor_validation
        && record.is_leaf()
        && !record.is_resource_group
        && !record.is_delete
        && (record.props.is_auto_schedule || settings.validate_manual_tasks_on_linking)
}

/// Requirements of every incoming edge of `uid`.
///
/// Edges whose predecessor is missing or unscheduled are skipped.
pub fn requirements(ctx: &EditContext<'_>, uid: UniqueId) -> Vec<Requirement> {
    let Some(record) = ctx.store.get(uid) else {
        return Vec::new();
    };
    incoming(ctx.store, &record.task_id)
        .into_iter()
        .filter_map(|edge| {
            let Some(pred) = ctx.store.by_task_id(&edge.from) else {
                warn!(from = %edge.from, to = %edge.to, "link endpoint missing");
                return None;
            };
            let start = required_start(ctx.dates, &edge, &pred.props, &record.props)?;
            Some(Requirement { edge, start })
        })
        .collect()
}

/// Latest of the required starts.
pub fn earliest_allowed(reqs: &[Requirement]) -> Option<NaiveDateTime> {
    reqs.iter().map(|r| r.start).max()
}

/// Checks a moved task against its incoming links.
pub fn detect_violation(
    ctx: &EditContext<'_>,
    uid: UniqueId,
    violation_type: ViolationType,
) -> Option<LinkViolation> {
    let record = ctx.store.get(uid)?;
    if !is_link_driven(ctx.settings, record) {
        return None;
    }
    let start = record.props.start_date?;
    let reqs = requirements(ctx, uid);
    let required_start = earliest_allowed(&reqs)?;
    let edges: Vec<PredecessorEdge> = reqs
        .into_iter()
        .filter(|r| r.start > start)
        .map(|r| r.edge)
        .collect();
    if edges.is_empty() {
        return None;
    }
    Some(LinkViolation {
        violation_type,
        task_id: record.task_id.clone(),
        unique_id: uid,
        edges,
        required_start,
    })
}

fn rewrite_offsets(ctx: &mut EditContext<'_>, uid: UniqueId, edges: &[PredecessorEdge]) {
    for edge in edges {
        let (Some(pred), Some(succ)) = (ctx.store.by_task_id(&edge.from), ctx.store.get(uid)) else {
            continue;
        };
        if let Some(offset) = offset_between(ctx.dates, edge, &pred.props, &succ.props) {
            debug!(from = %edge.from, to = %edge.to, offset, "rewriting link offset");
            set_offset(ctx.store, edge, offset);
        }
    }
    ctx.touch(uid);
}

/// Applies the chosen resolution to a violation.
pub fn resolve_violation(
    ctx: &mut EditContext<'_>,
    violation: &LinkViolation,
    resolution: LinkResolution,
) {
    let uid = violation.unique_id;
    match resolution {
        LinkResolution::PreserveLinkWithEditing => rewrite_offsets(ctx, uid, &violation.edges),
        LinkResolution::RemoveLink => {
            for edge in &violation.edges {
                remove_edge(ctx.store, &edge.from, &edge.to);
            }
            ctx.touch(uid);
        }
        LinkResolution::RespectLink => {
            snap_to_links(ctx, uid);
        }
    }
}

/// Moves a link-driven task to the earliest start its links allow.
///
/// Returns whether the task moved.
pub fn snap_to_links(ctx: &mut EditContext<'_>, uid: UniqueId) -> bool {
    let Some(record) = ctx.store.get(uid) else {
        return false;
    };
    if !is_link_driven(ctx.settings, record) {
        return false;
    }
    let current = record.props.start_date;
    let Some(target) = earliest_allowed(&requirements(ctx, uid)) else {
        return false;
    };
    if current == Some(target) {
        return false;
    }
    move_task(ctx, uid, target);
    true
}

/// Tightens the binding links of a task edited later than required.
///
/// Binding edges are those whose requirement equals the latest one; their
/// offsets absorb the gap. Returns whether any offset changed.
pub fn retighten(ctx: &mut EditContext<'_>, uid: UniqueId) -> bool {
    let Some(record) = ctx.store.get(uid) else {
        return false;
    };
    if !is_link_driven(ctx.settings, record) {
        return false;
    }
    let Some(start) = record.props.start_date else {
        return false;
    };
    let reqs = requirements(ctx, uid);
    let Some(latest) = earliest_allowed(&reqs) else {
        return false;
    };
    if start <= latest {
        return false;
    }
    let binding: Vec<PredecessorEdge> = reqs
        .into_iter()
        .filter(|r| r.start == latest)
        .map(|r| r.edge)
        .collect();
    rewrite_offsets(ctx, uid, &binding);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::at;
    use crate::models::WorkingCalendar;
    use chrono::NaiveDate;

    fn props(start: NaiveDateTime, end: NaiveDateTime, days: f64) -> GanttProperties {
        GanttProperties::new("T")
            .with_start(start)
            .with_end(end)
            .with_duration(days)
    }

    #[test]
    fn test_required_start_by_link_type() {
        let cal = WorkingCalendar::new();
        let pred = props(at(1, 8), at(10, 17), 10.0);
        let succ = props(at(2, 8), at(3, 17), 2.0);
        let edge = |t| PredecessorEdge::new(1, 2, t);

        assert_eq!(required_start(&cal, &edge(LinkType::FS), &pred, &succ), Some(at(11, 8)));
        assert_eq!(required_start(&cal, &edge(LinkType::SS), &pred, &succ), Some(at(1, 8)));
        assert_eq!(required_start(&cal, &edge(LinkType::FF), &pred, &succ), Some(at(9, 8)));
        // The predecessor's start, read as a finish, is the previous day's end.
        let dec_30 = NaiveDate::from_ymd_opt(2023, 12, 30).unwrap().and_hms_opt(8, 0, 0).unwrap();
        assert_eq!(required_start(&cal, &edge(LinkType::SF), &pred, &succ), Some(dec_30));
    }

    #[test]
    fn test_required_start_with_offsets() {
        let cal = WorkingCalendar::new();
        let pred = props(at(1, 8), at(10, 17), 10.0);
        let succ = props(at(2, 8), at(3, 17), 2.0);
        let lag = PredecessorEdge::new(1, 2, LinkType::FS).with_offset(1.0, DurationUnit::Day);
        assert_eq!(required_start(&cal, &lag, &pred, &succ), Some(at(12, 8)));
        let lead = PredecessorEdge::new(1, 2, LinkType::FS).with_offset(-2.0, DurationUnit::Day);
        assert_eq!(required_start(&cal, &lead, &pred, &succ), Some(at(9, 8)));
    }

    #[test]
    fn test_offset_between_inverts_required_start() {
        let cal = WorkingCalendar::new();
        let pred = props(at(1, 8), at(10, 17), 10.0);
        for (t, offset) in [
            (LinkType::FS, 3.0),
            (LinkType::SS, -2.0),
            (LinkType::FF, 1.5),
            (LinkType::SF, 4.0),
        ] {
            let edge = PredecessorEdge::new(1, 2, t).with_offset(offset, DurationUnit::Day);
            let mut succ = props(at(20, 8), at(21, 17), 2.0);
            let start = required_start(&cal, &edge, &pred, &succ).unwrap();
            succ.start_date = Some(start);
            succ.end_date = Some(cal.end_date(start, 2.0, DurationUnit::Day, false));
            assert_eq!(offset_between(&cal, &edge, &pred, &succ), Some(offset), "{t}");
        }
    }
}
