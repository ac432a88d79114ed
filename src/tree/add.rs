//! Adding tasks.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::resource_view;
use crate::context::EditContext;
use crate::error::EditError;
use crate::mapper::{apply_fields, FieldChanges};
use crate::models::{GanttProperties, TaskId, TaskRecord, UniqueId};
use crate::predecessor::{detach_all, set_dependencies, snap_to_links};
use crate::schedule::{
    apply_segments, apply_work_rules, refresh_task, resolve_dates, roll_up_ancestors,
    update_geometry, WorkTrigger,
};
use crate::store::TaskStore;

/// Where a new row goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowPosition {
    /// First root row.
    #[default]
    Top,
    /// Last root row.
    Bottom,
    /// Sibling just before the target row.
    Above,
    /// Sibling just after the target row.
    Below,
    /// Last child of the target row.
    Child,
}

/// Next free numeric task id.
pub fn next_task_id(store: &TaskStore) -> TaskId {
    TaskId::from(store.max_numeric_task_id() + 1)
}

/// Builds a detached record from a row.
///
/// Missing schedule values get defaults unless unscheduled tasks are
/// allowed: the start falls back to `default_start` (unless end and
/// duration are both given), and the duration to the configured default
/// (unless an end is given).
pub(crate) fn record_from_row(
    ctx: &EditContext<'_>,
    uid: UniqueId,
    id: TaskId,
    row: &Map<String, Value>,
    default_start: NaiveDateTime,
) -> Result<(TaskRecord, FieldChanges), EditError> {
    let settings = ctx.settings;
    let props = GanttProperties {
        duration_unit: settings.duration_unit,
        work_unit: settings.work_unit,
        task_type: settings.task_type,
        ..GanttProperties::default()
    };
    let mut record = TaskRecord::new(uid, id, props);
    record.task_data = row.clone();
    let mut changes = apply_fields(&mut record, row, settings, ctx.dates)?;

    let schedule = &mut changes.schedule;
    if !settings.allow_unscheduled_tasks {
        let has_start = schedule.start.flatten().is_some();
        let has_end = schedule.end.flatten().is_some();
        let has_duration = schedule.duration.flatten().is_some();
        if !has_start && !(has_end && has_duration) {
            schedule.start = Some(Some(default_start));
        }
        if !has_duration && !has_end {
            schedule.duration = Some(Some(settings.default_duration));
        }
    }
    resolve_dates(&mut record.props, schedule, ctx.dates, settings.allow_unscheduled_tasks)?;
    if let Some(segments) = &changes.segments {
        apply_segments(&mut record.props, segments, ctx.dates);
    }
    let trigger = if changes.work_changed {
        WorkTrigger::Work
    } else {
        WorkTrigger::Duration
    };
    apply_work_rules(&mut record.props, trigger, ctx.dates);

    let p = &mut record.props;
    p.auto_start_date = p.start_date;
    p.auto_end_date = p.end_date;
    p.auto_duration = p.duration;
    update_geometry(p, ctx.origin, settings.day_width);
    Ok((record, changes))
}

/// Adds a task built from `data` and returns its unique id.
///
/// A missing or already used id is replaced by the next numeric id. In
/// resource view the task is placed under its resource rows and
/// `position` is ignored. A dependency text seeds the task's links and
/// moves it to the earliest start they allow.
pub fn add_task(
    ctx: &mut EditContext<'_>,
    data: &Map<String, Value>,
    position: RowPosition,
    target: Option<UniqueId>,
) -> Result<UniqueId, EditError> {
    let id_field = ctx.settings.task_fields.id.clone();
    let id = match data.get(&id_field).and_then(TaskId::from_value) {
        Some(id) if !ctx.store.contains_task_id(&id) => id,
        Some(duplicate) => {
            let id = next_task_id(ctx.store);
            warn!(duplicate = %duplicate, assigned = %id, "task id in use; assigning a new one");
            id
        }
        None => next_task_id(ctx.store),
    };
    let default_start = ctx.settings.project_start_date.unwrap_or(ctx.origin);
    let uid = ctx.store.allocate_unique_id();
    let (mut record, changes) = record_from_row(ctx, uid, id.clone(), data, default_start)?;
    record.write_through(&id_field, id.to_value());

    if ctx.settings.is_resource_view() {
        resource_view::place(ctx, record);
    } else {
        let (parent, at) = placement(ctx, position, target);
        if let Some(p) = parent {
            become_parent(ctx, p);
        }
        ctx.store.insert(record, parent, at);
    }
    ctx.touch(uid);

    if let Some(text) = changes.dependency.as_deref() {
        set_dependencies(ctx, uid, text)?;
        snap_to_links(ctx, uid);
    }
    refresh_task(ctx, uid);
    roll_up_ancestors(ctx, uid);
    info!(task = %id, ?position, "task added");
    Ok(uid)
}

/// Parent and child position for a new row.
fn placement(
    ctx: &EditContext<'_>,
    position: RowPosition,
    target: Option<UniqueId>,
) -> (Option<UniqueId>, usize) {
    let Some(target) = target.filter(|&t| ctx.store.contains(t)) else {
        return match position {
            RowPosition::Bottom => (None, usize::MAX),
            _ => (None, 0),
        };
    };
    let parent = ctx.store.get(target).and_then(TaskRecord::parent_unique_id);
    let siblings = match parent.and_then(|p| ctx.store.get(p)) {
        Some(p) => p.child_records.as_slice(),
        None => ctx.store.roots(),
    };
    let at = siblings.iter().position(|&s| s == target).unwrap_or(siblings.len());
    match position {
        RowPosition::Top => (None, 0),
        RowPosition::Bottom => (None, usize::MAX),
        RowPosition::Above => (parent, at),
        RowPosition::Below => (parent, at + 1),
        RowPosition::Child => (Some(target), usize::MAX),
    }
}

/// Prepares `uid` to receive a child: a leaf drops its links, and the row
/// is expanded.
pub(crate) fn become_parent(ctx: &mut EditContext<'_>, uid: UniqueId) {
    let Some(record) = ctx.store.get(uid) else {
        return;
    };
    if record.is_leaf() && !record.props.predecessor.is_empty() {
        let id = record.task_id.clone();
        let removed = detach_all(ctx.store, &id);
        warn!(task = %id, links = removed.len(), "summary task links removed");
    }
    if let Some(record) = ctx.store.get_mut(uid) {
        record.expanded = true;
    }
    ctx.touch(uid);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::at;
    use crate::config::GanttSettings;
    use crate::models::WorkingCalendar;
    use serde_json::json;

    fn row(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_add_defaults_and_positions() {
        let mut store = TaskStore::new();
        let settings = GanttSettings::default();
        let cal = WorkingCalendar::new();
        let mut ctx = EditContext::new(&mut store, &settings, &cal, at(1, 0));

        let a = add_task(&mut ctx, &row(json!({"TaskName": "A"})), RowPosition::Bottom, None).unwrap();
        let r = ctx.store.get(a).unwrap();
        assert_eq!(r.task_id, TaskId::from(1));
        assert_eq!(r.props.start_date, Some(at(1, 8)));
        assert_eq!(r.props.duration, Some(5.0));
        assert_eq!(r.props.end_date, Some(at(5, 17)));
        assert_eq!(r.task_data["TaskID"], json!(1));

        let b = add_task(&mut ctx, &row(json!({"TaskID": 1})), RowPosition::Above, Some(a)).unwrap();
        assert_eq!(ctx.store.get(b).unwrap().task_id, TaskId::from(2));
        assert_eq!(ctx.store.get(b).unwrap().index, 0);

        let c = add_task(&mut ctx, &row(json!({"TaskName": "C"})), RowPosition::Child, Some(a)).unwrap();
        let parent = ctx.store.get(a).unwrap();
        assert!(parent.has_child_records);
        assert!(parent.expanded);
        assert_eq!(ctx.store.get(c).unwrap().level, 1);

        let d = add_task(&mut ctx, &row(json!({})), RowPosition::Below, Some(c)).unwrap();
        assert_eq!(ctx.store.parent_of(d).unwrap().unique_id, a);
    }

    #[test]
    fn test_add_with_dependency_snaps() {
        let mut store = TaskStore::new();
        let settings = GanttSettings::default();
        let cal = WorkingCalendar::new();
        let mut ctx = EditContext::new(&mut store, &settings, &cal, at(1, 0));
        add_task(
            &mut ctx,
            &row(json!({"TaskID": 1, "StartDate": "2024-01-01T08:00:00", "Duration": 2})),
            RowPosition::Bottom,
            None,
        )
        .unwrap();
        let b = add_task(
            &mut ctx,
            &row(json!({"TaskID": 2, "Duration": 1, "Predecessor": "1FS"})),
            RowPosition::Bottom,
            None,
        )
        .unwrap();
        let r = ctx.store.get(b).unwrap();
        assert_eq!(r.props.start_date, Some(at(3, 8)));
        assert_eq!(r.props.predecessors_name, "1FS");
    }

    #[test]
    fn test_add_end_and_duration_without_start() {
        let mut store = TaskStore::new();
        let settings = GanttSettings::default();
        let cal = WorkingCalendar::new();
        let mut ctx = EditContext::new(&mut store, &settings, &cal, at(1, 0));
        let a = add_task(
            &mut ctx,
            &row(json!({"EndDate": "2024-01-10T17:00:00", "Duration": 2})),
            RowPosition::Top,
            None,
        )
        .unwrap();
        assert_eq!(ctx.store.get(a).unwrap().props.start_date, Some(at(9, 8)));
    }
}
