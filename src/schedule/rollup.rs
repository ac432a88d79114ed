//! Ancestor roll-up, mode switch and parent shifts.

use chrono::NaiveDateTime;
use tracing::debug;

use super::geometry::update_geometry;
use crate::context::EditContext;
use crate::dates::DateService;
use crate::models::{DurationUnit, UniqueId};

/// Mirrors a leaf's live schedule into its auto fields and refreshes its
/// geometry.
pub fn refresh_task(ctx: &mut EditContext<'_>, uid: UniqueId) {
    let (origin, day_width) = (ctx.origin, ctx.settings.day_width);
    let Some(record) = ctx.store.get_mut(uid) else {
        return;
    };
    if record.is_leaf() && !record.is_resource_group {
        let p = &mut record.props;
        p.auto_start_date = p.start_date;
        p.auto_end_date = p.end_date;
        p.auto_duration = p.duration;
    }
    update_geometry(&mut record.props, origin, day_width);
    ctx.touch(uid);
}

/// Moves a task to `start`, keeping its duration (and its segment layout).
pub fn move_task(ctx: &mut EditContext<'_>, uid: UniqueId, start: NaiveDateTime) {
    let dates = ctx.dates;
    let Some(record) = ctx.store.get_mut(uid) else {
        return;
    };
    let p = &mut record.props;
    let start = dates.check_start_date(start);
    let old = p.start_date;
    p.start_date = Some(start);
    if let Some(d) = p.duration {
        p.end_date = Some(dates.end_date(start, d, p.duration_unit, p.is_milestone));
    }
    if let Some(old) = old {
        let delta = dates.duration(old, start, DurationUnit::Minute).round() as i64;
        for segment in &mut p.segments {
            let len = dates.duration(segment.start_date, segment.end_date, DurationUnit::Minute);
            segment.start_date = shift_by(dates, segment.start_date, delta);
            segment.end_date =
                dates.end_date(segment.start_date, len, DurationUnit::Minute, false);
        }
    }
    refresh_task(ctx, uid);
}

/// Shifts `date` by a signed amount of working minutes.
pub fn shift_by(dates: &dyn DateService, date: NaiveDateTime, minutes: i64) -> NaiveDateTime {
    let shifted = if minutes >= 0 {
        dates.end_date(date, minutes as f64, DurationUnit::Minute, false)
    } else {
        dates.start_date(date, (-minutes) as f64, DurationUnit::Minute)
    };
    dates.check_start_date(shifted)
}

/// Moves an auto parent to `start` by shifting its auto-scheduled leaves
/// by the same working-time delta.
///
/// Returns the shifted leaves; the parent itself follows on roll-up.
pub fn shift_parent(
    ctx: &mut EditContext<'_>,
    uid: UniqueId,
    start: NaiveDateTime,
) -> Vec<UniqueId> {
    let Some(old) = ctx.store.get(uid).and_then(|r| r.props.start_date) else {
        return Vec::new();
    };
    let new = ctx.dates.check_start_date(start);
    let delta = ctx.dates.duration(old, new, DurationUnit::Minute).round() as i64;
    if delta == 0 {
        return Vec::new();
    }
    let leaves: Vec<UniqueId> = ctx
        .store
        .descendants(uid)
        .into_iter()
        .filter(|&d| {
            ctx.store
                .get(d)
                .is_some_and(|r| r.is_leaf() && r.props.is_auto_schedule && !r.is_delete)
        })
        .collect();
    debug!(parent = uid, delta, leaves = leaves.len(), "shifting parent");
    for &leaf in &leaves {
        let Some(from) = ctx.store.get(leaf).and_then(|r| r.props.start_date) else {
            continue;
        };
        let to = shift_by(ctx.dates, from, delta);
        move_task(ctx, leaf, to);
    }
    leaves
}

/// Duration-weighted progress of `(progress, working minutes)` pairs.
///
/// Rounded, clamped to 0..=100 and floored; zero total weight gives 0.
pub fn weighted_progress(children: &[(f64, f64)]) -> f64 {
    let total: f64 = children.iter().map(|(_, m)| m).sum();
    let sum: f64 = children.iter().map(|(p, m)| p * m).sum();
    let value = (sum / total).round();
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0).floor()
    }
}

/// Recomputes one parent from its children.
///
/// Auto fields always track the roll-up; the live schedule follows only
/// for auto-scheduled parents. Children staged for deletion are skipped.
pub fn roll_up_parent(ctx: &mut EditContext<'_>, parent: UniqueId) {
    let Some(record) = ctx.store.get(parent) else {
        return;
    };
    let children: Vec<_> = record
        .child_records
        .iter()
        .filter_map(|&c| ctx.store.get(c))
        .filter(|c| !c.is_delete)
        .map(|c| {
            let p = &c.props;
            let minutes = p
                .duration
                .map(|d| ctx.dates.to_minutes(d, p.duration_unit) as f64)
                .unwrap_or(0.0);
            (p.auto_start_date, p.auto_end_date, p.is_milestone, p.progress, minutes)
        })
        .collect();
    if children.is_empty() {
        return;
    }
    let auto_start = children.iter().filter_map(|c| c.0).min();
    let auto_end = children.iter().filter_map(|c| c.1).max();
    let weights: Vec<(f64, f64)> = children
        .iter()
        .filter(|c| !c.2)
        .map(|c| (c.3, c.4))
        .collect();
    let progress = weighted_progress(&weights);

    let dates = ctx.dates;
    let (origin, day_width) = (ctx.origin, ctx.settings.day_width);
    let Some(record) = ctx.store.get_mut(parent) else {
        return;
    };
    let p = &mut record.props;
    let auto_duration = match (auto_start, auto_end) {
        (Some(s), Some(e)) => Some(dates.duration(s, e, p.duration_unit).max(0.0)),
        _ => None,
    };
    p.auto_start_date = auto_start;
    p.auto_end_date = auto_end;
    p.auto_duration = auto_duration;
    if p.is_auto_schedule {
        p.start_date = auto_start;
        p.end_date = auto_end;
        p.duration = auto_duration;
        p.is_milestone = false;
    }
    p.progress = progress;
    update_geometry(p, origin, day_width);
    ctx.touch(parent);
}

/// Rolls every ancestor of `uid` up, closest first.
pub fn roll_up_ancestors(ctx: &mut EditContext<'_>, uid: UniqueId) {
    for parent in ctx.store.ancestors(uid) {
        roll_up_parent(ctx, parent);
    }
}

/// Re-derives a task after its manual/auto flag flipped.
///
/// A parent switched to auto takes its rolled-up dates; a task switched to
/// manual keeps its dates while the auto fields keep tracking the roll-up.
pub fn switch_mode(ctx: &mut EditContext<'_>, uid: UniqueId) {
    let Some(record) = ctx.store.get(uid) else {
        return;
    };
    if record.is_leaf() {
        refresh_task(ctx, uid);
        return;
    }
    roll_up_parent(ctx, uid);
    refresh_task(ctx, uid);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::at;
    use crate::config::GanttSettings;
    use crate::models::{GanttProperties, TaskId, TaskRecord, WorkingCalendar};
    use crate::store::TaskStore;

    fn leaf(store: &mut TaskStore, id: i64, start: u32, days: f64, progress: f64) -> TaskRecord {
        let cal = WorkingCalendar::new();
        let uid = store.allocate_unique_id();
        let end = cal.end_date(at(start, 8), days, DurationUnit::Day, days == 0.0);
        let mut props = GanttProperties::new(format!("T{id}"))
            .with_start(at(start, 8))
            .with_end(end)
            .with_duration(days)
            .with_progress(progress);
        props.is_milestone = days == 0.0;
        TaskRecord::new(uid, id, props)
    }

    /// 1 (parent) ── 2 (5d, 40%), 3 (1d, 100%), 4 (milestone, 0%)
    fn sample() -> TaskStore {
        let mut s = TaskStore::new();
        let uid = s.allocate_unique_id();
        s.insert(TaskRecord::new(uid, 1, GanttProperties::new("P")), None, 0);
        let c = leaf(&mut s, 2, 1, 5.0, 40.0);
        s.insert(c, Some(uid), 0);
        let c = leaf(&mut s, 3, 8, 1.0, 100.0);
        s.insert(c, Some(uid), 1);
        let c = leaf(&mut s, 4, 9, 0.0, 0.0);
        s.insert(c, Some(uid), 2);
        s
    }

    fn refresh_all(ctx: &mut EditContext<'_>) {
        let ids: Vec<UniqueId> = ctx.store.flat_ids().to_vec();
        for uid in ids {
            refresh_task(ctx, uid);
        }
    }

    #[test]
    fn test_weighted_progress() {
        assert_eq!(weighted_progress(&[(40.0, 5.0), (100.0, 1.0)]), 50.0);
        assert_eq!(weighted_progress(&[(10.0, 0.0)]), 0.0);
        assert_eq!(weighted_progress(&[]), 0.0);
        assert_eq!(weighted_progress(&[(33.3, 1.0), (33.3, 2.0)]), 33.0);
    }

    #[test]
    fn test_roll_up_parent() {
        let mut store = sample();
        let settings = GanttSettings::default();
        let cal = WorkingCalendar::new();
        let mut ctx = EditContext::new(&mut store, &settings, &cal, at(1, 0));
        refresh_all(&mut ctx);
        let parent = ctx.store.primary_uid(&TaskId::from(1)).unwrap();
        roll_up_parent(&mut ctx, parent);

        let p = &ctx.store.get(parent).unwrap().props;
        assert_eq!(p.start_date, Some(at(1, 8)));
        assert_eq!(p.end_date, Some(at(9, 8)));
        assert_eq!(p.auto_start_date, p.start_date);
        assert_eq!(p.progress, 50.0);
        assert!(ctx.touched.contains(&parent));
    }

    #[test]
    fn test_manual_parent_keeps_dates() {
        let mut store = sample();
        let parent = store.primary_uid(&TaskId::from(1)).unwrap();
        {
            let p = &mut store.get_mut(parent).unwrap().props;
            p.is_auto_schedule = false;
            p.start_date = Some(at(20, 8));
        }
        let settings = GanttSettings::default();
        let cal = WorkingCalendar::new();
        let mut ctx = EditContext::new(&mut store, &settings, &cal, at(1, 0));
        refresh_all(&mut ctx);
        roll_up_parent(&mut ctx, parent);
        let p = &ctx.store.get(parent).unwrap().props;
        assert_eq!(p.start_date, Some(at(20, 8)));
        assert_eq!(p.auto_start_date, Some(at(1, 8)));

        ctx.store.get_mut(parent).unwrap().props.is_auto_schedule = true;
        switch_mode(&mut ctx, parent);
        assert_eq!(ctx.store.get(parent).unwrap().props.start_date, Some(at(1, 8)));
    }

    #[test]
    fn test_shift_parent_moves_auto_leaves() {
        let mut store = sample();
        let parent = store.primary_uid(&TaskId::from(1)).unwrap();
        let manual = store.primary_uid(&TaskId::from(3)).unwrap();
        store.get_mut(manual).unwrap().props.is_auto_schedule = false;
        let settings = GanttSettings::default();
        let cal = WorkingCalendar::new();
        let mut ctx = EditContext::new(&mut store, &settings, &cal, at(1, 0));
        refresh_all(&mut ctx);
        roll_up_parent(&mut ctx, parent);

        let shifted = shift_parent(&mut ctx, parent, at(3, 8));
        assert_eq!(shifted.len(), 2);
        let t2 = ctx.store.by_task_id(&TaskId::from(2)).unwrap();
        assert_eq!(t2.props.start_date, Some(at(3, 8)));
        assert_eq!(t2.props.end_date, Some(at(7, 17)));
        let t3 = ctx.store.by_task_id(&TaskId::from(3)).unwrap();
        assert_eq!(t3.props.start_date, Some(at(8, 8)));
    }

    #[test]
    fn test_shift_by_negative() {
        let cal = WorkingCalendar::new();
        assert_eq!(shift_by(&cal, at(2, 8), -540), at(1, 8));
        assert_eq!(shift_by(&cal, at(1, 8), 540), at(2, 8));
        assert_eq!(shift_by(&cal, at(1, 8), 60), at(1, 9));
    }
}
