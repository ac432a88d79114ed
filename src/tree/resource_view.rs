//! Resource view: one group row per resource, with a clone of each task
//! under every resource it is assigned to.
//!
//! Clones share the task id and carry identical properties; their
//! `shared_task_unique_ids` list every clone, themselves included. Tasks
//! without resources sit under a lazily created "unassigned" group.

use tracing::debug;

use crate::context::EditContext;
use crate::models::{GanttProperties, ResourceId, ResourceRef, TaskId, TaskRecord, UniqueId};
use crate::store::TaskStore;

/// Task id of the group row for `resource`.
pub fn group_id(resource: &ResourceId) -> TaskId {
    TaskId::new(format!("R{resource}"))
}

/// Task id of the group row for unassigned tasks.
pub fn unassigned_group_id() -> TaskId {
    TaskId::new("R-unassigned")
}

/// Returns the group row for `resource` (or the unassigned group),
/// creating it at the end of the root list when missing.
pub fn ensure_group(ctx: &mut EditContext<'_>, resource: Option<&ResourceRef>) -> UniqueId {
    let (id, name) = match resource {
        Some(r) => {
            let name = ctx
                .settings
                .resources
                .iter()
                .find(|known| known.id == r.id)
                .map(|known| known.name.clone())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| {
                    if r.name.is_empty() {
                        r.id.to_string()
                    } else {
                        r.name.clone()
                    }
                });
            (group_id(&r.id), name)
        }
        None => (unassigned_group_id(), ctx.settings.unassigned_task_label.clone()),
    };
    if let Some(uid) = ctx.store.primary_uid(&id) {
        return uid;
    }
    let uid = ctx.store.allocate_unique_id();
    let props = GanttProperties {
        duration_unit: ctx.settings.duration_unit,
        ..GanttProperties::new(name.clone())
    };
    let mut record = TaskRecord::new(uid, id.clone(), props);
    record.is_resource_group = true;
    record.write_through(&ctx.settings.task_fields.id, id.to_value());
    record.write_through(&ctx.settings.task_fields.name, name.into());
    ctx.store.insert(record, None, usize::MAX);
    debug!(group = %id, "resource group created");
    uid
}

/// Inserts a new task under the groups of its resources.
pub(crate) fn place(ctx: &mut EditContext<'_>, record: TaskRecord) -> UniqueId {
    let uid = record.unique_id;
    let id = record.task_id.clone();
    let resources = record.props.resource_info.clone();
    let first = ensure_group(ctx, resources.first());
    ctx.store.insert(record, Some(first), usize::MAX);
    for resource in resources.iter().skip(1) {
        let group = ensure_group(ctx, Some(resource));
        clone_under(ctx, uid, group);
    }
    link_clones(ctx.store, &id);
    uid
}

/// Copies `source` as a new leaf under `group`.
fn clone_under(ctx: &mut EditContext<'_>, source: UniqueId, group: UniqueId) -> Option<UniqueId> {
    let mut record = ctx.store.get(source)?.clone();
    let uid = ctx.store.allocate_unique_id();
    record.unique_id = uid;
    record.child_records.clear();
    record.parent_item = None;
    record.is_delete = false;
    ctx.store.insert(record, Some(group), usize::MAX);
    ctx.touch(uid);
    Some(uid)
}

/// Refreshes `shared_task_unique_ids` on every clone of `id`.
fn link_clones(store: &mut TaskStore, id: &TaskId) {
    let uids = store.uids_for(id).to_vec();
    for &uid in &uids {
        if let Some(r) = store.get_mut(uid) {
            r.props.shared_task_unique_ids = uids.clone();
        }
    }
}

/// Group task id a clone currently sits under.
fn group_of(store: &TaskStore, uid: UniqueId) -> Option<TaskId> {
    store
        .parent_of(uid)
        .filter(|p| p.is_resource_group)
        .map(|p| p.task_id.clone())
}

/// Copies the properties and row data of `uid` to its other clones.
///
/// Returns the clones that changed.
pub fn sync_clones(ctx: &mut EditContext<'_>, uid: UniqueId) -> Vec<UniqueId> {
    let Some(source) = ctx.store.get(uid) else {
        return Vec::new();
    };
    let props = source.props.clone();
    let task_data = source.task_data.clone();
    let fields = source.fields.clone();
    let mut changed = Vec::new();
    for &other in &props.shared_task_unique_ids {
        if other == uid {
            continue;
        }
        let Some(r) = ctx.store.get_mut(other) else {
            continue;
        };
        if r.props == props && r.task_data == task_data && r.fields == fields {
            continue;
        }
        r.props = props.clone();
        r.task_data = task_data.clone();
        r.fields = fields.clone();
        changed.push(other);
    }
    for &other in &changed {
        ctx.touch(other);
    }
    changed
}

/// Regroups the clones of `uid` after its resources changed from
/// `previous`: new resources get a clone, dropped ones lose theirs, and a
/// task left without resources moves to the unassigned group.
///
/// Returns the unique id that now represents the task (`uid` unless its
/// own clone was removed).
pub fn apply_resource_diff(
    ctx: &mut EditContext<'_>,
    uid: UniqueId,
    previous: &[ResourceRef],
) -> UniqueId {
    let Some(record) = ctx.store.get(uid) else {
        return uid;
    };
    let id = record.task_id.clone();
    let current = record.props.resource_info.clone();
    let added: Vec<&ResourceRef> = current
        .iter()
        .filter(|r| !previous.iter().any(|p| p.id == r.id))
        .collect();
    let removed: Vec<TaskId> = previous
        .iter()
        .filter(|p| !current.iter().any(|r| r.id == p.id))
        .map(|p| group_id(&p.id))
        .collect();

    let mut wanted: Vec<Option<&ResourceRef>> = added.into_iter().map(Some).collect();
    if current.is_empty() {
        wanted.push(None);
    }
    for resource in wanted {
        let group = ensure_group(ctx, resource);
        let group_task = ctx.store.get(group).map(|g| g.task_id.clone());
        let present = ctx
            .store
            .uids_for(&id)
            .iter()
            .any(|&u| group_of(ctx.store, u) == group_task);
        if !present {
            clone_under(ctx, uid, group);
        }
    }

    let unassigned = unassigned_group_id();
    for clone in ctx.store.uids_for(&id).to_vec() {
        let Some(group) = group_of(ctx.store, clone) else {
            continue;
        };
        let stale = removed.contains(&group) || (!current.is_empty() && group == unassigned);
        if stale {
            ctx.store.remove(clone);
            ctx.touched.retain(|&u| u != clone);
        }
    }

    link_clones(ctx.store, &id);
    let survivors = ctx.store.uids_for(&id);
    debug!(task = %id, clones = survivors.len(), "resource clones regrouped");
    if survivors.contains(&uid) {
        uid
    } else {
        survivors.first().copied().unwrap_or(uid)
    }
}
