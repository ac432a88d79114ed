//! Task id renames.

use tracing::info;

use crate::context::EditContext;
use crate::error::EditError;
use crate::models::TaskId;
use crate::predecessor::rename_endpoint;

/// Renames task `old` to `new` everywhere: every clone, every edge that
/// references it, and the parent id field of its children.
pub fn update_task_id(
    ctx: &mut EditContext<'_>,
    old: &TaskId,
    new: &TaskId,
) -> Result<(), EditError> {
    if old == new {
        return Ok(());
    }
    if ctx.store.contains_task_id(new) {
        return Err(EditError::DuplicateTaskId(new.clone()));
    }
    let uids = ctx.store.uids_for(old).to_vec();
    if uids.is_empty() {
        return Err(EditError::TaskNotFound(old.clone()));
    }

    let id_field = ctx.settings.task_fields.id.clone();
    for &uid in &uids {
        ctx.store.rename_task_id(uid, old, new);
        if let Some(r) = ctx.store.get_mut(uid) {
            r.write_through(&id_field, new.to_value());
        }
        ctx.touch(uid);
    }
    rename_endpoint(ctx.store, old, new);
    ctx.store.reindex();

    if let Some(parent_field) = ctx.settings.task_fields.parent_id.clone() {
        for &uid in &uids {
            let children = ctx
                .store
                .get(uid)
                .map(|r| r.child_records.clone())
                .unwrap_or_default();
            for child in children {
                if let Some(r) = ctx.store.get_mut(child) {
                    r.write_through(&parent_field, new.to_value());
                }
                ctx.touch(child);
            }
        }
    }
    info!(old = %old, new = %new, "task id updated");
    Ok(())
}
