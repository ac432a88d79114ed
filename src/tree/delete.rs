//! Two-phase deletion: stage, then remove.

use tracing::debug;

use crate::context::EditContext;
use crate::models::UniqueId;
use crate::predecessor::detach_all;
use crate::schedule::{refresh_task, roll_up_ancestors, roll_up_parent};
use crate::store::TaskStore;

/// Marks `targets`, their clones and their subtrees `is_delete`.
///
/// Returns the staged records in pre-order (parents before children).
pub fn stage_delete(store: &mut TaskStore, targets: &[UniqueId]) -> Vec<UniqueId> {
    let mut staged: Vec<UniqueId> = Vec::new();
    for &target in targets {
        let Some(record) = store.get(target) else {
            continue;
        };
        let clones = store.uids_for(&record.task_id).to_vec();
        for root in clones {
            if staged.contains(&root) {
                continue;
            }
            staged.push(root);
            for d in store.descendants(root) {
                if !staged.contains(&d) {
                    staged.push(d);
                }
            }
        }
    }
    for &uid in &staged {
        if let Some(r) = store.get_mut(uid) {
            r.is_delete = true;
        }
    }
    staged
}

/// Removes staged records, children first, detaching their links.
///
/// Surviving former parents are refreshed and rolled up. Returns them.
pub fn remove_staged(ctx: &mut EditContext<'_>, staged: &[UniqueId]) -> Vec<UniqueId> {
    let mut parents: Vec<UniqueId> = Vec::new();
    for &uid in staged.iter().rev() {
        let Some(record) = ctx.store.get(uid) else {
            continue;
        };
        let id = record.task_id.clone();
        let parent = record.parent_unique_id();
        if !record.props.predecessor.is_empty() {
            detach_all(ctx.store, &id);
        }
        ctx.store.remove(uid);
        debug!(task = %id, uid, "record removed");
        if let Some(p) = parent.filter(|p| !staged.contains(p)) {
            if !parents.contains(&p) {
                parents.push(p);
            }
        }
    }
    ctx.touched.retain(|u| !staged.contains(u));

    for &p in &parents {
        let Some(record) = ctx.store.get(p) else {
            continue;
        };
        if record.is_leaf() {
            refresh_task(ctx, p);
        } else {
            roll_up_parent(ctx, p);
        }
        roll_up_ancestors(ctx, p);
    }
    parents
}
