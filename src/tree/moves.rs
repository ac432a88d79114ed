//! Row reordering: drag and drop, indent, outdent.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::add::become_parent;
use crate::context::EditContext;
use crate::error::EditError;
use crate::models::{TaskRecord, UniqueId};
use crate::predecessor::{edges_of, remove_edge};
use crate::schedule::{refresh_task, roll_up_ancestors, roll_up_parent};

/// Drop position relative to the target row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropPosition {
    Above,
    Below,
    Child,
}

/// Moves `uid` (with its subtree) relative to the row at flat `target_index`.
///
/// A leaf that becomes a parent loses its links, as do links between the
/// moved subtree and its new ancestors. Old and new ancestors are rolled
/// up.
pub fn move_row(
    ctx: &mut EditContext<'_>,
    uid: UniqueId,
    target_index: usize,
    position: DropPosition,
) -> Result<(), EditError> {
    if ctx.settings.is_resource_view() {
        return Err(EditError::UnsupportedInResourceView("row reordering"));
    }
    if !ctx.store.contains(uid) {
        return Err(EditError::InvalidMove(format!("no record with unique id {uid}")));
    }
    let target = ctx
        .store
        .at_index(target_index)
        .map(|r| r.unique_id)
        .ok_or_else(|| EditError::InvalidMove(format!("no row at index {target_index}")))?;
    if target == uid || ctx.store.is_descendant(target, uid) {
        return Err(EditError::InvalidMove(
            "a row cannot be dropped into its own subtree".into(),
        ));
    }

    let (old_parent, _) = ctx.store.detach(uid);
    let (parent, at) = match position {
        DropPosition::Child => (Some(target), usize::MAX),
        DropPosition::Above | DropPosition::Below => {
            let parent = ctx.store.get(target).and_then(TaskRecord::parent_unique_id);
            let siblings = match parent.and_then(|p| ctx.store.get(p)) {
                Some(p) => p.child_records.as_slice(),
                None => ctx.store.roots(),
            };
            let at = siblings.iter().position(|&s| s == target).unwrap_or(siblings.len());
            let at = if position == DropPosition::Below { at + 1 } else { at };
            (parent, at)
        }
    };
    if let Some(p) = parent {
        become_parent(ctx, p);
    }
    ctx.store.attach(uid, parent, at);
    ctx.store.reindex();
    drop_hierarchy_links(ctx, uid);
    ctx.touch(uid);

    if let Some(old) = old_parent.filter(|&p| ctx.store.contains(p)) {
        if ctx.store.get(old).is_some_and(TaskRecord::is_leaf) {
            if let Some(r) = ctx.store.get_mut(old) {
                r.expanded = false;
            }
            refresh_task(ctx, old);
        } else {
            roll_up_parent(ctx, old);
        }
        roll_up_ancestors(ctx, old);
    }
    roll_up_ancestors(ctx, uid);

    let id = ctx.store.get(uid).map(|r| r.task_id.to_string()).unwrap_or_default();
    info!(task = %id, target_index, ?position, "row moved");
    Ok(())
}

/// Removes links that now join a task in the subtree of `uid` to one of
/// its own ancestors or descendants.
fn drop_hierarchy_links(ctx: &mut EditContext<'_>, uid: UniqueId) {
    let mut subtree = vec![uid];
    subtree.extend(ctx.store.descendants(uid));
    for node in subtree {
        let Some(id) = ctx.store.get(node).map(|r| r.task_id.clone()) else {
            continue;
        };
        for edge in edges_of(ctx.store, &id) {
            let Some(other) = ctx.store.primary_uid(edge.other_end(&id)) else {
                continue;
            };
            if ctx.store.is_descendant(node, other) || ctx.store.is_descendant(other, node) {
                debug!(from = %edge.from, to = %edge.to, "dropping link within one hierarchy");
                remove_edge(ctx.store, &edge.from, &edge.to);
                ctx.touch(node);
            }
        }
    }
}

/// Makes `uid` the last child of its previous sibling.
pub fn indent(ctx: &mut EditContext<'_>, uid: UniqueId) -> Result<(), EditError> {
    if ctx.settings.is_resource_view() {
        return Err(EditError::UnsupportedInResourceView("indent"));
    }
    let record = ctx
        .store
        .get(uid)
        .ok_or_else(|| EditError::InvalidMove(format!("no record with unique id {uid}")))?;
    let siblings = match ctx.store.parent_of(uid) {
        Some(p) => p.child_records.as_slice(),
        None => ctx.store.roots(),
    };
    let at = siblings.iter().position(|&s| s == uid).unwrap_or(0);
    if at == 0 {
        return Err(EditError::InvalidMove(format!(
            "task {} has no previous sibling to indent under",
            record.task_id
        )));
    }
    let target_index = ctx
        .store
        .get(siblings[at - 1])
        .map(|r| r.index)
        .unwrap_or_default();
    move_row(ctx, uid, target_index, DropPosition::Child)
}

/// Moves `uid` to just below its parent.
pub fn outdent(ctx: &mut EditContext<'_>, uid: UniqueId) -> Result<(), EditError> {
    if ctx.settings.is_resource_view() {
        return Err(EditError::UnsupportedInResourceView("outdent"));
    }
    let record = ctx
        .store
        .get(uid)
        .ok_or_else(|| EditError::InvalidMove(format!("no record with unique id {uid}")))?;
    let Some(parent) = ctx.store.parent_of(uid) else {
        return Err(EditError::InvalidMove(format!(
            "task {} is already at the top level",
            record.task_id
        )));
    };
    let target_index = parent.index;
    move_row(ctx, uid, target_index, DropPosition::Below)
}
