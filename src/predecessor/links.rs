//! Edge storage: both endpoints carry every edge.

use tracing::warn;

use crate::context::EditContext;
use crate::error::EditError;
use crate::models::{predecessors_name, PredecessorEdge, TaskId, UniqueId};
use crate::store::TaskStore;
use crate::validation::would_create_cycle;

/// Rebuilds the display string on every record carrying `id`.
pub fn rebuild_name(store: &mut TaskStore, id: &TaskId) {
    for uid in store.uids_for(id).to_vec() {
        if let Some(r) = store.get_mut(uid) {
            r.props.predecessors_name = predecessors_name(&r.props.predecessor, id);
        }
    }
}

/// Edges stored on the (primary) record of `id`.
pub fn edges_of(store: &TaskStore, id: &TaskId) -> Vec<PredecessorEdge> {
    store
        .by_task_id(id)
        .map(|r| r.props.predecessor.clone())
        .unwrap_or_default()
}

/// Edges where `id` is the successor.
pub fn incoming(store: &TaskStore, id: &TaskId) -> Vec<PredecessorEdge> {
    edges_of(store, id).into_iter().filter(|e| &e.to == id).collect()
}

/// Edges where `id` is the predecessor.
pub fn outgoing(store: &TaskStore, id: &TaskId) -> Vec<PredecessorEdge> {
    edges_of(store, id).into_iter().filter(|e| &e.from == id).collect()
}

fn for_each_endpoint(store: &mut TaskStore, edge: &PredecessorEdge, mut f: impl FnMut(&mut Vec<PredecessorEdge>)) {
    let mut uids = store.uids_for(&edge.from).to_vec();
    if edge.to != edge.from {
        uids.extend_from_slice(store.uids_for(&edge.to));
    }
    for uid in uids {
        if let Some(r) = store.get_mut(uid) {
            f(&mut r.props.predecessor);
        }
    }
}

/// Stores `edge` on both endpoints, replacing any edge between the same pair.
///
/// Returns `false` (and stores nothing) when an endpoint is unknown.
pub fn add_edge(store: &mut TaskStore, edge: PredecessorEdge) -> bool {
    if !store.contains_task_id(&edge.from) || !store.contains_task_id(&edge.to) {
        warn!(from = %edge.from, to = %edge.to, "skipping link to an unknown task");
        return false;
    }
    for_each_endpoint(store, &edge, |list| {
        list.retain(|e| !e.same_link(&edge));
        list.push(edge.clone());
    });
    rebuild_name(store, &edge.from);
    rebuild_name(store, &edge.to);
    true
}

/// Removes the edge `from → to` from both endpoints.
pub fn remove_edge(store: &mut TaskStore, from: &TaskId, to: &TaskId) {
    let probe = PredecessorEdge::new(from.clone(), to.clone(), crate::models::LinkType::FS);
    for_each_endpoint(store, &probe, |list| list.retain(|e| !e.same_link(&probe)));
    rebuild_name(store, from);
    rebuild_name(store, to);
}

/// Rewrites the offset of the edge `from → to` on both endpoints.
pub fn set_offset(store: &mut TaskStore, edge: &PredecessorEdge, offset: f64) {
    for_each_endpoint(store, edge, |list| {
        for e in list.iter_mut().filter(|e| e.same_link(edge)) {
            e.offset = offset;
        }
    });
    rebuild_name(store, &edge.to);
}

/// Removes every edge touching `id`, from both endpoints.
pub fn detach_all(store: &mut TaskStore, id: &TaskId) -> Vec<PredecessorEdge> {
    let edges = edges_of(store, id);
    for e in &edges {
        remove_edge(store, &e.from, &e.to);
    }
    edges
}

/// Rewrites every edge reference from `old` to `new` on both endpoints.
///
/// Call after the record itself has been re-indexed under `new`.
pub fn rename_endpoint(store: &mut TaskStore, old: &TaskId, new: &TaskId) {
    let edges = edges_of(store, new);
    let mut others: Vec<TaskId> = edges
        .iter()
        .map(|e| e.other_end(old).clone())
        .filter(|o| o != old)
        .collect();
    others.dedup();
    let mut uids = store.uids_for(new).to_vec();
    for other in &others {
        uids.extend_from_slice(store.uids_for(other));
    }
    for uid in uids {
        if let Some(r) = store.get_mut(uid) {
            for e in &mut r.props.predecessor {
                if &e.from == old {
                    e.from = new.clone();
                }
                if &e.to == old {
                    e.to = new.clone();
                }
            }
        }
    }
    rebuild_name(store, new);
    for other in &others {
        rebuild_name(store, other);
    }
}

/// Replaces the incoming edges of `uid` with the parsed dependency text.
///
/// Unknown and self references are dropped with a warning. Links to a
/// summary task, or between a task and its own ancestor or descendant,
/// are rejected; so is any link that would close a cycle.
pub fn set_dependencies(
    ctx: &mut EditContext<'_>,
    uid: UniqueId,
    text: &str,
) -> Result<(), EditError> {
    let Some(record) = ctx.store.get(uid) else {
        return Ok(());
    };
    let id = record.task_id.clone();
    let parsed = PredecessorEdge::parse_list(text, &id, ctx.settings.duration_unit);
    if !parsed.is_empty() && !record.is_leaf() {
        return Err(EditError::invalid("dependency", "summary tasks cannot carry links"));
    }

    let mut accepted: Vec<PredecessorEdge> = Vec::new();
    for edge in parsed {
        if edge.from == id {
            warn!(task = %id, "dropping self reference");
            continue;
        }
        let Some(from_uid) = ctx.store.primary_uid(&edge.from) else {
            warn!(task = %id, from = %edge.from, "dropping reference to an unknown task");
            continue;
        };
        if ctx.store.is_descendant(uid, from_uid) || ctx.store.is_descendant(from_uid, uid) {
            return Err(EditError::invalid(
                "dependency",
                format!("{} and {} are in the same hierarchy", edge.from, id),
            ));
        }
        if ctx.store.get(from_uid).is_some_and(|r| !r.is_leaf()) {
            return Err(EditError::invalid(
                "dependency",
                format!("{} is a summary task", edge.from),
            ));
        }
        accepted.retain(|e| !e.same_link(&edge));
        accepted.push(edge);
    }

    for edge in incoming(ctx.store, &id) {
        remove_edge(ctx.store, &edge.from, &edge.to);
    }
    for edge in accepted {
        if would_create_cycle(ctx.store, &edge.from, &edge.to) {
            return Err(EditError::CyclicDependency {
                from: edge.from,
                to: edge.to,
            });
        }
        add_edge(ctx.store, edge);
    }
    rebuild_name(ctx.store, &id);
    ctx.touch(uid);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GanttSettings;
    use crate::models::{GanttProperties, LinkType, TaskRecord, WorkingCalendar};
    use crate::test_support::at;

    fn store(n: i64) -> TaskStore {
        let mut s = TaskStore::new();
        for id in 1..=n {
            let uid = s.allocate_unique_id();
            s.insert(TaskRecord::new(uid, id, GanttProperties::new("T")), None, id as usize);
        }
        s
    }

    fn id(v: i64) -> TaskId {
        TaskId::from(v)
    }

    #[test]
    fn test_add_edge_is_mirrored() {
        let mut s = store(2);
        assert!(add_edge(&mut s, PredecessorEdge::new(1, 2, LinkType::FS)));
        assert_eq!(edges_of(&s, &id(1)).len(), 1);
        assert_eq!(edges_of(&s, &id(2)).len(), 1);
        assert_eq!(s.by_task_id(&id(2)).unwrap().props.predecessors_name, "1FS");
        assert_eq!(s.by_task_id(&id(1)).unwrap().props.predecessors_name, "");
        assert!(!add_edge(&mut s, PredecessorEdge::new(9, 2, LinkType::FS)));
    }

    #[test]
    fn test_detach_all_cleans_other_endpoints() {
        let mut s = store(3);
        add_edge(&mut s, PredecessorEdge::new(1, 2, LinkType::FS));
        add_edge(&mut s, PredecessorEdge::new(2, 3, LinkType::SS));
        let removed = detach_all(&mut s, &id(2));
        assert_eq!(removed.len(), 2);
        assert!(edges_of(&s, &id(1)).is_empty());
        assert!(edges_of(&s, &id(3)).is_empty());
        assert_eq!(s.by_task_id(&id(3)).unwrap().props.predecessors_name, "");
    }

    #[test]
    fn test_rename_endpoint() {
        let mut s = store(3);
        add_edge(&mut s, PredecessorEdge::new(1, 2, LinkType::FS));
        add_edge(&mut s, PredecessorEdge::new(2, 3, LinkType::FS));
        let uid = s.primary_uid(&id(2)).unwrap();
        s.rename_task_id(uid, &id(2), &id(20));
        rename_endpoint(&mut s, &id(2), &id(20));
        assert_eq!(s.by_task_id(&id(3)).unwrap().props.predecessors_name, "20FS");
        assert_eq!(s.by_task_id(&id(20)).unwrap().props.predecessors_name, "1FS");
        assert_eq!(edges_of(&s, &id(1))[0].to, id(20));
    }

    #[test]
    fn test_set_dependencies() {
        let mut s = store(3);
        let settings = GanttSettings::default();
        let cal = WorkingCalendar::new();
        let origin = at(1, 0);
        let mut ctx = EditContext::new(&mut s, &settings, &cal, origin);
        let u3 = ctx.store.primary_uid(&id(3)).unwrap();

        set_dependencies(&mut ctx, u3, "1FS+2d, 2SS, 3FS, 42FF").unwrap();
        assert_eq!(ctx.store.get(u3).unwrap().props.predecessors_name, "1FS+2d,2SS");

        set_dependencies(&mut ctx, u3, "2FF").unwrap();
        assert_eq!(ctx.store.get(u3).unwrap().props.predecessors_name, "2FF");
        assert!(edges_of(ctx.store, &id(1)).is_empty());

        let u2 = ctx.store.primary_uid(&id(2)).unwrap();
        assert_eq!(
            set_dependencies(&mut ctx, u2, "3FS"),
            Err(EditError::CyclicDependency { from: id(3), to: id(2) })
        );
    }
}
