//! Worklist propagation over the successor graph.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use super::links::outgoing;
use super::validate::snap_to_links;
use crate::context::EditContext;
use crate::models::{TaskId, UniqueId};
use crate::schedule::roll_up_ancestors;

/// Successor task ids reachable from `seeds`, in discovery order.
fn reachable(ctx: &EditContext<'_>, seeds: &[TaskId]) -> Vec<TaskId> {
    let mut visited: HashSet<TaskId> = HashSet::new();
    let mut order = Vec::new();
    let mut stack: Vec<TaskId> = seeds.iter().rev().cloned().collect();
    while let Some(id) = stack.pop() {
        if !visited.insert(id.clone()) {
            continue;
        }
        for edge in outgoing(ctx.store, &id).into_iter().rev() {
            if !visited.contains(&edge.to) {
                stack.push(edge.to);
            }
        }
        order.push(id);
    }
    order
}

/// Topological order of `nodes` (Kahn); nodes left on a cycle follow in
/// discovery order, each exactly once.
fn topological(ctx: &EditContext<'_>, nodes: &[TaskId]) -> Vec<TaskId> {
    let members: HashSet<&TaskId> = nodes.iter().collect();
    let mut indegree: HashMap<&TaskId, usize> = nodes.iter().map(|n| (n, 0)).collect();
    let mut successors: HashMap<&TaskId, Vec<TaskId>> = HashMap::new();
    for node in nodes {
        let next: Vec<TaskId> = outgoing(ctx.store, node)
            .into_iter()
            .map(|e| e.to)
            .filter(|to| members.contains(to))
            .collect();
        for to in &next {
            if let Some(d) = indegree.get_mut(to) {
                *d += 1;
            }
        }
        successors.insert(node, next);
    }

    let mut queue: VecDeque<&TaskId> = nodes.iter().filter(|n| indegree[n] == 0).collect();
    let mut done: HashSet<&TaskId> = HashSet::new();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(node) = queue.pop_front() {
        if !done.insert(node) {
            continue;
        }
        order.push(node.clone());
        for to in successors.get(node).into_iter().flatten() {
            if let Some((key, d)) = indegree.get_key_value(to).map(|(k, d)| (*k, *d)) {
                let left = d.saturating_sub(1);
                indegree.insert(key, left);
                if left == 0 {
                    queue.push_back(key);
                }
            }
        }
    }
    for node in nodes {
        if !done.contains(node) {
            order.push(node.clone());
        }
    }
    order
}

/// Re-schedules every task reachable from `seeds` through successor links.
///
/// # Algorithm
///
/// 1. Collect the reachable successors with a pass-scoped visited set.
/// 2. Order them topologically so each task is recomputed after all of
///    its predecessors; tasks on a cycle are visited once, in discovery
///    order, so the pass always terminates.
/// 3. Snap each link-driven task to the latest start its incoming links
///    require and roll its ancestors up.
///
/// Seeds themselves are not moved. Returns the tasks that moved.
pub fn propagate(ctx: &mut EditContext<'_>, seeds: &[UniqueId]) -> Vec<UniqueId> {
    if !ctx.settings.enable_predecessor_validation {
        return Vec::new();
    }
    let seed_ids: Vec<TaskId> = seeds
        .iter()
        .filter_map(|&uid| ctx.store.get(uid).map(|r| r.task_id.clone()))
        .collect();
    let nodes = reachable(ctx, &seed_ids);
    let order = topological(ctx, &nodes);

    let mut moved = Vec::new();
    for id in order {
        if seed_ids.contains(&id) {
            continue;
        }
        let Some(uid) = ctx.store.primary_uid(&id) else {
            continue;
        };
        if snap_to_links(ctx, uid) {
            debug!(task = %id, "moved by predecessor link");
            roll_up_ancestors(ctx, uid);
            moved.push(uid);
        }
    }
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::at;
    use crate::config::GanttSettings;
    use crate::dates::DateService;
    use crate::models::{
        DurationUnit, GanttProperties, LinkType, PredecessorEdge, TaskRecord, WorkingCalendar,
    };
    use crate::predecessor::add_edge;
    use crate::store::TaskStore;
    use chrono::NaiveDateTime;
    use proptest::prelude::*;

    fn chain_store(n: i64) -> TaskStore {
        let cal = WorkingCalendar::new();
        let mut s = TaskStore::new();
        for id in 1..=n {
            let uid = s.allocate_unique_id();
            let props = GanttProperties::new(format!("T{id}"))
                .with_start(at(1, 8))
                .with_end(cal.end_date(at(1, 8), 2.0, DurationUnit::Day, false))
                .with_duration(2.0);
            s.insert(TaskRecord::new(uid, id, props), None, id as usize);
        }
        s
    }

    fn start_of(store: &TaskStore, id: i64) -> Option<NaiveDateTime> {
        store.by_task_id(&TaskId::from(id)).and_then(|r| r.props.start_date)
    }

    #[test]
    fn test_chain_propagation() {
        let mut s = chain_store(3);
        add_edge(&mut s, PredecessorEdge::new(1, 2, LinkType::FS));
        add_edge(&mut s, PredecessorEdge::new(2, 3, LinkType::FS));
        let settings = GanttSettings::default();
        let cal = WorkingCalendar::new();
        let mut ctx = EditContext::new(&mut s, &settings, &cal, at(1, 0));
        let u1 = ctx.store.primary_uid(&TaskId::from(1)).unwrap();

        let moved = propagate(&mut ctx, &[u1]);
        assert_eq!(moved.len(), 2);
        assert_eq!(start_of(ctx.store, 2), Some(at(3, 8)));
        assert_eq!(start_of(ctx.store, 3), Some(at(5, 8)));
    }

    #[test]
    fn test_diamond_waits_for_all_predecessors() {
        // 1 → 2 → 4, 1 → 3 → 4 with 3 longer
        let mut s = chain_store(4);
        let u3 = s.primary_uid(&TaskId::from(3)).unwrap();
        s.get_mut(u3).unwrap().props.duration = Some(5.0);
        for (a, b) in [(1, 2), (1, 3), (2, 4), (3, 4)] {
            add_edge(&mut s, PredecessorEdge::new(a, b, LinkType::FS));
        }
        let settings = GanttSettings::default();
        let cal = WorkingCalendar::new();
        let mut ctx = EditContext::new(&mut s, &settings, &cal, at(1, 0));
        let u1 = ctx.store.primary_uid(&TaskId::from(1)).unwrap();
        propagate(&mut ctx, &[u1]);
        // 3 runs Jan 3..7, so 4 starts Jan 8.
        assert_eq!(start_of(ctx.store, 4), Some(at(8, 8)));
    }

    #[test]
    fn test_manual_successor_stays() {
        let mut s = chain_store(2);
        let u2 = s.primary_uid(&TaskId::from(2)).unwrap();
        s.get_mut(u2).unwrap().props.is_auto_schedule = false;
        add_edge(&mut s, PredecessorEdge::new(1, 2, LinkType::FS));
        let settings = GanttSettings::default();
        let cal = WorkingCalendar::new();
        let mut ctx = EditContext::new(&mut s, &settings, &cal, at(1, 0));
        let u1 = ctx.store.primary_uid(&TaskId::from(1)).unwrap();
        assert!(propagate(&mut ctx, &[u1]).is_empty());
        assert_eq!(start_of(ctx.store, 2), Some(at(1, 8)));
    }

    proptest! {
        #[test]
        fn test_cyclic_graphs_terminate(
            edges in proptest::collection::vec((1i64..=6, 1i64..=6), 1..20),
            seed in 1i64..=6,
        ) {
            let mut s = chain_store(6);
            for (a, b) in edges {
                if a != b {
                    add_edge(&mut s, PredecessorEdge::new(a, b, LinkType::FS));
                }
            }
            let settings = GanttSettings::default();
            let cal = WorkingCalendar::new();
            let mut ctx = EditContext::new(&mut s, &settings, &cal, at(1, 0));
            let uid = ctx.store.primary_uid(&TaskId::from(seed)).unwrap();
            let moved = propagate(&mut ctx, &[uid]);
            prop_assert!(moved.len() <= 5);
            let unique: HashSet<_> = moved.iter().collect();
            prop_assert_eq!(unique.len(), moved.len());
        }
    }
}
