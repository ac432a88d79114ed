//! At-rest consistency checks for a task store.
//!
//! Checks the invariants every edit operation must restore before it
//! returns. Detects:
//! - Broken parent/child linkage and stale child flags
//! - Flat list and index drift
//! - Unmirrored or dangling predecessor edges
//! - Diverged resource-view clones
//! - Out-of-range progress
//! - Circular predecessor dependencies (DAG validation)
//!
//! # Reference
//! Cormen et al. (2009), "Introduction to Algorithms", Ch. 22.4 (Topological Sort)

use std::collections::{HashMap, HashSet};

use crate::models::TaskId;
use crate::predecessor::outgoing;
use crate::store::TaskStore;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// A child is not listed exactly once by its parent.
    BrokenParentLink,
    /// `has_child_records` disagrees with the child list.
    ChildFlagMismatch,
    /// A record's flat index or level is stale.
    IndexMismatch,
    /// An edge is missing its mirror on the other endpoint.
    UnmirroredEdge,
    /// An edge references a task outside the store.
    DanglingEdge,
    /// Resource-view clones differ.
    CloneMismatch,
    /// Progress outside 0..=100.
    ProgressOutOfRange,
    /// Predecessor graph contains a cycle.
    CyclicDependency,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Checks every at-rest invariant of `store`.
///
/// Checks:
/// 1. Each non-root record is listed exactly once by its parent
/// 2. `has_child_records` matches the child list
/// 3. Flat indexes and levels match the tree
/// 4. Every edge is mirrored on its other endpoint
/// 5. No edge references a missing task
/// 6. Clones share identical properties
/// 7. Progress lies in 0..=100
/// 8. No circular predecessor dependencies
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn check_invariants(store: &TaskStore) -> ValidationResult {
    let mut errors = Vec::new();

    for (index, record) in store.flat_data().enumerate() {
        match record.parent_item.as_ref() {
            Some(parent) => {
                let listed = store
                    .get(parent.unique_id)
                    .map(|p| p.child_records.iter().filter(|&&c| c == record.unique_id).count())
                    .unwrap_or(0);
                if listed != 1 {
                    errors.push(ValidationError::new(
                        ValidationErrorKind::BrokenParentLink,
                        format!("Task '{}' is listed {listed} times by its parent", record.task_id),
                    ));
                }
                let expected_level = store.get(parent.unique_id).map(|p| p.level + 1);
                if expected_level != Some(record.level) {
                    errors.push(ValidationError::new(
                        ValidationErrorKind::IndexMismatch,
                        format!("Task '{}' has a stale level", record.task_id),
                    ));
                }
            }
            None if record.level != 0 => errors.push(ValidationError::new(
                ValidationErrorKind::IndexMismatch,
                format!("Root task '{}' has level {}", record.task_id, record.level),
            )),
            None => {}
        }

        if record.has_child_records != !record.child_records.is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::ChildFlagMismatch,
                format!("Task '{}' has a stale child flag", record.task_id),
            ));
        }
        if record.index != index {
            errors.push(ValidationError::new(
                ValidationErrorKind::IndexMismatch,
                format!("Task '{}' has index {} at position {index}", record.task_id, record.index),
            ));
        }
        if !(0.0..=100.0).contains(&record.props.progress) {
            errors.push(ValidationError::new(
                ValidationErrorKind::ProgressOutOfRange,
                format!("Task '{}' has progress {}", record.task_id, record.props.progress),
            ));
        }

        for edge in &record.props.predecessor {
            let other = edge.other_end(&record.task_id);
            if !edge.touches(&record.task_id) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::UnmirroredEdge,
                    format!("Task '{}' stores foreign edge {}", record.task_id, edge.token()),
                ));
                continue;
            }
            match store.by_task_id(other) {
                None => errors.push(ValidationError::new(
                    ValidationErrorKind::DanglingEdge,
                    format!("Task '{}' links to unknown task '{other}'", record.task_id),
                )),
                Some(o) if !o.props.predecessor.contains(edge) => {
                    errors.push(ValidationError::new(
                        ValidationErrorKind::UnmirroredEdge,
                        format!("Edge {} is missing on task '{other}'", edge.token()),
                    ))
                }
                Some(_) => {}
            }
        }

        for &clone in &record.props.shared_task_unique_ids {
            if clone == record.unique_id {
                continue;
            }
            if store.get(clone).map(|c| &c.props) != Some(&record.props) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::CloneMismatch,
                    format!("Clones of task '{}' differ", record.task_id),
                ));
            }
        }
    }

    if store.flat_ids().len() != store.len() {
        errors.push(ValidationError::new(
            ValidationErrorKind::IndexMismatch,
            format!("{} records but {} in the flat list", store.len(), store.flat_ids().len()),
        ));
    }

    if let Some(cycle_err) = detect_cycles(store) {
        errors.push(cycle_err);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Whether adding `from → to` would close a cycle.
///
/// True when `from` is already reachable from `to`.
pub fn would_create_cycle(store: &TaskStore, from: &TaskId, to: &TaskId) -> bool {
    if from == to {
        return true;
    }
    let mut visited: HashSet<TaskId> = HashSet::new();
    let mut stack = vec![to.clone()];
    while let Some(id) = stack.pop() {
        if &id == from {
            return true;
        }
        if !visited.insert(id.clone()) {
            continue;
        }
        stack.extend(outgoing(store, &id).into_iter().map(|e| e.to));
    }
    false
}

/// Detects cycles in the predecessor graph using DFS.
///
/// # Algorithm
/// Topological sort via DFS. If a back-edge is found (visiting a node
/// currently in the recursion stack), a cycle exists.
///
/// # Reference
/// Cormen et al. (2009), "Introduction to Algorithms", Ch. 22.4
pub fn detect_cycles(store: &TaskStore) -> Option<ValidationError> {
    // Build adjacency list: task id → successors
    let mut adj: HashMap<&TaskId, Vec<&TaskId>> = HashMap::new();
    let mut all_ids: Vec<&TaskId> = Vec::new();
    let mut seen: HashSet<&TaskId> = HashSet::new();

    // Clones carry identical edges; one record per task id is enough.
    for record in store.flat_data() {
        if !seen.insert(&record.task_id) {
            continue;
        }
        all_ids.push(&record.task_id);
        for edge in record.props.outgoing(&record.task_id) {
            adj.entry(&edge.from).or_default().push(&edge.to);
        }
    }

    // DFS cycle detection
    let mut visited = HashSet::new();
    let mut in_stack = HashSet::new();

    for &node in &all_ids {
        if !visited.contains(node) && has_cycle_dfs(node, &adj, &mut visited, &mut in_stack) {
            return Some(ValidationError::new(
                ValidationErrorKind::CyclicDependency,
                format!("Circular dependency detected involving task '{node}'"),
            ));
        }
    }

    None
}

fn has_cycle_dfs<'a>(
    node: &'a TaskId,
    adj: &HashMap<&'a TaskId, Vec<&'a TaskId>>,
    visited: &mut HashSet<&'a TaskId>,
    in_stack: &mut HashSet<&'a TaskId>,
) -> bool {
    visited.insert(node);
    in_stack.insert(node);

    if let Some(neighbors) = adj.get(node) {
        for &next in neighbors {
            if in_stack.contains(next) {
                return true; // Back edge → cycle
            }
            if !visited.contains(next) && has_cycle_dfs(next, adj, visited, in_stack) {
                return true;
            }
        }
    }

    in_stack.remove(node);
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GanttProperties, LinkType, PredecessorEdge, TaskRecord};
    use crate::predecessor::add_edge;

    fn sample_store() -> TaskStore {
        let mut s = TaskStore::new();
        let p = s.allocate_unique_id();
        s.insert(TaskRecord::new(p, 1, GanttProperties::new("P")), None, 0);
        for id in 2..=4 {
            let uid = s.allocate_unique_id();
            s.insert(TaskRecord::new(uid, id, GanttProperties::new("T")), Some(p), 9);
        }
        s
    }

    #[test]
    fn test_valid_store() {
        let mut s = sample_store();
        add_edge(&mut s, PredecessorEdge::new(2, 3, LinkType::FS));
        add_edge(&mut s, PredecessorEdge::new(3, 4, LinkType::SS));
        assert!(check_invariants(&s).is_ok());
    }

    #[test]
    fn test_unmirrored_edge() {
        let mut s = sample_store();
        let uid = s.primary_uid(&TaskId::from(2)).unwrap();
        s.get_mut(uid)
            .unwrap()
            .props
            .predecessor
            .push(PredecessorEdge::new(2, 3, LinkType::FS));
        let errors = check_invariants(&s).unwrap_err();
        assert!(errors.iter().any(|e| e.kind == ValidationErrorKind::UnmirroredEdge));
    }

    #[test]
    fn test_dangling_edge() {
        let mut s = sample_store();
        let uid = s.primary_uid(&TaskId::from(2)).unwrap();
        s.get_mut(uid)
            .unwrap()
            .props
            .predecessor
            .push(PredecessorEdge::new(9, 2, LinkType::FS));
        let errors = check_invariants(&s).unwrap_err();
        assert!(errors.iter().any(|e| e.kind == ValidationErrorKind::DanglingEdge));
    }

    #[test]
    fn test_stale_child_flag_and_progress() {
        let mut s = sample_store();
        let uid = s.primary_uid(&TaskId::from(3)).unwrap();
        let r = s.get_mut(uid).unwrap();
        r.has_child_records = true;
        r.props.progress = 120.0;
        let kinds: Vec<_> = check_invariants(&s).unwrap_err().into_iter().map(|e| e.kind).collect();
        assert!(kinds.contains(&ValidationErrorKind::ChildFlagMismatch));
        assert!(kinds.contains(&ValidationErrorKind::ProgressOutOfRange));
    }

    #[test]
    fn test_cycle_detection() {
        let mut s = sample_store();
        add_edge(&mut s, PredecessorEdge::new(2, 3, LinkType::FS));
        add_edge(&mut s, PredecessorEdge::new(3, 4, LinkType::FS));
        assert!(would_create_cycle(&s, &TaskId::from(4), &TaskId::from(2)));
        assert!(!would_create_cycle(&s, &TaskId::from(2), &TaskId::from(4)));
        assert!(detect_cycles(&s).is_none());

        add_edge(&mut s, PredecessorEdge::new(4, 2, LinkType::FS));
        let err = detect_cycles(&s).unwrap();
        assert_eq!(err.kind, ValidationErrorKind::CyclicDependency);
    }
}
