//! Task store.
//!
//! Owns every [`TaskRecord`] and the three structures that must stay
//! pairwise consistent between operations:
//!
//! - the **tree** (`roots` plus each record's ordered `child_records`),
//! - the **flat list** (depth-first pre-order of the tree, mirrored in each
//!   record's `index`),
//! - the **id index** (`TaskId` → unique ids; several in resource view).
//!
//! Structural mutators update the tree and id index, then call
//! [`TaskStore::reindex`] before returning so no caller ever observes a
//! stale flat list or stale [`ParentRef`] snapshot.

use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::{ParentRef, TaskId, TaskRecord, UniqueId};

/// Flat list, tree, and indexes of the task records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskStore {
    records: HashMap<UniqueId, TaskRecord>,
    roots: Vec<UniqueId>,
    flat: Vec<UniqueId>,
    id_index: BTreeMap<TaskId, Vec<UniqueId>>,
    next_unique_id: UniqueId,
}

impl TaskStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            next_unique_id: 1,
            ..Self::default()
        }
    }

    /// Reserves a fresh unique id.
    pub fn allocate_unique_id(&mut self) -> UniqueId {
        let id = self.next_unique_id.max(1);
        self.next_unique_id = id + 1;
        id
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, uid: UniqueId) -> Option<&TaskRecord> {
        self.records.get(&uid)
    }

    pub fn get_mut(&mut self, uid: UniqueId) -> Option<&mut TaskRecord> {
        self.records.get_mut(&uid)
    }

    pub fn contains(&self, uid: UniqueId) -> bool {
        self.records.contains_key(&uid)
    }

    /// Unique ids in flat (depth-first) order.
    pub fn flat_ids(&self) -> &[UniqueId] {
        &self.flat
    }

    /// Records in flat order.
    pub fn flat_data(&self) -> impl Iterator<Item = &TaskRecord> {
        self.flat.iter().filter_map(|uid| self.records.get(uid))
    }

    /// Root unique ids in order.
    pub fn roots(&self) -> &[UniqueId] {
        &self.roots
    }

    /// Record at a flat index.
    pub fn at_index(&self, index: usize) -> Option<&TaskRecord> {
        self.flat.get(index).and_then(|uid| self.records.get(uid))
    }

    /// Every record carrying `task_id` (clones in resource view).
    pub fn uids_for(&self, task_id: &TaskId) -> &[UniqueId] {
        self.id_index
            .get(task_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The first record carrying `task_id`.
    pub fn primary_uid(&self, task_id: &TaskId) -> Option<UniqueId> {
        self.uids_for(task_id).first().copied()
    }

    /// Looks a record up by user-facing id.
    pub fn by_task_id(&self, task_id: &TaskId) -> Option<&TaskRecord> {
        self.primary_uid(task_id).and_then(|uid| self.records.get(&uid))
    }

    pub fn contains_task_id(&self, task_id: &TaskId) -> bool {
        !self.uids_for(task_id).is_empty()
    }

    /// Largest numeric task id (0 when none is numeric).
    pub fn max_numeric_task_id(&self) -> i64 {
        self.id_index
            .keys()
            .filter_map(TaskId::as_number)
            .max()
            .unwrap_or(0)
    }

    /// Live parent of a record, resolved through the index.
    pub fn parent_of(&self, uid: UniqueId) -> Option<&TaskRecord> {
        let parent = self.records.get(&uid)?.parent_unique_id()?;
        self.records.get(&parent)
    }

    /// Ancestors of a record, closest first.
    pub fn ancestors(&self, uid: UniqueId) -> Vec<UniqueId> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.records.get(&uid).and_then(TaskRecord::parent_unique_id);
        while let Some(p) = current {
            if !seen.insert(p) {
                break;
            }
            out.push(p);
            current = self.records.get(&p).and_then(TaskRecord::parent_unique_id);
        }
        out
    }

    /// Descendants of a record in pre-order (excluding the record).
    pub fn descendants(&self, uid: UniqueId) -> Vec<UniqueId> {
        let mut out = Vec::new();
        if let Some(record) = self.records.get(&uid) {
            for &child in &record.child_records {
                out.push(child);
                out.extend(self.descendants(child));
            }
        }
        out
    }

    /// Whether `uid` lies strictly inside the subtree of `ancestor`.
    pub fn is_descendant(&self, uid: UniqueId, ancestor: UniqueId) -> bool {
        self.ancestors(uid).contains(&ancestor)
    }

    /// Records whose ancestors are all expanded, in flat order.
    pub fn current_view(&self) -> Vec<&TaskRecord> {
        self.flat_data()
            .filter(|r| {
                self.ancestors(r.unique_id)
                    .iter()
                    .all(|a| self.records.get(a).is_some_and(|p| p.expanded))
            })
            .collect()
    }

    /// Earliest start date among all records.
    pub fn timeline_origin(&self) -> Option<NaiveDateTime> {
        self.records
            .values()
            .filter_map(|r| r.props.start_date)
            .min()
    }

    /// Inserts a record under `parent` (or at root level) at child `position`.
    ///
    /// `position` is clamped to the sibling count.
    pub fn insert(&mut self, mut record: TaskRecord, parent: Option<UniqueId>, position: usize) {
        let uid = record.unique_id;
        self.next_unique_id = self.next_unique_id.max(uid + 1);
        record.child_records.retain(|c| self.records.contains_key(c));
        self.index_task_id(&record.task_id, uid);
        self.records.insert(uid, record);
        self.attach(uid, parent, position);
        self.reindex();
    }

    /// Unlinks a record (with its subtree) from its parent or the root list.
    ///
    /// Returns the old parent and child position. The record stays stored.
    pub fn detach(&mut self, uid: UniqueId) -> (Option<UniqueId>, usize) {
        let parent = self.records.get(&uid).and_then(TaskRecord::parent_unique_id);
        let siblings = match parent {
            Some(p) => match self.records.get_mut(&p) {
                Some(pr) => &mut pr.child_records,
                None => &mut self.roots,
            },
            None => &mut self.roots,
        };
        let position = siblings.iter().position(|&c| c == uid).unwrap_or(siblings.len());
        siblings.retain(|&c| c != uid);
        if let Some(r) = self.records.get_mut(&uid) {
            r.parent_item = None;
        }
        (parent, position)
    }

    /// Links a stored record under `parent` at child `position`.
    ///
    /// Levels of the whole subtree are refreshed by the next reindex.
    pub fn attach(&mut self, uid: UniqueId, parent: Option<UniqueId>, position: usize) {
        let parent = parent.filter(|p| self.records.contains_key(p) && *p != uid);
        match parent {
            Some(p) => {
                let Some(pr) = self.records.get_mut(&p) else {
                    return;
                };
                let at = position.min(pr.child_records.len());
                pr.child_records.insert(at, uid);
                pr.has_child_records = true;
                let snapshot = ParentRef {
                    unique_id: pr.unique_id,
                    level: pr.level,
                    index: pr.index,
                    task_id: pr.task_id.clone(),
                };
                if let Some(r) = self.records.get_mut(&uid) {
                    r.parent_item = Some(snapshot);
                }
            }
            None => {
                let at = position.min(self.roots.len());
                self.roots.insert(at, uid);
                if let Some(r) = self.records.get_mut(&uid) {
                    r.parent_item = None;
                }
            }
        }
    }

    /// Removes a leaf record from the store.
    ///
    /// Children must be removed first. When the record was its parent's
    /// last child, the parent's `has_child_records` and `expanded` flip to
    /// false.
    pub fn remove(&mut self, uid: UniqueId) -> Option<TaskRecord> {
        let (parent, _) = self.detach(uid);
        if let Some(p) = parent.and_then(|p| self.records.get_mut(&p)) {
            if p.child_records.is_empty() {
                p.has_child_records = false;
                p.expanded = false;
            }
        }
        let record = self.records.remove(&uid)?;
        self.unindex_task_id(&record.task_id, uid);
        self.reindex();
        Some(record)
    }

    /// Moves `uid` from the id-index entry `old` to `new`.
    pub fn rename_task_id(&mut self, uid: UniqueId, old: &TaskId, new: &TaskId) {
        self.unindex_task_id(old, uid);
        self.index_task_id(new, uid);
        if let Some(r) = self.records.get_mut(&uid) {
            r.task_id = new.clone();
        }
    }

    /// Rebuilds the flat list, indexes, levels, and parent snapshots.
    pub fn reindex(&mut self) {
        let mut flat = Vec::with_capacity(self.records.len());
        let mut stack: Vec<(UniqueId, usize, Option<UniqueId>)> = self
            .roots
            .iter()
            .rev()
            .map(|&uid| (uid, 0, None))
            .collect();
        let mut seen = HashSet::new();
        while let Some((uid, level, parent)) = stack.pop() {
            if !seen.insert(uid) {
                continue;
            }
            let parent_ref = parent.and_then(|p| {
                self.records.get(&p).map(|pr| ParentRef {
                    unique_id: pr.unique_id,
                    level: pr.level,
                    index: pr.index,
                    task_id: pr.task_id.clone(),
                })
            });
            let Some(record) = self.records.get_mut(&uid) else {
                continue;
            };
            record.level = level;
            record.index = flat.len();
            record.parent_item = parent_ref;
            record.has_child_records = !record.child_records.is_empty();
            flat.push(uid);
            for &child in record.child_records.iter().rev() {
                stack.push((child, level + 1, Some(uid)));
            }
        }
        self.flat = flat;
    }

    fn index_task_id(&mut self, task_id: &TaskId, uid: UniqueId) {
        let entry = self.id_index.entry(task_id.clone()).or_default();
        if !entry.contains(&uid) {
            entry.push(uid);
        }
    }

    fn unindex_task_id(&mut self, task_id: &TaskId, uid: UniqueId) {
        if let Some(entry) = self.id_index.get_mut(task_id) {
            entry.retain(|&u| u != uid);
            if entry.is_empty() {
                self.id_index.remove(task_id);
            }
        }
    }
}
