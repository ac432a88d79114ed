//! Persistence coordinator.
//!
//! Every public edit runs inside an [`EditSession`]: the store is
//! snapshotted when the operation begins, the engine mutates the live
//! store, and the change-set sent to the [`PersistenceAdapter`] is the
//! diff between the two. Cancellation and adapter failure both restore the
//! snapshot wholesale, so no partial edit is ever observable.
//!
//! # State machine
//!
//! `idle → action_begin (cancellable) → local | remote commit → success | failure → idle`
//!
//! While a remote commit is awaited the editor refuses new edits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AdapterError;
use crate::events::RequestType;
use crate::models::{TaskId, TaskRecord};
use crate::store::TaskStore;

/// Records added, changed and deleted by one edit.
///
/// Synthetic resource-view group rows are never included, and a task that
/// appears as several clones is listed once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub added_records: Vec<TaskRecord>,
    pub changed_records: Vec<TaskRecord>,
    pub deleted_records: Vec<TaskRecord>,
}

impl ChangeSet {
    /// Diffs `after` against `before`.
    pub fn between(before: &TaskStore, after: &TaskStore) -> Self {
        let mut set = Self::default();
        let mut listed: Vec<&TaskId> = Vec::new();
        for record in after.flat_data().filter(|r| !r.is_resource_group) {
            if listed.contains(&&record.task_id) {
                continue;
            }
            match before.get(record.unique_id) {
                None => {
                    listed.push(&record.task_id);
                    set.added_records.push(record.clone());
                }
                Some(old) if !same_row(old, record) => {
                    listed.push(&record.task_id);
                    set.changed_records.push(record.clone());
                }
                Some(_) => {}
            }
        }
        let mut gone: Vec<&TaskId> = Vec::new();
        for record in before.flat_data().filter(|r| !r.is_resource_group) {
            if after.contains(record.unique_id) || gone.contains(&&record.task_id) {
                continue;
            }
            // A removed clone of a task that still exists is not a deletion.
            if after.contains_task_id(&record.task_id) {
                continue;
            }
            gone.push(&record.task_id);
            set.deleted_records.push(record.clone());
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.added_records.is_empty()
            && self.changed_records.is_empty()
            && self.deleted_records.is_empty()
    }

    /// Every record in the set.
    pub fn records(&self) -> impl Iterator<Item = &TaskRecord> {
        self.added_records
            .iter()
            .chain(&self.changed_records)
            .chain(&self.deleted_records)
    }
}

/// Whether two versions of a record persist identically.
///
/// Flat positions are ignored: inserting a row shifts every index below it
/// without changing those rows.
fn same_row(a: &TaskRecord, b: &TaskRecord) -> bool {
    a.task_id == b.task_id
        && a.parent_unique_id() == b.parent_unique_id()
        && a.level == b.level
        && a.has_child_records == b.has_child_records
        && a.expanded == b.expanded
        && a.child_records == b.child_records
        && a.props == b.props
        && a.task_data == b.task_data
}

/// What the adapter reports back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveResult {
    /// Server-assigned ids, aligned with `added_records`.
    pub inserted_ids: Vec<Option<TaskId>>,
}

/// How an adapter wants to receive changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AdapterCapability {
    /// One `save_changes` call per edit.
    #[default]
    Batch,
    /// Separate insert, update and remove calls.
    Crud,
}

/// Remote transport for committed edits.
///
/// Implement `save_changes` for batch adapters, or the three record
/// calls for CRUD adapters.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    fn capability(&self) -> AdapterCapability {
        AdapterCapability::Batch
    }

    async fn save_changes(
        &self,
        _changes: &ChangeSet,
        _key_field: &str,
    ) -> Result<SaveResult, AdapterError> {
        Err(AdapterError::new("batch save is not supported"))
    }

    /// Inserts one row; may return a server-assigned id.
    async fn insert(&self, _record: &TaskRecord) -> Result<Option<TaskId>, AdapterError> {
        Err(AdapterError::new("insert is not supported"))
    }

    async fn update(&self, _record: &TaskRecord) -> Result<(), AdapterError> {
        Err(AdapterError::new("update is not supported"))
    }

    async fn remove(&self, _record: &TaskRecord) -> Result<(), AdapterError> {
        Err(AdapterError::new("remove is not supported"))
    }
}

/// Sends a change-set through the adapter's declared channel.
pub async fn dispatch(
    adapter: &dyn PersistenceAdapter,
    changes: &ChangeSet,
    key_field: &str,
) -> Result<SaveResult, AdapterError> {
    match adapter.capability() {
        AdapterCapability::Batch => {
            debug!(
                added = changes.added_records.len(),
                changed = changes.changed_records.len(),
                deleted = changes.deleted_records.len(),
                "saving batch"
            );
            adapter.save_changes(changes, key_field).await
        }
        AdapterCapability::Crud => {
            let mut result = SaveResult::default();
            for record in &changes.added_records {
                result.inserted_ids.push(adapter.insert(record).await?);
            }
            for record in &changes.changed_records {
                adapter.update(record).await?;
            }
            for record in &changes.deleted_records {
                adapter.remove(record).await?;
            }
            Ok(result)
        }
    }
}

/// The pre-edit snapshot of one logical edit.
#[derive(Debug, Clone)]
pub struct EditSession {
    pub request: RequestType,
    snapshot: TaskStore,
}

impl EditSession {
    /// Snapshots `store` for a new edit.
    pub fn begin(store: &TaskStore, request: RequestType) -> Self {
        Self {
            request,
            snapshot: store.clone(),
        }
    }

    /// The state before the edit.
    pub fn snapshot(&self) -> &TaskStore {
        &self.snapshot
    }

    /// Changes made to `store` since the session began.
    pub fn changes(&self, store: &TaskStore) -> ChangeSet {
        ChangeSet::between(&self.snapshot, store)
    }

    /// Puts the pre-edit state back.
    pub fn restore(self, store: &mut TaskStore) {
        debug!(request = ?self.request, "restoring pre-edit snapshot");
        *store = self.snapshot;
    }
}
