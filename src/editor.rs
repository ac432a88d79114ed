//! The public edit surface.
//!
//! [`GanttEditor`] owns the task store and runs every public operation
//! through the same pipeline:
//!
//! 1. Snapshot the store ([`EditSession`]).
//! 2. Mutate: field mapper, schedule recalculator, tree engine.
//! 3. Check predecessor links on moved tasks; resolve violations with the
//!    configured policy, or suspend until the caller decides.
//! 4. Settle: propagate along links, roll ancestors up, sync resource-view
//!    clones, write schedules back into the rows.
//! 5. Raise `action_begin` with the change-set; a cancel restores the
//!    snapshot.
//! 6. Commit through the adapter, if any. A failure restores the snapshot;
//!    success reconciles server-assigned ids.
//!
//! An edit never yields between steps 1 and 5, so no caller observes a
//! half-applied change. While an adapter call is awaited the editor
//! refuses new edits with [`EditError::SaveInFlight`].

use chrono::NaiveDateTime;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::{GanttSettings, LinkResolution};
use crate::context::EditContext;
use crate::dates::DateService;
use crate::error::EditError;
use crate::events::{
    ActionBeginArgs, ActionCompleteArgs, EditEvents, LinkValidationArgs, NoEvents, RequestType,
};
use crate::mapper::{apply_fields, write_back};
use crate::models::{ResourceRef, TaskId, TaskRecord, UniqueId};
use crate::persistence::{dispatch, ChangeSet, EditSession, PersistenceAdapter, SaveResult};
use crate::predecessor::{
    detect_violation, propagate, resolve_violation, retighten, set_dependencies, snap_to_links,
    LinkViolation, ViolationType,
};
use crate::schedule::{
    apply_segments, apply_work_rules, refresh_task, resolve_dates, roll_up_ancestors,
    roll_up_parent, shift_parent, switch_mode, WorkTrigger,
};
use crate::store::TaskStore;
use crate::tree::{self, DropPosition, RowPosition};

/// Result of a public edit operation.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    /// The edit was committed; carries the committed change-set.
    Completed(ChangeSet),
    /// An `action_begin` hook cancelled the edit; nothing changed.
    Cancelled,
    /// The edit violates predecessor links and no resolution is
    /// configured. Continue with [`GanttEditor::resolve_link_violation`]
    /// or [`GanttEditor::cancel_pending_edit`].
    ValidationRequired(Vec<LinkViolation>),
}

/// What an update did before settling.
#[derive(Debug, Default)]
struct Step {
    /// Tasks whose successors must follow them.
    seeds: Vec<UniqueId>,
    /// Resource lists before the edit, for resource-view regrouping.
    diffs: Vec<(UniqueId, Vec<ResourceRef>)>,
    violations: Vec<LinkViolation>,
}

/// An update suspended on a link violation.
struct PendingEdit {
    session: EditSession,
    step: Step,
    touched: Vec<UniqueId>,
}

/// Gantt edit engine.
pub struct GanttEditor {
    store: TaskStore,
    settings: GanttSettings,
    dates: Box<dyn DateService>,
    origin: NaiveDateTime,
    adapter: Option<Box<dyn PersistenceAdapter>>,
    events: Box<dyn EditEvents>,
    pending: Option<PendingEdit>,
    in_flight: Option<EditSession>,
}

impl GanttEditor {
    /// Loads `rows` using the calendar from `settings` as date service.
    pub fn new(rows: &[Value], settings: GanttSettings) -> Result<Self, EditError> {
        let dates = Box::new(settings.calendar.clone());
        Self::with_date_service(rows, settings, dates)
    }

    /// Loads `rows` with a caller-supplied date service.
    pub fn with_date_service(
        rows: &[Value],
        settings: GanttSettings,
        dates: Box<dyn DateService>,
    ) -> Result<Self, EditError> {
        let (store, origin) = tree::load(rows, &settings, dates.as_ref())?;
        Ok(Self {
            store,
            settings,
            dates,
            origin,
            adapter: None,
            events: Box::new(NoEvents),
            pending: None,
            in_flight: None,
        })
    }

    /// Commits edits through `adapter`. Without one, edits commit locally.
    pub fn with_adapter(mut self, adapter: impl PersistenceAdapter + 'static) -> Self {
        self.adapter = Some(Box::new(adapter));
        self
    }

    /// Sets the lifecycle hooks.
    pub fn with_events(mut self, events: impl EditEvents + 'static) -> Self {
        self.events = Box::new(events);
        self
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn settings(&self) -> &GanttSettings {
        &self.settings
    }

    /// Timeline origin of the taskbar geometry.
    pub fn origin(&self) -> NaiveDateTime {
        self.origin
    }

    /// The record for `id` (its first clone in resource view).
    pub fn record(&self, id: &TaskId) -> Option<&TaskRecord> {
        self.store.by_task_id(id)
    }

    /// Rows whose ancestors are all expanded.
    pub fn current_view(&self) -> Vec<&TaskRecord> {
        self.store.current_view()
    }

    /// Whether an adapter call is outstanding.
    pub fn is_saving(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Whether an update waits for a link violation decision.
    pub fn has_pending_validation(&self) -> bool {
        self.pending.is_some()
    }

    /// Expands or collapses a row. View state only; nothing is persisted.
    pub fn set_expanded(&mut self, id: &TaskId, expanded: bool) -> Result<(), EditError> {
        let uids = self.store.uids_for(id).to_vec();
        if uids.is_empty() {
            return Err(EditError::TaskNotFound(id.clone()));
        }
        let field = self.settings.task_fields.expand_state.clone();
        for uid in uids {
            if let Some(r) = self.store.get_mut(uid) {
                r.expanded = expanded && r.has_child_records;
                if let Some(field) = &field {
                    r.write_through(field, Value::Bool(r.expanded));
                }
            }
        }
        Ok(())
    }

    fn ensure_idle(&self) -> Result<(), EditError> {
        if self.in_flight.is_some() {
            return Err(EditError::SaveInFlight);
        }
        if self.pending.is_some() {
            return Err(EditError::ValidationPending);
        }
        Ok(())
    }

    fn uid_of(&self, id: &TaskId) -> Result<UniqueId, EditError> {
        self.store
            .primary_uid(id)
            .ok_or_else(|| EditError::TaskNotFound(id.clone()))
    }

    /// Adds a task from `data` at `position` relative to the row at
    /// `target_index`.
    pub async fn add(
        &mut self,
        data: &Map<String, Value>,
        position: RowPosition,
        target_index: Option<usize>,
    ) -> Result<EditOutcome, EditError> {
        self.ensure_idle()?;
        let session = EditSession::begin(&self.store, RequestType::Add);
        let mut ctx =
            EditContext::new(&mut self.store, &self.settings, self.dates.as_ref(), self.origin);
        let target = target_index
            .and_then(|i| ctx.store.at_index(i))
            .map(|r| r.unique_id);
        let uid = match tree::add_task(&mut ctx, data, position, target) {
            Ok(uid) => uid,
            Err(error) => return Err(self.fail(session, error)),
        };
        settle(&mut ctx, session.snapshot(), &[uid], &[]);
        self.finish(session).await
    }

    /// Deletes the given tasks with their subtrees and links.
    ///
    /// `action_begin` sees the records while they are only staged. Resource
    /// group rows cannot be deleted; unassign the resource instead.
    pub async fn delete(&mut self, ids: &[TaskId]) -> Result<EditOutcome, EditError> {
        self.ensure_idle()?;
        let uids = ids
            .iter()
            .map(|id| self.uid_of(id))
            .collect::<Result<Vec<_>, _>>()?;
        if uids
            .iter()
            .any(|&u| self.store.get(u).is_some_and(|r| r.is_resource_group))
        {
            return Err(EditError::UnsupportedInResourceView("deleting a resource group"));
        }
        let session = EditSession::begin(&self.store, RequestType::Delete);
        let staged = tree::stage_delete(&mut self.store, &uids);

        let mut pending = ChangeSet::default();
        for &uid in &staged {
            let Some(r) = self.store.get(uid) else {
                continue;
            };
            if !r.is_resource_group && !pending.deleted_records.iter().any(|d| d.task_id == r.task_id) {
                pending.deleted_records.push(r.clone());
            }
        }
        if !self.begin_action(RequestType::Delete, pending) {
            session.restore(&mut self.store);
            return Ok(EditOutcome::Cancelled);
        }

        let mut ctx =
            EditContext::new(&mut self.store, &self.settings, self.dates.as_ref(), self.origin);
        tree::remove_staged(&mut ctx, &staged);
        settle(&mut ctx, session.snapshot(), &[], &[]);
        self.persist(session).await
    }

    /// Applies a partial edit to the task named by the id key of `data`.
    pub async fn update_record_by_id(
        &mut self,
        data: &Map<String, Value>,
    ) -> Result<EditOutcome, EditError> {
        self.ensure_idle()?;
        let id_field = &self.settings.task_fields.id;
        let id = data
            .get(id_field)
            .and_then(TaskId::from_value)
            .ok_or_else(|| EditError::invalid(id_field.clone(), "missing task id"))?;
        let uid = self.uid_of(&id)?;
        let session = EditSession::begin(&self.store, RequestType::Save);

        let mut ctx =
            EditContext::new(&mut self.store, &self.settings, self.dates.as_ref(), self.origin);
        let step = match apply_update(&mut ctx, uid, data) {
            Ok(step) => step,
            Err(error) => return Err(self.fail(session, error)),
        };

        if !step.violations.is_empty() {
            let mut args = LinkValidationArgs {
                violations: step.violations.clone(),
                resolution: self.settings.validation_mode,
            };
            self.events.validate_linked_task(&mut args);
            match args.resolution {
                Some(resolution) => {
                    for violation in &step.violations {
                        resolve_violation(&mut ctx, violation, resolution);
                    }
                }
                None => {
                    let touched = ctx.touched;
                    let violations = step.violations.clone();
                    info!(task = %id, count = violations.len(), "edit waits for a link decision");
                    self.pending = Some(PendingEdit {
                        session,
                        step,
                        touched,
                    });
                    return Ok(EditOutcome::ValidationRequired(violations));
                }
            }
        }
        settle(&mut ctx, session.snapshot(), &step.seeds, &step.diffs);
        self.finish(session).await
    }

    /// Continues a suspended update with `resolution`.
    pub async fn resolve_link_violation(
        &mut self,
        resolution: LinkResolution,
    ) -> Result<EditOutcome, EditError> {
        let Some(pending) = self.pending.take() else {
            return Err(EditError::NoPendingValidation);
        };
        let PendingEdit {
            session,
            step,
            touched,
        } = pending;
        let mut ctx =
            EditContext::new(&mut self.store, &self.settings, self.dates.as_ref(), self.origin);
        ctx.touched = touched;
        debug!(?resolution, "resuming edit");
        for violation in &step.violations {
            resolve_violation(&mut ctx, violation, resolution);
        }
        settle(&mut ctx, session.snapshot(), &step.seeds, &step.diffs);
        self.finish(session).await
    }

    /// Drops a suspended update, restoring the state before it.
    pub fn cancel_pending_edit(&mut self) -> Result<EditOutcome, EditError> {
        let Some(pending) = self.pending.take() else {
            return Err(EditError::NoPendingValidation);
        };
        pending.session.restore(&mut self.store);
        info!("suspended edit cancelled");
        Ok(EditOutcome::Cancelled)
    }

    /// Makes the task the last child of its previous sibling.
    pub async fn indent(&mut self, id: &TaskId) -> Result<EditOutcome, EditError> {
        self.restructure(RequestType::Indent, id, tree::indent).await
    }

    /// Moves the task to just below its parent.
    pub async fn outdent(&mut self, id: &TaskId) -> Result<EditOutcome, EditError> {
        self.restructure(RequestType::Outdent, id, tree::outdent).await
    }

    /// Drag-and-drop: moves the task relative to the row at `drop_index`.
    pub async fn move_row(
        &mut self,
        id: &TaskId,
        drop_index: usize,
        position: DropPosition,
    ) -> Result<EditOutcome, EditError> {
        self.restructure(RequestType::RowDragAndDrop, id, |ctx, uid| {
            tree::move_row(ctx, uid, drop_index, position)
        })
        .await
    }

    async fn restructure(
        &mut self,
        request: RequestType,
        id: &TaskId,
        op: impl FnOnce(&mut EditContext<'_>, UniqueId) -> Result<(), EditError>,
    ) -> Result<EditOutcome, EditError> {
        self.ensure_idle()?;
        let uid = self.uid_of(id)?;
        let session = EditSession::begin(&self.store, request);
        let mut ctx =
            EditContext::new(&mut self.store, &self.settings, self.dates.as_ref(), self.origin);
        if let Err(error) = op(&mut ctx, uid) {
            return Err(self.fail(session, error));
        }
        settle(&mut ctx, session.snapshot(), &[], &[]);
        self.finish(session).await
    }

    /// Renames a task id everywhere it is referenced.
    pub async fn update_task_id(
        &mut self,
        old: &TaskId,
        new: &TaskId,
    ) -> Result<EditOutcome, EditError> {
        self.ensure_idle()?;
        let session = EditSession::begin(&self.store, RequestType::UpdateTaskId);
        let mut ctx =
            EditContext::new(&mut self.store, &self.settings, self.dates.as_ref(), self.origin);
        if let Err(error) = tree::update_task_id(&mut ctx, old, new) {
            return Err(self.fail(session, error));
        }
        settle(&mut ctx, session.snapshot(), &[], &[]);
        self.finish(session).await
    }

    /// Releases the lock left by a save whose future was dropped before
    /// the adapter answered, restoring the state before that edit.
    ///
    /// Returns whether a save was outstanding.
    pub fn abort_pending_save(&mut self) -> bool {
        match self.in_flight.take() {
            Some(session) => {
                warn!(request = session.request.as_str(), "abandoned save rolled back");
                session.restore(&mut self.store);
                true
            }
            None => false,
        }
    }

    fn fail(&mut self, session: EditSession, error: EditError) -> EditError {
        debug!(request = session.request.as_str(), %error, "edit rejected");
        session.restore(&mut self.store);
        error
    }

    fn begin_action(&mut self, request: RequestType, changes: ChangeSet) -> bool {
        let mut args = ActionBeginArgs {
            request_type: request,
            changes,
            cancel: false,
        };
        self.events.action_begin(&mut args);
        if args.cancel {
            info!(request = request.as_str(), "edit cancelled by action_begin");
        }
        !args.cancel
    }

    async fn finish(&mut self, session: EditSession) -> Result<EditOutcome, EditError> {
        let changes = session.changes(&self.store);
        if !self.begin_action(session.request, changes) {
            session.restore(&mut self.store);
            return Ok(EditOutcome::Cancelled);
        }
        self.persist(session).await
    }

    async fn persist(&mut self, session: EditSession) -> Result<EditOutcome, EditError> {
        let request = session.request;
        let changes = session.changes(&self.store);
        if self.adapter.is_none() || changes.is_empty() {
            return Ok(self.complete(request, changes));
        }

        self.in_flight = Some(session);
        debug!(request = request.as_str(), "awaiting adapter");
        let result = match self.adapter.as_deref() {
            Some(adapter) => dispatch(adapter, &changes, &self.settings.task_fields.id).await,
            None => Ok(SaveResult::default()),
        };

        match result {
            Ok(saved) => {
                self.reconcile_ids(&changes.added_records, &saved.inserted_ids);
                let changes = match self.in_flight.take() {
                    Some(session) => session.changes(&self.store),
                    None => changes,
                };
                Ok(self.complete(request, changes))
            }
            Err(error) => {
                if let Some(session) = self.in_flight.take() {
                    session.restore(&mut self.store);
                }
                let error = EditError::Adapter(error);
                warn!(request = request.as_str(), %error, "save failed; edit rolled back");
                self.events.action_failure(&error);
                Err(error)
            }
        }
    }

    /// Replaces optimistic ids with the ones the server assigned.
    fn reconcile_ids(&mut self, added: &[TaskRecord], inserted: &[Option<TaskId>]) {
        let mut ctx =
            EditContext::new(&mut self.store, &self.settings, self.dates.as_ref(), self.origin);
        for (record, assigned) in added.iter().zip(inserted) {
            let Some(assigned) = assigned else {
                continue;
            };
            if assigned == &record.task_id {
                continue;
            }
            if let Err(error) = tree::update_task_id(&mut ctx, &record.task_id, assigned) {
                warn!(task = %record.task_id, %error, "server id not applied");
            }
        }
    }

    fn complete(&mut self, request: RequestType, changes: ChangeSet) -> EditOutcome {
        let args = ActionCompleteArgs {
            request_type: request,
            changes,
        };
        self.events.action_complete(&args);
        info!(
            request = request.as_str(),
            added = args.changes.added_records.len(),
            changed = args.changes.changed_records.len(),
            deleted = args.changes.deleted_records.len(),
            "edit committed"
        );
        EditOutcome::Completed(args.changes)
    }
}

/// Applies a partial edit to one task, up to (not including) settling.
fn apply_update(
    ctx: &mut EditContext<'_>,
    uid: UniqueId,
    data: &Map<String, Value>,
) -> Result<Step, EditError> {
    let settings = ctx.settings;
    let dates = ctx.dates;
    let (id, before, is_parent, is_auto, changes) = {
        let record = ctx
            .store
            .get_mut(uid)
            .ok_or_else(|| EditError::invalid("unique id", "record vanished"))?;
        let before = record.props.schedule_key();
        let changes = apply_fields(record, data, settings, dates)?;
        (
            record.task_id.clone(),
            before,
            !record.is_leaf(),
            record.props.is_auto_schedule,
            changes,
        )
    };

    let mut shifted = Vec::new();
    if !changes.schedule.is_empty() {
        if is_parent && is_auto {
            match changes.schedule.start {
                Some(Some(start)) => shifted = shift_parent(ctx, uid, start),
                _ => debug!(task = %id, "summary dates follow their children"),
            }
        } else if let Some(r) = ctx.store.get_mut(uid) {
            resolve_dates(
                &mut r.props,
                &changes.schedule,
                dates,
                settings.allow_unscheduled_tasks,
            )?;
        }
    }
    if let Some(segments) = changes.segments.as_deref().filter(|_| !is_parent) {
        if let Some(r) = ctx.store.get_mut(uid) {
            apply_segments(&mut r.props, segments, dates);
        }
    }
    if changes.mode_switched {
        switch_mode(ctx, uid);
    }
    if !is_parent {
        let trigger = if changes.work_changed {
            Some(WorkTrigger::Work)
        } else if changes.resources_changed {
            Some(WorkTrigger::Resources)
        } else if !changes.schedule.is_empty()
            || changes.segments.is_some()
            || changes.task_type_changed
        {
            Some(WorkTrigger::Duration)
        } else {
            None
        };
        if let (Some(trigger), Some(r)) = (trigger, ctx.store.get_mut(uid)) {
            apply_work_rules(&mut r.props, trigger, dates);
        }
    }
    refresh_task(ctx, uid);

    if let Some(text) = changes.dependency.as_deref() {
        set_dependencies(ctx, uid, text)?;
        snap_to_links(ctx, uid);
    }

    let moved = ctx
        .store
        .get(uid)
        .is_some_and(|r| r.props.schedule_key() != before);
    let mut step = Step::default();
    if moved && changes.dependency.is_none() {
        match detect_violation(ctx, uid, ViolationType::TaskWarning) {
            Some(v) => step.violations.push(v),
            None => {
                retighten(ctx, uid);
            }
        }
    }
    for &leaf in &shifted {
        match detect_violation(ctx, leaf, ViolationType::ParentTaskWarning) {
            Some(v) => step.violations.push(v),
            None => {
                retighten(ctx, leaf);
            }
        }
    }
    if moved || changes.dependency.is_some() {
        step.seeds.push(uid);
    }
    step.seeds.extend(shifted);
    if settings.is_resource_view() {
        if let Some(previous) = changes.previous_resources {
            step.diffs.push((uid, previous));
        }
    }
    Ok(step)
}

/// Propagates, rolls up, syncs clones and writes schedules back.
fn settle(
    ctx: &mut EditContext<'_>,
    snapshot: &TaskStore,
    seeds: &[UniqueId],
    diffs: &[(UniqueId, Vec<ResourceRef>)],
) {
    let moved = propagate(ctx, seeds);
    debug!(seeds = seeds.len(), moved = moved.len(), "propagation settled");
    for uid in ctx.touched.clone() {
        roll_up_ancestors(ctx, uid);
    }

    if ctx.settings.is_resource_view() {
        // Clones must agree before regrouping copies one of them.
        for uid in ctx.touched.clone() {
            if ctx.store.get(uid).is_some_and(|r| !r.is_resource_group) {
                tree::sync_clones(ctx, uid);
            }
        }
        for (uid, previous) in diffs {
            tree::apply_resource_diff(ctx, *uid, previous);
        }
        let groups: Vec<UniqueId> = ctx
            .store
            .roots()
            .iter()
            .copied()
            .filter(|&g| {
                ctx.store
                    .get(g)
                    .is_some_and(|r| r.is_resource_group && !r.is_leaf())
            })
            .collect();
        for group in groups {
            roll_up_parent(ctx, group);
        }
    }

    for uid in ctx.store.flat_ids().to_vec() {
        let Some(record) = ctx.store.get(uid) else {
            continue;
        };
        if record.is_resource_group {
            continue;
        }
        let stale = snapshot.get(uid).map_or(true, |old| {
            old.props != record.props
                || old.task_data != record.task_data
                || old.parent_unique_id() != record.parent_unique_id()
        });
        if stale {
            if let Some(r) = ctx.store.get_mut(uid) {
                write_back(r, ctx.settings);
            }
        }
    }
}
