//! Building a store from flat rows.

use chrono::{Local, NaiveDateTime, NaiveTime};
use serde_json::Value;
use tracing::{info, warn};

use super::add::{next_task_id, record_from_row};
use super::resource_view;
use crate::config::GanttSettings;
use crate::context::EditContext;
use crate::dates::DateService;
use crate::error::EditError;
use crate::mapper::write_back;
use crate::models::{PredecessorEdge, TaskId, TaskRecord, UniqueId};
use crate::predecessor::add_edge;
use crate::schedule::{refresh_task, roll_up_parent, update_geometry};
use crate::store::TaskStore;
use crate::validation::would_create_cycle;

/// Loads `rows` into a new store and returns it with the timeline origin.
///
/// Rows reference their parent through the parent id field; a row whose
/// parent is unknown becomes a root. Duplicate or missing ids get the next
/// numeric id. Links are seeded after every row exists; references to
/// unknown tasks, summary tasks and links that would close a cycle are
/// skipped. Parents are rolled up bottom-up.
///
/// The origin is the configured project start, or midnight of the
/// earliest task start.
pub fn load(
    rows: &[Value],
    settings: &GanttSettings,
    dates: &dyn DateService,
) -> Result<(TaskStore, NaiveDateTime), EditError> {
    let mut store = TaskStore::new();
    let fallback = settings
        .project_start_date
        .unwrap_or_else(|| Local::now().date_naive().and_time(NaiveTime::MIN));
    let mut ctx = EditContext::new(&mut store, settings, dates, fallback);

    let fields = &settings.task_fields;
    let mut parsed: Vec<(TaskRecord, Option<TaskId>, Option<String>)> = Vec::new();
    let mut seen: Vec<TaskId> = Vec::new();
    let mut max_id = 0;
    for row in rows {
        let Some(row) = row.as_object() else {
            warn!("skipping a row that is not an object");
            continue;
        };
        let id = match row.get(&fields.id).and_then(TaskId::from_value) {
            Some(id) if !seen.contains(&id) => id,
            other => {
                let id = TaskId::from(max_id + 1);
                if let Some(dup) = other {
                    warn!(duplicate = %dup, assigned = %id, "duplicate task id");
                }
                id
            }
        };
        max_id = max_id.max(id.as_number().unwrap_or(0));
        seen.push(id.clone());

        let uid = ctx.store.allocate_unique_id();
        let (mut record, changes) = record_from_row(&ctx, uid, id.clone(), row, fallback)?;
        record.write_through(&fields.id, id.to_value());
        let parent = fields
            .parent_id
            .as_ref()
            .and_then(|f| row.get(f))
            .and_then(TaskId::from_value);
        parsed.push((record, parent, changes.dependency));
    }

    let mut dependencies: Vec<(UniqueId, String)> = Vec::new();
    if settings.is_resource_view() {
        for resource in &settings.resources {
            let r = resource.to_ref();
            resource_view::ensure_group(&mut ctx, Some(&r));
        }
        for (record, _, dependency) in parsed {
            let uid = resource_view::place(&mut ctx, record);
            if let Some(text) = dependency {
                dependencies.push((uid, text));
            }
        }
    } else {
        let mut parents: Vec<(UniqueId, TaskId)> = Vec::new();
        for (record, parent, dependency) in parsed {
            let uid = record.unique_id;
            ctx.store.insert(record, None, usize::MAX);
            if let Some(p) = parent {
                parents.push((uid, p));
            }
            if let Some(text) = dependency {
                dependencies.push((uid, text));
            }
        }
        for (uid, parent_id) in parents {
            let Some(parent) = ctx.store.primary_uid(&parent_id) else {
                warn!(parent = %parent_id, "unknown parent; keeping row at top level");
                continue;
            };
            if parent == uid || ctx.store.is_descendant(parent, uid) {
                warn!(parent = %parent_id, "parent reference would form a loop; ignored");
                continue;
            }
            ctx.store.detach(uid);
            ctx.store.attach(uid, Some(parent), usize::MAX);
        }
        ctx.store.reindex();
    }

    for (uid, text) in dependencies {
        seed_links(&mut ctx, uid, &text);
    }

    let ids = ctx.store.flat_ids().to_vec();
    for &uid in ids.iter().rev() {
        match ctx.store.get(uid).map(TaskRecord::is_leaf) {
            Some(true) => refresh_task(&mut ctx, uid),
            Some(false) => roll_up_parent(&mut ctx, uid),
            None => {}
        }
    }

    let origin = settings.project_start_date.unwrap_or_else(|| {
        ctx.store
            .timeline_origin()
            .map(|d| d.date().and_time(NaiveTime::MIN))
            .unwrap_or(fallback)
    });
    for &uid in &ids {
        if let Some(r) = ctx.store.get_mut(uid) {
            update_geometry(&mut r.props, origin, settings.day_width);
            if !r.is_resource_group {
                write_back(r, settings);
            }
        }
    }
    let count = ctx.store.len();
    drop(ctx);
    info!(rows = rows.len(), records = count, next_id = %next_task_id(&store), "tasks loaded");
    Ok((store, origin))
}

/// Adds the links parsed from one row's dependency text.
fn seed_links(ctx: &mut EditContext<'_>, uid: UniqueId, text: &str) {
    let Some(record) = ctx.store.get(uid) else {
        return;
    };
    let id = record.task_id.clone();
    if !record.is_leaf() {
        warn!(task = %id, "summary task links ignored");
        return;
    }
    for edge in PredecessorEdge::parse_list(text, &id, ctx.settings.duration_unit) {
        let Some(from_uid) = ctx.store.primary_uid(&edge.from) else {
            warn!(task = %id, from = %edge.from, "link to unknown task ignored");
            continue;
        };
        let summary = ctx.store.get(from_uid).is_some_and(|r| !r.is_leaf());
        if edge.from == id || summary || would_create_cycle(ctx.store, &edge.from, &edge.to) {
            warn!(task = %id, from = %edge.from, "invalid link ignored");
            continue;
        }
        add_edge(ctx.store, edge);
    }
}
