//! Field mapper and value applier.
//!
//! Translates a partial edit (a bag of `{row key: value}` pairs, keys as
//! configured in [`TaskFields`](crate::config::TaskFields)) into mutations
//! of a [`TaskRecord`].
//!
//! # Rules
//!
//! - Start, end, duration and duration unit are **collected, not applied**:
//!   they come back in [`ScheduleEdit`] so the recalculator can resolve
//!   them jointly.
//! - The milestone flag folds into the schedule edit (on ⇒ duration 0;
//!   off with a zero duration ⇒ duration 1).
//! - Every other mapped attribute is written to all three locations
//!   (`props`, `task_data`, `fields`) in one place.
//! - Declared custom columns are coerced by edit type; keys already present
//!   in the caller's row are written raw; anything else is ignored.
//!
//! After the engine recomputes a record, [`write_back`] mirrors the
//! schedule into `task_data`/`fields` again.

use chrono::NaiveDateTime;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::{EditType, GanttSettings};
use crate::dates::DateService;
use crate::error::EditError;
use crate::models::{DurationUnit, ResourceId, ResourceRef, TaskRecord, TaskType};

const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Schedule fields present in an edit, resolved jointly later.
///
/// The outer `Option` says whether the field was present; the inner one
/// carries the (possibly cleared) value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleEdit {
    pub start: Option<Option<NaiveDateTime>>,
    pub end: Option<Option<NaiveDateTime>>,
    pub duration: Option<Option<f64>>,
    pub duration_unit: Option<DurationUnit>,
}

impl ScheduleEdit {
    /// How many of start, end and duration are present.
    pub fn field_count(&self) -> usize {
        [
            self.start.is_some(),
            self.end.is_some(),
            self.duration.is_some(),
        ]
        .iter()
        .filter(|&&p| p)
        .count()
    }

    /// Whether nothing schedule-related was edited.
    pub fn is_empty(&self) -> bool {
        self.field_count() == 0 && self.duration_unit.is_none()
    }
}

/// One segment of a segments payload, before resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentInput {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub duration: Option<f64>,
}

/// What an applied edit changed, beyond plain attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldChanges {
    pub schedule: ScheduleEdit,
    /// Resource list before the edit, when the assigned id set changed.
    pub previous_resources: Option<Vec<ResourceRef>>,
    /// Resource list replaced (ids or units differ).
    pub resources_changed: bool,
    pub work_changed: bool,
    /// `is_auto_schedule` flipped.
    pub mode_switched: bool,
    /// New dependency text, when the dependency cell was edited.
    pub dependency: Option<String>,
    pub segments: Option<Vec<SegmentInput>>,
    pub task_type_changed: bool,
}

/// Applies a partial edit to `record`.
///
/// The id key is skipped: identity changes go through task id renaming.
pub fn apply_fields(
    record: &mut TaskRecord,
    data: &Map<String, Value>,
    settings: &GanttSettings,
    dates: &dyn DateService,
) -> Result<FieldChanges, EditError> {
    let f = &settings.task_fields;
    let mut changes = FieldChanges::default();
    let mut milestone: Option<bool> = None;

    for (key, value) in data {
        let key = key.as_str();
        if key == f.id {
            continue;
        } else if key == f.start_date {
            changes.schedule.start = Some(read_date(key, value, dates)?);
        } else if Some(key) == f.end_date.as_deref() {
            changes.schedule.end = Some(read_date(key, value, dates)?);
        } else if Some(key) == f.duration.as_deref() {
            let (duration, unit) = read_duration(key, value)?;
            changes.schedule.duration = Some(duration);
            if unit.is_some() {
                changes.schedule.duration_unit = unit;
            }
        } else if Some(key) == f.duration_unit.as_deref() {
            if let Some(unit) = value.as_str().and_then(DurationUnit::parse) {
                changes.schedule.duration_unit = Some(unit);
            }
        } else if key == f.name {
            let name = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
            record.props.task_name = name;
            record.write_through(key, value.clone());
        } else if Some(key) == f.progress.as_deref() {
            let progress = read_number(key, value)?.unwrap_or(0.0).clamp(0.0, 100.0);
            record.props.progress = progress;
            record.write_through(key, number(progress));
        } else if Some(key) == f.resource_info.as_deref() {
            let resources = read_resources(value, settings);
            let old_ids = id_set(&record.props.resource_info);
            let new_ids = id_set(&resources);
            if old_ids != new_ids {
                changes.previous_resources = Some(record.props.resource_info.clone());
            }
            changes.resources_changed = resources != record.props.resource_info;
            record.props.resource_info = resources;
        } else if Some(key) == f.work.as_deref() {
            let work = read_number(key, value)?.unwrap_or(0.0).max(0.0);
            changes.work_changed = (work - record.props.work).abs() > f64::EPSILON;
            record.props.work = work;
        } else if Some(key) == f.dependency.as_deref() {
            let text = match value {
                Value::Null => String::new(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            changes.dependency = Some(text);
        } else if Some(key) == f.manual.as_deref() {
            let manual = read_bool(value);
            if manual == record.props.is_auto_schedule {
                record.props.is_auto_schedule = !manual;
                changes.mode_switched = true;
            }
            record.write_through(key, Value::Bool(manual));
        } else if Some(key) == f.milestone.as_deref() {
            milestone = Some(read_bool(value));
        } else if Some(key) == f.task_type.as_deref() {
            let task_type = value
                .as_str()
                .and_then(TaskType::parse)
                .ok_or_else(|| EditError::invalid(key, "expected a task type name"))?;
            changes.task_type_changed = task_type != record.props.task_type;
            record.props.task_type = task_type;
            record.write_through(key, Value::String(task_type.as_str().to_string()));
        } else if Some(key) == f.notes.as_deref() {
            record.props.notes = value.as_str().map(str::to_string);
            record.write_through(key, value.clone());
        } else if Some(key) == f.baseline_start_date.as_deref() {
            record.props.baseline_start_date = read_date(key, value, dates)?;
            record.write_through(key, date_value(record.props.baseline_start_date));
        } else if Some(key) == f.baseline_end_date.as_deref() {
            record.props.baseline_end_date = read_date(key, value, dates)?;
            record.write_through(key, date_value(record.props.baseline_end_date));
        } else if Some(key) == f.segments.as_deref() {
            changes.segments = Some(read_segments(key, value, settings, dates)?);
        } else if Some(key) == f.indicators.as_deref() {
            record.props.indicators = match value {
                Value::Array(items) => items.clone(),
                Value::Null => Vec::new(),
                other => vec![other.clone()],
            };
            record.write_through(key, value.clone());
        } else if Some(key) == f.expand_state.as_deref() {
            record.expanded = read_bool(value);
            record.write_through(key, Value::Bool(record.expanded));
        } else if Some(key) == f.parent_id.as_deref() {
            debug!(task = %record.task_id, "parent id edits are applied through row moves");
        } else if let Some(edit_type) = settings.column_edit_type(key) {
            let coerced = coerce(key, value, edit_type, dates)?;
            record.write_through(key, coerced);
        } else if record.task_data.contains_key(key) {
            record.write_through(key, value.clone());
        } else {
            debug!(task = %record.task_id, field = key, "ignoring unknown field");
        }
    }

    if let Some(on) = milestone {
        fold_milestone(record, &mut changes.schedule, on);
    }
    Ok(changes)
}

fn fold_milestone(record: &mut TaskRecord, schedule: &mut ScheduleEdit, on: bool) {
    let current = record.props.duration.unwrap_or(0.0);
    if schedule.duration.is_some() {
        return;
    }
    if on && !record.props.is_milestone {
        schedule.duration = Some(Some(0.0));
    } else if !on && record.props.is_milestone && current == 0.0 {
        schedule.duration = Some(Some(1.0));
    }
    record.props.is_milestone = on;
}

/// Mirrors the schedule of `record` into `task_data` and `fields`.
pub fn write_back(record: &mut TaskRecord, settings: &GanttSettings) {
    let f = &settings.task_fields;
    let p = record.props.clone();

    record.write_through(&f.id, record.task_id.to_value());
    record.write_through(&f.name, Value::String(p.task_name.clone()));
    record.write_through(&f.start_date, date_value(p.start_date));
    let optional: [(&Option<String>, Value); 12] = [
        (&f.end_date, date_value(p.end_date)),
        (&f.duration, p.duration.map(number).unwrap_or(Value::Null)),
        (&f.duration_unit, Value::String(p.duration_unit.as_str().into())),
        (&f.progress, number(p.progress)),
        (&f.work, number(p.work)),
        (&f.task_type, Value::String(p.task_type.as_str().into())),
        (&f.manual, Value::Bool(!p.is_auto_schedule)),
        (&f.milestone, Value::Bool(p.is_milestone)),
        (&f.dependency, dependency_value(&p.predecessors_name)),
        (&f.resource_info, resources_value(&p.resource_info, settings)),
        (&f.segments, segments_value(&p.segments)),
        (
            &f.parent_id,
            record
                .parent_item
                .as_ref()
                .map(|pr| pr.task_id.to_value())
                .unwrap_or(Value::Null),
        ),
    ];
    for (key, value) in optional {
        if let Some(key) = key {
            record.write_through(key, value);
        }
    }
}

/// A JSON number, integral when possible.
pub fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

/// A date cell.
pub fn date_value(date: Option<NaiveDateTime>) -> Value {
    date.map(|d| Value::String(d.format(DATE_FORMAT).to_string()))
        .unwrap_or(Value::Null)
}

fn dependency_value(text: &str) -> Value {
    if text.is_empty() {
        Value::Null
    } else {
        Value::String(text.to_string())
    }
}

fn resources_value(resources: &[ResourceRef], settings: &GanttSettings) -> Value {
    let rf = &settings.resource_fields;
    Value::Array(
        resources
            .iter()
            .map(|r| {
                let mut obj = Map::new();
                obj.insert(rf.id.clone(), r.id.to_value());
                obj.insert(rf.name.clone(), Value::String(r.name.clone()));
                obj.insert(rf.unit.clone(), number(r.unit));
                Value::Object(obj)
            })
            .collect(),
    )
}

fn segments_value(segments: &[crate::models::TaskSegment]) -> Value {
    if segments.is_empty() {
        return Value::Null;
    }
    Value::Array(
        segments
            .iter()
            .map(|s| {
                serde_json::json!({
                    "StartDate": date_value(Some(s.start_date)),
                    "EndDate": date_value(Some(s.end_date)),
                    "Duration": number(s.duration),
                })
            })
            .collect(),
    )
}

fn id_set(resources: &[ResourceRef]) -> Vec<ResourceId> {
    let mut ids: Vec<ResourceId> = resources.iter().map(|r| r.id.clone()).collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Reads a resource cell: ids, resource objects, or a single value.
pub fn read_resources(value: &Value, settings: &GanttSettings) -> Vec<ResourceRef> {
    let rf = &settings.resource_fields;
    let items: Vec<&Value> = match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    let mut out: Vec<ResourceRef> = Vec::new();
    for item in items {
        let (id, unit, name) = match item {
            Value::Object(obj) => (
                obj.get(&rf.id).and_then(ResourceId::from_value),
                obj.get(&rf.unit).and_then(Value::as_f64),
                obj.get(&rf.name).and_then(Value::as_str).map(str::to_string),
            ),
            other => (ResourceId::from_value(other), None, None),
        };
        let Some(id) = id else {
            warn!("skipping resource entry without an id");
            continue;
        };
        if out.iter().any(|r| r.id == id) {
            continue;
        }
        let known = settings.resources.iter().find(|r| r.id == id);
        if known.is_none() && !settings.resources.is_empty() {
            warn!(resource = %id, "skipping unknown resource");
            continue;
        }
        let mut resource = known.map(|r| r.to_ref()).unwrap_or_else(|| ResourceRef::new(id));
        if let Some(unit) = unit {
            resource.unit = unit.max(0.0);
        }
        if let Some(name) = name {
            resource.name = name;
        }
        out.push(resource);
    }
    out
}

fn read_date(
    key: &str,
    value: &Value,
    dates: &dyn DateService,
) -> Result<Option<NaiveDateTime>, EditError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => dates
            .parse_date(s)
            .map(Some)
            .ok_or_else(|| EditError::invalid(key, format!("unrecognized date '{s}'"))),
        _ => Err(EditError::invalid(key, "expected a date string")),
    }
}

fn read_number(key: &str, value: &Value) -> Result<Option<f64>, EditError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| EditError::invalid(key, format!("expected a number, got '{s}'"))),
        _ => Err(EditError::invalid(key, "expected a number")),
    }
}

/// Reads a duration cell: a number, or text such as `"5 days"`.
fn read_duration(key: &str, value: &Value) -> Result<(Option<f64>, Option<DurationUnit>), EditError> {
    let invalid = || EditError::invalid(key, "expected a non-negative duration");
    let (duration, unit) = match value {
        Value::String(s) if !s.trim().is_empty() => {
            let s = s.trim();
            let split = s
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .unwrap_or(s.len());
            let duration: f64 = s[..split].parse().map_err(|_| invalid())?;
            let unit_text = s[split..].trim();
            let unit = if unit_text.is_empty() {
                None
            } else {
                Some(DurationUnit::parse(unit_text).ok_or_else(invalid)?)
            };
            (Some(duration), unit)
        }
        other => (read_number(key, other)?, None),
    };
    if duration.is_some_and(|d| d < 0.0 || !d.is_finite()) {
        return Err(invalid());
    }
    Ok((duration, unit))
}

fn read_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

fn read_segments(
    key: &str,
    value: &Value,
    settings: &GanttSettings,
    dates: &dyn DateService,
) -> Result<Vec<SegmentInput>, EditError> {
    let f = &settings.task_fields;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    items
        .iter()
        .map(|item| {
            let obj = item
                .as_object()
                .ok_or_else(|| EditError::invalid(key, "segments must be objects"))?;
            let get = |names: [&str; 2]| names.iter().find_map(|n| obj.get(*n));
            let start = match get([f.start_date.as_str(), "StartDate"]) {
                Some(v) => read_date(key, v, dates)?,
                None => None,
            };
            let end = match get([f.end_date.as_deref().unwrap_or("EndDate"), "EndDate"]) {
                Some(v) => read_date(key, v, dates)?,
                None => None,
            };
            let duration = match get([f.duration.as_deref().unwrap_or("Duration"), "Duration"]) {
                Some(v) => read_duration(key, v)?.0,
                None => None,
            };
            Ok(SegmentInput {
                start,
                end,
                duration,
            })
        })
        .collect()
}

fn coerce(
    key: &str,
    value: &Value,
    edit_type: EditType,
    dates: &dyn DateService,
) -> Result<Value, EditError> {
    Ok(match edit_type {
        EditType::Date | EditType::DateTime => date_value(read_date(key, value, dates)?),
        EditType::Numeric => read_number(key, value)?.map(number).unwrap_or(Value::Null),
        EditType::Boolean => Value::Bool(read_bool(value)),
        EditType::String | EditType::DropDown => match value {
            Value::String(_) | Value::Null => value.clone(),
            other => Value::String(other.to_string()),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::at;
    use crate::config::ColumnDef;
    use crate::models::{GanttProperties, Resource, WorkingCalendar};
    use serde_json::json;

    fn record() -> TaskRecord {
        let props = GanttProperties::new("A")
            .with_start(at(1, 8))
            .with_end(at(5, 17))
            .with_duration(5.0);
        TaskRecord::new(1, 1, props)
    }

    fn apply(record: &mut TaskRecord, data: Value, settings: &GanttSettings) -> FieldChanges {
        let cal = WorkingCalendar::new();
        let map = data.as_object().unwrap().clone();
        apply_fields(record, &map, settings, &cal).unwrap()
    }

    #[test]
    fn test_schedule_fields_are_deferred() {
        let settings = GanttSettings::default();
        let mut r = record();
        let c = apply(
            &mut r,
            json!({"StartDate": "2024-01-03T08:00:00", "Duration": "2 hours"}),
            &settings,
        );
        assert_eq!(c.schedule.start, Some(Some(at(3, 8))));
        assert_eq!(c.schedule.duration, Some(Some(2.0)));
        assert_eq!(c.schedule.duration_unit, Some(DurationUnit::Hour));
        assert_eq!(c.schedule.field_count(), 2);
        // Not applied yet.
        assert_eq!(r.props.start_date, Some(at(1, 8)));
    }

    #[test]
    fn test_attribute_triple_write() {
        let settings = GanttSettings::default();
        let mut r = record();
        apply(&mut r, json!({"Progress": 130, "TaskName": "Design"}), &settings);
        assert_eq!(r.props.progress, 100.0);
        assert_eq!(r.task_data["Progress"], json!(100));
        assert_eq!(r.fields["Progress"], json!(100));
        assert_eq!(r.props.task_name, "Design");
        assert_eq!(r.fields["TaskName"], json!("Design"));
    }

    #[test]
    fn test_resource_change_records_previous() {
        let settings = GanttSettings::default()
            .with_resource_view(vec![Resource::new(1, "Ann"), Resource::new(2, "Bob")]);
        let mut r = record();
        r.props.resource_info = vec![ResourceRef::new(1)];
        let c = apply(
            &mut r,
            json!({"Resources": [{"resourceId": 2, "resourceUnit": 50}, 7]}),
            &settings,
        );
        assert_eq!(c.previous_resources.as_ref().unwrap()[0].id, ResourceId::from(1));
        assert!(c.resources_changed);
        assert_eq!(r.props.resource_info.len(), 1);
        assert_eq!(r.props.resource_info[0].name, "Bob");
        assert_eq!(r.props.resource_info[0].unit, 50.0);
    }

    #[test]
    fn test_resource_unit_change_keeps_id_set() {
        let settings = GanttSettings::default();
        let mut r = record();
        r.props.resource_info = vec![ResourceRef::new(1)];
        let c = apply(
            &mut r,
            json!({"Resources": [{"resourceId": 1, "resourceUnit": 50}]}),
            &settings,
        );
        assert!(c.previous_resources.is_none());
        assert!(c.resources_changed);
    }

    #[test]
    fn test_manual_toggle() {
        let settings = GanttSettings::default();
        let mut r = record();
        let c = apply(&mut r, json!({"IsManual": true}), &settings);
        assert!(c.mode_switched);
        assert!(!r.props.is_auto_schedule);
        let c = apply(&mut r, json!({"IsManual": true}), &settings);
        assert!(!c.mode_switched);
    }

    #[test]
    fn test_milestone_folds_into_duration() {
        let settings = GanttSettings::default();
        let mut r = record();
        let c = apply(&mut r, json!({"Milestone": true}), &settings);
        assert_eq!(c.schedule.duration, Some(Some(0.0)));
        assert!(r.props.is_milestone);

        r.props.duration = Some(0.0);
        let c = apply(&mut r, json!({"Milestone": false}), &settings);
        assert_eq!(c.schedule.duration, Some(Some(1.0)));
    }

    #[test]
    fn test_custom_column_coercion_and_unknown_keys() {
        let settings = GanttSettings::default()
            .with_column(ColumnDef::new("Due", EditType::Date))
            .with_column(ColumnDef::new("Cost", EditType::Numeric));
        let mut r = record();
        r.task_data.insert("Owner".into(), json!("x"));
        apply(
            &mut r,
            json!({"Due": "2024-01-09", "Cost": "12.5", "Owner": "y", "Mystery": 1}),
            &settings,
        );
        assert_eq!(r.task_data["Due"], json!("2024-01-09T00:00:00"));
        assert_eq!(r.fields["Cost"], json!(12.5));
        assert_eq!(r.task_data["Owner"], json!("y"));
        assert!(!r.task_data.contains_key("Mystery"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let settings = GanttSettings::default();
        let cal = WorkingCalendar::new();
        let mut r = record();
        for bad in [
            json!({"StartDate": "someday"}),
            json!({"Duration": -2}),
            json!({"Progress": "lots"}),
            json!({"TaskType": "FixedFun"}),
        ] {
            let map = bad.as_object().unwrap().clone();
            assert!(matches!(
                apply_fields(&mut r, &map, &settings, &cal),
                Err(EditError::InvalidValue { .. })
            ));
        }
    }

    #[test]
    fn test_write_back_mirrors_schedule() {
        let settings = GanttSettings::default();
        let mut r = record();
        r.props.predecessors_name = "2FS".into();
        write_back(&mut r, &settings);
        assert_eq!(r.task_data["TaskID"], json!(1));
        assert_eq!(r.task_data["StartDate"], json!("2024-01-01T08:00:00"));
        assert_eq!(r.task_data["EndDate"], json!("2024-01-05T17:00:00"));
        assert_eq!(r.task_data["Duration"], json!(5));
        assert_eq!(r.task_data["Predecessor"], json!("2FS"));
        assert_eq!(r.fields["IsManual"], json!(false));
        assert_eq!(r.task_data["ParentID"], Value::Null);
    }

    #[test]
    fn test_segments_payload() {
        let settings = GanttSettings::default();
        let mut r = record();
        let c = apply(
            &mut r,
            json!({"Segments": [
                {"StartDate": "2024-01-01T08:00:00", "Duration": 2},
                {"StartDate": "2024-01-04T08:00:00", "EndDate": "2024-01-05T17:00:00"}
            ]}),
            &settings,
        );
        let segs = c.segments.unwrap();
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].duration, Some(2.0));
        assert_eq!(segs[1].end, Some(at(5, 17)));
    }
}
