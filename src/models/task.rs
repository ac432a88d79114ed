//! Task record model.
//!
//! A task record is the unit of the Gantt tree. It carries three views of
//! the same row:
//!
//! - **`props`** ([`GanttProperties`]): the computed schedule the engine
//!   reasons about (dates, duration, progress, links, resources).
//! - **`task_data`**: the caller's original row, keyed by the configured
//!   field names. Kept in sync field-by-field with `props`.
//! - **`fields`**: the record-level mirror of mapped values (what a grid
//!   reads when it binds directly to the record).
//!
//! Parent linkage is index-based: [`ParentRef`] is a snapshot resolved
//! through the store's unique-id index, never an owning pointer.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::{PredecessorEdge, ResourceRef};

/// Process-local record identity, stable for the record's lifetime.
pub type UniqueId = u64;

/// User-facing task identifier.
///
/// Numeric ids are the common case (auto-assignment uses `max + 1`), but
/// string ids are accepted verbatim. Resource-view clones share one id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Creates a task id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value, if the id is an integer.
    pub fn as_number(&self) -> Option<i64> {
        self.0.trim().parse().ok()
    }

    /// Reads an id from a JSON cell (number or non-empty string).
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(|v| Self(v.to_string()))
                .or_else(|| Some(Self(n.to_string()))),
            Value::String(s) if !s.trim().is_empty() => Some(Self(s.trim().to_string())),
            _ => None,
        }
    }

    /// Writes the id back as a JSON cell, numeric when possible.
    pub fn to_value(&self) -> Value {
        match self.as_number() {
            Some(n) => Value::from(n),
            None => Value::String(self.0.clone()),
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for TaskId {
    fn from(v: i64) -> Self {
        Self(v.to_string())
    }
}

impl From<&str> for TaskId {
    fn from(v: &str) -> Self {
        Self(v.to_string())
    }
}

impl From<String> for TaskId {
    fn from(v: String) -> Self {
        Self(v)
    }
}

/// Unit a duration or link offset is expressed in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    /// One working day (calendar-defined length).
    #[default]
    Day,
    /// Sixty working minutes.
    Hour,
    /// One working minute.
    Minute,
}

impl DurationUnit {
    /// Parses a unit name or suffix (`"days"`, `"d"`, `"Hour"`, `"min"`, ...).
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "d" | "day" | "days" => Some(Self::Day),
            "h" | "hr" | "hrs" | "hour" | "hours" => Some(Self::Hour),
            "m" | "min" | "mins" | "minute" | "minutes" => Some(Self::Minute),
            _ => None,
        }
    }

    /// Short suffix used in predecessor strings.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Day => "d",
            Self::Hour => "h",
            Self::Minute => "m",
        }
    }

    /// Canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Hour => "hour",
            Self::Minute => "minute",
        }
    }
}

/// Which of work, duration and resource units is held fixed when one changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskType {
    /// Resource units are fixed.
    #[default]
    FixedUnit,
    /// Work is fixed.
    FixedWork,
    /// Duration is fixed.
    FixedDuration,
}

impl TaskType {
    /// Parses `"FixedUnit"`, `"fixedWork"`, `"FixedDuration"` (case-insensitive).
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "fixedunit" => Some(Self::FixedUnit),
            "fixedwork" => Some(Self::FixedWork),
            "fixedduration" => Some(Self::FixedDuration),
            _ => None,
        }
    }

    /// Canonical name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FixedUnit => "FixedUnit",
            Self::FixedWork => "FixedWork",
            Self::FixedDuration => "FixedDuration",
        }
    }
}

/// One piece of a split task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSegment {
    /// Segment start.
    pub start_date: NaiveDateTime,
    /// Segment end.
    pub end_date: NaiveDateTime,
    /// Working duration in the owning task's unit.
    pub duration: f64,
}

/// Snapshot of a record's parent: resolved through the unique-id index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentRef {
    /// Parent's unique id (the lookup key).
    pub unique_id: UniqueId,
    /// Parent's level at snapshot time.
    pub level: usize,
    /// Parent's flat index at snapshot time.
    pub index: usize,
    /// Parent's user-facing id.
    pub task_id: TaskId,
}

/// The computed schedule of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GanttProperties {
    pub task_name: String,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub duration: Option<f64>,
    pub duration_unit: DurationUnit,
    pub is_milestone: bool,
    pub is_auto_schedule: bool,
    /// Percent complete, 0..=100.
    pub progress: f64,
    pub work: f64,
    pub work_unit: DurationUnit,
    pub task_type: TaskType,
    pub effort_driven: bool,
    pub resource_info: Vec<ResourceRef>,
    /// Every edge touching this task, incoming and outgoing.
    pub predecessor: Vec<PredecessorEdge>,
    /// Display string of the incoming edges.
    pub predecessors_name: String,
    pub segments: Vec<TaskSegment>,
    /// Resource-view clones of this task (including itself).
    pub shared_task_unique_ids: Vec<UniqueId>,
    /// Roll-up shadow fields; equal to the live fields for leaves.
    pub auto_start_date: Option<NaiveDateTime>,
    pub auto_end_date: Option<NaiveDateTime>,
    pub auto_duration: Option<f64>,
    pub baseline_start_date: Option<NaiveDateTime>,
    pub baseline_end_date: Option<NaiveDateTime>,
    pub notes: Option<String>,
    pub indicators: Vec<Value>,
    // Taskbar geometry, in pixels.
    pub left: f64,
    pub width: f64,
    pub progress_width: f64,
    pub baseline_left: f64,
    pub baseline_width: f64,
}

impl Default for GanttProperties {
    fn default() -> Self {
        Self {
            task_name: String::new(),
            start_date: None,
            end_date: None,
            duration: None,
            duration_unit: DurationUnit::Day,
            is_milestone: false,
            is_auto_schedule: true,
            progress: 0.0,
            work: 0.0,
            work_unit: DurationUnit::Hour,
            task_type: TaskType::FixedUnit,
            effort_driven: false,
            resource_info: Vec::new(),
            predecessor: Vec::new(),
            predecessors_name: String::new(),
            segments: Vec::new(),
            shared_task_unique_ids: Vec::new(),
            auto_start_date: None,
            auto_end_date: None,
            auto_duration: None,
            baseline_start_date: None,
            baseline_end_date: None,
            notes: None,
            indicators: Vec::new(),
            left: 0.0,
            width: 0.0,
            progress_width: 0.0,
            baseline_left: 0.0,
            baseline_width: 0.0,
        }
    }
}

impl GanttProperties {
    /// Creates properties for a named task.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            task_name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the start date.
    pub fn with_start(mut self, start: NaiveDateTime) -> Self {
        self.start_date = Some(start);
        self
    }

    /// Sets the end date.
    pub fn with_end(mut self, end: NaiveDateTime) -> Self {
        self.end_date = Some(end);
        self
    }

    /// Sets the duration.
    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Sets the progress (clamped to 0..=100).
    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = progress.clamp(0.0, 100.0);
        self
    }

    /// Marks the task as manually scheduled.
    pub fn manual(mut self) -> Self {
        self.is_auto_schedule = false;
        self
    }

    /// Edges where this task is the successor.
    pub fn incoming<'a>(&'a self, own_id: &'a TaskId) -> impl Iterator<Item = &'a PredecessorEdge> {
        self.predecessor.iter().filter(move |e| &e.to == own_id)
    }

    /// Edges where this task is the predecessor.
    pub fn outgoing<'a>(&'a self, own_id: &'a TaskId) -> impl Iterator<Item = &'a PredecessorEdge> {
        self.predecessor.iter().filter(move |e| &e.from == own_id)
    }

    /// Schedule fields as a comparable tuple (used to detect moves).
    pub fn schedule_key(
        &self,
    ) -> (
        Option<NaiveDateTime>,
        Option<NaiveDateTime>,
        Option<f64>,
        DurationUnit,
    ) {
        (self.start_date, self.end_date, self.duration, self.duration_unit)
    }
}

/// A node of the Gantt task tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub unique_id: UniqueId,
    pub task_id: TaskId,
    /// Depth; 0 for roots.
    pub level: usize,
    pub parent_item: Option<ParentRef>,
    /// Ordered children (unique ids).
    pub child_records: Vec<UniqueId>,
    pub has_child_records: bool,
    pub expanded: bool,
    /// Position in the flat list.
    pub index: usize,
    /// Staged for deletion.
    pub is_delete: bool,
    /// Synthetic resource row in resource view.
    pub is_resource_group: bool,
    pub props: GanttProperties,
    pub task_data: Map<String, Value>,
    pub fields: Map<String, Value>,
}

impl TaskRecord {
    /// Creates a detached root record.
    pub fn new(unique_id: UniqueId, task_id: impl Into<TaskId>, props: GanttProperties) -> Self {
        Self {
            unique_id,
            task_id: task_id.into(),
            level: 0,
            parent_item: None,
            child_records: Vec::new(),
            has_child_records: false,
            expanded: true,
            index: 0,
            is_delete: false,
            is_resource_group: false,
            props,
            task_data: Map::new(),
            fields: Map::new(),
        }
    }

    /// Whether this record has no children.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.child_records.is_empty()
    }

    /// Unique id of the parent, if any.
    #[inline]
    pub fn parent_unique_id(&self) -> Option<UniqueId> {
        self.parent_item.as_ref().map(|p| p.unique_id)
    }

    /// Writes a value to the two row-level locations (`task_data`, `fields`).
    ///
    /// Callers that change a schedule value also update `props`; the mapper
    /// is the only place that does all three.
    pub fn write_through(&mut self, key: &str, value: Value) {
        self.task_data.insert(key.to_string(), value.clone());
        self.fields.insert(key.to_string(), value);
    }

    /// Reads a mapped value from the caller's row.
    pub fn data(&self, key: &str) -> Option<&Value> {
        self.task_data.get(key)
    }
}
