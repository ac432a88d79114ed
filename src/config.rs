//! Engine settings.
//!
//! [`GanttSettings`] gathers everything the edit engine needs to know about
//! the host grid: which row keys carry which schedule values, the view
//! mode, scheduling defaults, and how link violations are resolved. All
//! structs deserialize with defaults so a partial JSON document is enough.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::{DurationUnit, Resource, TaskType, WorkingCalendar};

/// How rows are grouped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewType {
    /// Tasks form their own hierarchy.
    #[default]
    ProjectView,
    /// Tasks are grouped under resource rows; a task with several
    /// resources appears once per resource.
    ResourceView,
}

/// Resolution applied when an edit violates a predecessor link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkResolution {
    /// Keep the edit and rewrite the link offset to match it.
    PreserveLinkWithEditing,
    /// Keep the edit and drop the violated links.
    RemoveLink,
    /// Move the task back to the earliest date its links allow.
    RespectLink,
}

/// Editor type of a custom column (drives value coercion).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditType {
    #[default]
    String,
    Numeric,
    Boolean,
    Date,
    DateTime,
    DropDown,
}

/// A caller-defined column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub field: String,
    #[serde(default)]
    pub edit_type: EditType,
}

impl ColumnDef {
    pub fn new(field: impl Into<String>, edit_type: EditType) -> Self {
        Self {
            field: field.into(),
            edit_type,
        }
    }
}

/// Row keys of the schedule values.
///
/// `None` disables a mapping; the engine then neither reads nor writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskFields {
    pub id: String,
    pub name: String,
    pub start_date: String,
    pub end_date: Option<String>,
    pub duration: Option<String>,
    pub duration_unit: Option<String>,
    pub progress: Option<String>,
    pub parent_id: Option<String>,
    pub dependency: Option<String>,
    pub resource_info: Option<String>,
    pub notes: Option<String>,
    pub baseline_start_date: Option<String>,
    pub baseline_end_date: Option<String>,
    pub milestone: Option<String>,
    pub manual: Option<String>,
    pub work: Option<String>,
    pub task_type: Option<String>,
    pub segments: Option<String>,
    pub indicators: Option<String>,
    pub expand_state: Option<String>,
}

impl Default for TaskFields {
    fn default() -> Self {
        Self {
            id: "TaskID".into(),
            name: "TaskName".into(),
            start_date: "StartDate".into(),
            end_date: Some("EndDate".into()),
            duration: Some("Duration".into()),
            duration_unit: Some("DurationUnit".into()),
            progress: Some("Progress".into()),
            parent_id: Some("ParentID".into()),
            dependency: Some("Predecessor".into()),
            resource_info: Some("Resources".into()),
            notes: Some("Notes".into()),
            baseline_start_date: Some("BaselineStartDate".into()),
            baseline_end_date: Some("BaselineEndDate".into()),
            milestone: Some("Milestone".into()),
            manual: Some("IsManual".into()),
            work: Some("Work".into()),
            task_type: Some("TaskType".into()),
            segments: Some("Segments".into()),
            indicators: Some("Indicators".into()),
            expand_state: Some("IsExpanded".into()),
        }
    }
}

/// Keys of a resource object inside the resource cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceFields {
    pub id: String,
    pub name: String,
    pub unit: String,
}

impl Default for ResourceFields {
    fn default() -> Self {
        Self {
            id: "resourceId".into(),
            name: "resourceName".into(),
            unit: "resourceUnit".into(),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GanttSettings {
    pub task_fields: TaskFields,
    pub resource_fields: ResourceFields,
    /// Resource collection (required for resource view).
    pub resources: Vec<Resource>,
    /// Custom columns.
    pub columns: Vec<ColumnDef>,
    pub view_type: ViewType,
    pub duration_unit: DurationUnit,
    pub work_unit: DurationUnit,
    pub task_type: TaskType,
    /// Timeline origin; the earliest task start when unset.
    pub project_start_date: Option<NaiveDateTime>,
    /// Whether tasks may lack dates.
    pub allow_unscheduled_tasks: bool,
    /// Whether predecessor links are validated and propagated.
    pub enable_predecessor_validation: bool,
    /// Whether manual successors move with their predecessors.
    pub validate_manual_tasks_on_linking: bool,
    /// `None` asks the caller on every violation.
    pub validation_mode: Option<LinkResolution>,
    /// Timeline pixels per calendar day.
    pub day_width: f64,
    /// Duration given to new tasks without an end date.
    pub default_duration: f64,
    /// Label of the synthetic resource-view group for unassigned tasks.
    pub unassigned_task_label: String,
    pub calendar: WorkingCalendar,
}

impl Default for GanttSettings {
    fn default() -> Self {
        Self {
            task_fields: TaskFields::default(),
            resource_fields: ResourceFields::default(),
            resources: Vec::new(),
            columns: Vec::new(),
            view_type: ViewType::ProjectView,
            duration_unit: DurationUnit::Day,
            work_unit: DurationUnit::Hour,
            task_type: TaskType::FixedUnit,
            project_start_date: None,
            allow_unscheduled_tasks: false,
            enable_predecessor_validation: true,
            validate_manual_tasks_on_linking: false,
            validation_mode: Some(LinkResolution::PreserveLinkWithEditing),
            day_width: 33.0,
            default_duration: 5.0,
            unassigned_task_label: "Unassigned Task".into(),
            calendar: WorkingCalendar::default(),
        }
    }
}

impl GanttSettings {
    /// Loads settings from a JSON document; missing keys take defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Switches to resource view with the given resources.
    pub fn with_resource_view(mut self, resources: Vec<Resource>) -> Self {
        self.view_type = ViewType::ResourceView;
        self.resources = resources;
        self
    }

    /// Sets the link violation policy (`None` = ask).
    pub fn with_validation_mode(mut self, mode: Option<LinkResolution>) -> Self {
        self.validation_mode = mode;
        self
    }

    /// Sets the working calendar.
    pub fn with_calendar(mut self, calendar: WorkingCalendar) -> Self {
        self.calendar = calendar;
        self
    }

    /// Sets the timeline origin.
    pub fn with_project_start(mut self, start: NaiveDateTime) -> Self {
        self.project_start_date = Some(start);
        self
    }

    /// Adds a custom column.
    pub fn with_column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    #[inline]
    pub fn is_resource_view(&self) -> bool {
        self.view_type == ViewType::ResourceView
    }

    /// Edit type of a custom column, if declared.
    pub fn column_edit_type(&self, field: &str) -> Option<EditType> {
        self.columns
            .iter()
            .find(|c| c.field == field)
            .map(|c| c.edit_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = GanttSettings::default();
        assert_eq!(s.task_fields.id, "TaskID");
        assert_eq!(s.validation_mode, Some(LinkResolution::PreserveLinkWithEditing));
        assert_eq!(s.default_duration, 5.0);
        assert!(!s.is_resource_view());
    }

    #[test]
    fn test_partial_json() {
        let s = GanttSettings::from_json(
            r#"{
                "view_type": "ResourceView",
                "validation_mode": null,
                "task_fields": { "id": "id", "dependency": null },
                "calendar": { "include_weekends": false }
            }"#,
        )
        .unwrap();
        assert!(s.is_resource_view());
        assert_eq!(s.validation_mode, None);
        assert_eq!(s.task_fields.id, "id");
        assert_eq!(s.task_fields.name, "TaskName");
        assert_eq!(s.task_fields.dependency, None);
        assert!(!s.calendar.include_weekends);
        assert_eq!(s.calendar.day_start_minute, 480);
    }

    #[test]
    fn test_column_edit_type() {
        let s = GanttSettings::default().with_column(ColumnDef::new("Due", EditType::Date));
        assert_eq!(s.column_edit_type("Due"), Some(EditType::Date));
        assert_eq!(s.column_edit_type("Other"), None);
    }
}
