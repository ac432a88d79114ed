//! Gantt domain models.
//!
//! Plain data types shared by every engine component: task records and
//! their computed schedule, resources, predecessor edges, and the
//! working-time calendar.
//!
//! # Field Mappings
//!
//! | u-gantt | Grid row | Schedule |
//! |---------|----------|----------|
//! | `TaskRecord` | data row | tree node |
//! | `GanttProperties` | mapped columns | start/end/duration/progress |
//! | `PredecessorEdge` | dependency cell | link |
//! | `ResourceRef` | resource cell | assignment |

mod calendar;
mod predecessor;
mod resource;
mod task;

pub use calendar::WorkingCalendar;
pub use predecessor::{predecessors_name, LinkType, PredecessorEdge};
pub use resource::{total_units, Resource, ResourceId, ResourceRef};
pub use task::{
    DurationUnit, GanttProperties, ParentRef, TaskId, TaskRecord, TaskSegment, TaskType, UniqueId,
};
