//! Edit-time scheduling engine for Gantt task trees.
//!
//! Keeps a hierarchical task list, its computed schedule and its
//! predecessor links consistent while a user edits it, and commits each
//! edit as one change-set through an optional persistence adapter.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `TaskRecord`, `GanttProperties`,
//!   `PredecessorEdge`, `ResourceRef`, `WorkingCalendar`
//! - **`store`**: The task store (tree, flat list, id index)
//! - **`mapper`**: Field mapping between raw rows and task properties
//! - **`schedule`**: Date resolution, work rules, roll-up, taskbar geometry
//! - **`predecessor`**: Link graph, violation handling, propagation
//! - **`tree`**: Loading, add, delete, drag-and-drop, indent/outdent,
//!   id renames, resource-view grouping
//! - **`persistence`**: Change-sets, edit sessions, adapters
//! - **`editor`**: `GanttEditor`, the public edit surface
//! - **`validation`**: At-rest invariant checks (tree, links, cycles)
//!
//! # Architecture
//!
//! Every public operation on [`editor::GanttEditor`] snapshots the store,
//! mutates it synchronously, settles links and roll-ups, raises the
//! lifecycle hooks from [`events`], and only then awaits the adapter. A
//! failed or cancelled edit restores the snapshot.
//!
//! # References
//!
//! - Kelley & Walker (1959), "Critical-Path Planning and Scheduling"
//! - PMI (2021), "PMBOK Guide", 7th ed., §2.4 (Schedule network analysis)
//! - Kahn (1962), "Topological sorting of large networks"

pub mod config;
pub mod context;
pub mod dates;
pub mod editor;
pub mod error;
pub mod events;
pub mod mapper;
pub mod models;
pub mod persistence;
pub mod predecessor;
pub mod schedule;
pub mod store;
pub mod tree;
pub mod validation;

pub use config::{GanttSettings, LinkResolution};
pub use editor::{EditOutcome, GanttEditor};
pub use error::{AdapterError, EditError};

#[cfg(test)]
mod test_support;
