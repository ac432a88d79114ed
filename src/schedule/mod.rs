//! Schedule recalculator.
//!
//! Keeps each task's computed schedule consistent after an edit:
//!
//! - **Joint resolution** of start, end and duration edited together
//!   ([`resolve_dates`]), plus split-task segments.
//! - **Geometry**: taskbar `left`/`width`/`progress_width` and baseline
//!   geometry as pure functions of dates.
//! - **Roll-up**: parents track the span of their children's auto fields
//!   and the duration-weighted average of their progress, walking up to
//!   the root.
//! - **Mode switch** between auto and manual scheduling, and parent drags
//!   that shift auto-scheduled descendants.
//! - **Work triangle** for resource-driven tasks ([`work`]).

mod geometry;
mod resolve;
mod rollup;
pub mod work;

pub use geometry::{update_baseline_geometry, update_geometry};
pub use resolve::{apply_segments, resolve_dates};
pub use rollup::{
    move_task, refresh_task, roll_up_ancestors, roll_up_parent, shift_by, shift_parent,
    switch_mode, weighted_progress,
};
pub use work::{apply_work_rules, WorkTrigger};
