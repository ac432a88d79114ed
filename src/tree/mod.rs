//! Tree mutation engine.
//!
//! Structural edits of the task tree: loading rows, adding, deleting,
//! moving (indent and outdent included), renaming task ids, and the
//! resource-view duplication of tasks under resource group rows.
//!
//! Every function leaves the flat list, the tree and the id index of the
//! store pairwise consistent, and keeps predecessor edges mirrored:
//! removed tasks take their edges with them, and a leaf that gains
//! children stops carrying links.

mod add;
mod delete;
mod load;
mod moves;
mod rename;
mod resource_view;

pub use add::{add_task, next_task_id, RowPosition};
pub use delete::{remove_staged, stage_delete};
pub use load::load;
pub use moves::{indent, move_row, outdent, DropPosition};
pub use rename::update_task_id;
pub use resource_view::{
    apply_resource_diff, ensure_group, group_id, sync_clones, unassigned_group_id,
};
