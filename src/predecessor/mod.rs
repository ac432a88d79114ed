//! Predecessor graph engine.
//!
//! Edges are keyed by task id and stored on both endpoints; every mutation
//! here updates both sides and rebuilds the successor's display string
//! before returning.
//!
//! # Link semantics
//!
//! The start a link requires of its successor, with the offset applied as
//! working time (positive = lag, negative = lead):
//!
//! | type | anchor | successor |
//! |---|---|---|
//! | FS | predecessor end | start no earlier than the anchor |
//! | SS | predecessor start | start no earlier than the anchor |
//! | FF | predecessor end | end no earlier than the anchor |
//! | SF | predecessor start | end no earlier than the anchor |
//!
//! A link-driven task (auto-scheduled leaf, or manual with
//! `validate_manual_tasks_on_linking`) sits at the latest start over its
//! incoming links. A direct edit that moves it earlier is a
//! [`LinkViolation`]; moving it later tightens the binding links instead.
//!
//! # Reference
//! Kahn (1962), "Topological sorting of large networks", CACM 5(11)

mod links;
mod propagate;
mod validate;

pub use links::{
    add_edge, detach_all, edges_of, incoming, outgoing, rebuild_name, remove_edge,
    rename_endpoint, set_dependencies, set_offset,
};
pub use propagate::propagate;
pub use validate::{
    apply_offset, detect_violation, earliest_allowed, is_link_driven, offset_between,
    required_start, requirements, resolve_violation, retighten, snap_to_links, LinkViolation,
    Requirement, ViolationType,
};
