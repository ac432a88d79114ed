//! Notifications raised by the editor.
//!
//! Hosts implement [`EditEvents`] to observe (and veto) edits. Every hook
//! has a no-op default, so an implementation only overrides what it needs.

use serde::{Deserialize, Serialize};

use crate::config::LinkResolution;
use crate::error::EditError;
use crate::persistence::ChangeSet;
use crate::predecessor::LinkViolation;

/// The kind of edit an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    Add,
    Save,
    Delete,
    Indent,
    Outdent,
    RowDragAndDrop,
    UpdateTaskId,
}

impl RequestType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Save => "save",
            Self::Delete => "delete",
            Self::Indent => "indent",
            Self::Outdent => "outdent",
            Self::RowDragAndDrop => "rowDragAndDrop",
            Self::UpdateTaskId => "updateTaskId",
        }
    }
}

/// Raised before an edit is committed. Setting `cancel` rolls it back.
///
/// For deletes it is raised while the records are only staged
/// (`is_delete` set), so the hook still sees them in the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionBeginArgs {
    pub request_type: RequestType,
    pub changes: ChangeSet,
    pub cancel: bool,
}

/// Raised after a successful commit.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionCompleteArgs {
    pub request_type: RequestType,
    pub changes: ChangeSet,
}

/// Raised when an edit violates predecessor links.
///
/// `resolution` starts as the configured validation mode; a hook may set
/// or change it. Left `None`, the edit is suspended until the caller
/// resolves or cancels it.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkValidationArgs {
    pub violations: Vec<LinkViolation>,
    pub resolution: Option<LinkResolution>,
}

/// Edit lifecycle hooks.
pub trait EditEvents: Send {
    fn action_begin(&mut self, _args: &mut ActionBeginArgs) {}

    fn action_complete(&mut self, _args: &ActionCompleteArgs) {}

    fn action_failure(&mut self, _error: &EditError) {}

    fn validate_linked_task(&mut self, _args: &mut LinkValidationArgs) {}
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEvents;

impl EditEvents for NoEvents {}
