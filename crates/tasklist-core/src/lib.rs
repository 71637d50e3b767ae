//! Domain types for tasklist: task records, drafts, ordering and list reconciliation.

/// Identifier types.
pub mod id;
/// Edit scripts between two ordered task snapshots.
pub mod reconcile;

pub use crate::id::TaskId;
pub use crate::reconcile::{ApplyError, Edit, EditScript, ListUpdates, reconcile};

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;
use time::OffsetDateTime;

/// A persisted task record.
///
/// `PartialEq` is content equality: identity plus every mutable field.
/// Use [`Task::same_identity`] when only the row matters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Store-assigned identifier.
    pub id: TaskId,
    /// Short title, may be empty.
    pub title: String,
    /// Free-form details, may be empty.
    pub details: String,
    /// Optional reminder date.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub due: Option<OffsetDateTime>,
}

impl Task {
    /// Assemble a task from an id and a draft.
    #[must_use]
    pub fn from_draft(id: TaskId, draft: TaskDraft) -> Self {
        let TaskDraft { title, details, due } = draft;
        Self {
            id,
            title,
            details,
            due,
        }
    }

    /// True when both values refer to the same row.
    #[must_use]
    pub fn same_identity(&self, other: &Self) -> bool {
        self.id == other.id
    }

    /// True when both values refer to the same row and carry identical fields.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self == other
    }

    /// The mutable fields of this task as a draft.
    #[must_use]
    pub fn to_draft(&self) -> TaskDraft {
        TaskDraft {
            title: self.title.clone(),
            details: self.details.clone(),
            due: self.due,
        }
    }
}

/// Total order used by every snapshot: ascending `due`, tasks without a
/// due date first, ties broken by ascending id.
#[must_use]
pub fn due_order(a: &Task, b: &Task) -> Ordering {
    a.due.cmp(&b.due).then_with(|| a.id.cmp(&b.id))
}

/// Truncate `at` to whole milliseconds, the precision every store keeps.
///
/// Always rounds toward the past, also before the Unix epoch.
#[must_use]
pub fn to_stored_precision(at: OffsetDateTime) -> OffsetDateTime {
    let millis = at.nanosecond() / 1_000_000;
    at.replace_nanosecond(millis * 1_000_000).unwrap_or(at)
}

/// Sort tasks in place with [`due_order`].
pub fn sort_by_due(tasks: &mut [Task]) {
    tasks.sort_by(due_order);
}

/// Task fields supplied by a caller before the store assigns an id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    /// Short title, may be empty.
    pub title: String,
    /// Free-form details, may be empty.
    pub details: String,
    /// Optional reminder date.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub due: Option<OffsetDateTime>,
}

impl TaskDraft {
    /// Draft without a due date.
    pub fn new(title: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            details: details.into(),
            due: None,
        }
    }

    /// Set or clear the due date, truncated to stored precision.
    #[must_use]
    pub fn with_due(mut self, due: Option<OffsetDateTime>) -> Self {
        self.due = due.map(to_stored_precision);
        self
    }

    /// True when there is nothing worth saving.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.title.is_empty() && self.details.is_empty()
    }

    /// Reject drafts whose title and details are both empty.
    ///
    /// An accepted draft has its due date truncated to stored precision.
    ///
    /// # Errors
    /// Returns [`DraftError::Blank`] when there is nothing to save.
    pub fn validate(mut self) -> Result<Self, DraftError> {
        if self.is_blank() {
            return Err(DraftError::Blank);
        }
        self.due = self.due.map(to_stored_precision);
        Ok(self)
    }
}

/// Reasons a draft never reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DraftError {
    /// Title and details are both empty.
    #[error("title and details are both empty")]
    Blank,
}
