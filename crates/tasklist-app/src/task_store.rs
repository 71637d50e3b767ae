//! Storage abstraction consumed by the task list controller.

use anyhow::Error;
use tasklist_core::{Task, TaskDraft, TaskId};
use tasklist_store_sqlite::{SqliteStore, SqliteStoreError};

/// Minimal storage contract required by [`TaskListController`](crate::TaskListController).
///
/// Calls block; the controller runs them on Tokio's blocking pool one at a time.
pub trait TaskStore: Send + Sync {
    /// Error type bubbled up from the backing store.
    type Error: Into<Error> + Send;

    /// Persist a new task and return the id assigned to it.
    ///
    /// # Errors
    /// Returns a store-specific error when the row cannot be written.
    fn insert(&self, draft: &TaskDraft) -> Result<TaskId, Self::Error>;

    /// Replace every mutable field of the row matching `task.id`.
    ///
    /// Returns `false` when no row matched; that is not an error.
    ///
    /// # Errors
    /// Returns a store-specific error when the row cannot be written.
    fn update(&self, task: &Task) -> Result<bool, Self::Error>;

    /// Delete the row matching `id`, returning whether one existed.
    ///
    /// # Errors
    /// Returns a store-specific error when the delete fails.
    fn delete(&self, id: TaskId) -> Result<bool, Self::Error>;

    /// Delete every row, returning how many were removed.
    ///
    /// # Errors
    /// Returns a store-specific error when the delete fails.
    fn delete_all(&self) -> Result<usize, Self::Error>;

    /// Every task in display order (see [`tasklist_core::due_order`]).
    ///
    /// # Errors
    /// Returns a store-specific error when the query fails.
    fn list_ordered(&self) -> Result<Vec<Task>, Self::Error>;

    /// Look up a single task.
    ///
    /// The default implementation scans [`list_ordered`](Self::list_ordered).
    ///
    /// # Errors
    /// Returns a store-specific error when the query fails.
    fn get(&self, id: TaskId) -> Result<Option<Task>, Self::Error> {
        Ok(self.list_ordered()?.into_iter().find(|task| task.id == id))
    }
}

impl TaskStore for SqliteStore {
    type Error = SqliteStoreError;

    fn insert(&self, draft: &TaskDraft) -> Result<TaskId, Self::Error> {
        Self::insert(self, draft)
    }

    fn update(&self, task: &Task) -> Result<bool, Self::Error> {
        Self::update(self, task)
    }

    fn delete(&self, id: TaskId) -> Result<bool, Self::Error> {
        Self::delete(self, id)
    }

    fn delete_all(&self) -> Result<usize, Self::Error> {
        Self::delete_all(self)
    }

    fn list_ordered(&self) -> Result<Vec<Task>, Self::Error> {
        Self::list_ordered(self)
    }

    fn get(&self, id: TaskId) -> Result<Option<Task>, Self::Error> {
        Self::get(self, id)
    }
}
