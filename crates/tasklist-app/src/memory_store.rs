//! In-process task store for tests and throwaway sessions.

use anyhow::{Result, anyhow};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tasklist_core::{Task, TaskDraft, TaskId, sort_by_due, to_stored_precision};

use crate::task_store::TaskStore;

/// Volatile [`TaskStore`] keeping rows in a mutex-guarded map.
///
/// Due dates are kept at millisecond precision like the SQLite store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    last_id: i64,
    rows: BTreeMap<TaskId, Task>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>> {
        self.inner.lock().map_err(|_| anyhow!("Failed to lock memory store"))
    }
}

impl TaskStore for MemoryStore {
    type Error = anyhow::Error;

    fn insert(&self, draft: &TaskDraft) -> Result<TaskId> {
        let mut inner = self.lock()?;
        inner.last_id += 1;
        let id = TaskId(inner.last_id);
        inner.rows.insert(id, stored(Task::from_draft(id, draft.clone())));
        drop(inner);
        Ok(id)
    }

    fn update(&self, task: &Task) -> Result<bool> {
        let mut inner = self.lock()?;
        Ok(inner.rows.get_mut(&task.id).is_some_and(|row| {
            *row = stored(task.clone());
            true
        }))
    }

    fn delete(&self, id: TaskId) -> Result<bool> {
        Ok(self.lock()?.rows.remove(&id).is_some())
    }

    fn delete_all(&self) -> Result<usize> {
        let mut inner = self.lock()?;
        let removed = inner.rows.len();
        inner.rows.clear();
        drop(inner);
        Ok(removed)
    }

    fn list_ordered(&self) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self.lock()?.rows.values().cloned().collect();
        sort_by_due(&mut tasks);
        Ok(tasks)
    }

    fn get(&self, id: TaskId) -> Result<Option<Task>> {
        Ok(self.lock()?.rows.get(&id).cloned())
    }
}

fn stored(mut task: Task) -> Task {
    task.due = task.due.map(to_stored_precision);
    task
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn ids_are_not_reused_after_delete_all() -> Result<()> {
        let store = MemoryStore::new();
        let first = store.insert(&TaskDraft::new("a", ""))?;
        assert_eq!(store.delete_all()?, 1);
        let second = store.insert(&TaskDraft::new("b", ""))?;
        assert!(second > first);
        assert_eq!(store.list_ordered()?.len(), 1);
        Ok(())
    }

    #[test]
    fn ordering_matches_sqlite_store() -> Result<()> {
        let store = MemoryStore::new();
        let dated = store.insert(&TaskDraft::new("dated", "").with_due(Some(datetime!(2024-02-02 0:00 UTC))))?;
        let undated = store.insert(&TaskDraft::new("undated", ""))?;
        let ids: Vec<TaskId> = store.list_ordered()?.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![undated, dated]);
        Ok(())
    }

    #[test]
    fn due_is_kept_at_millisecond_precision() -> Result<()> {
        let store = MemoryStore::new();
        let draft = TaskDraft {
            due: Some(datetime!(1969-12-31 23:59:59.9999 UTC)),
            ..TaskDraft::new("precise", "")
        };
        let id = store.insert(&draft)?;
        let stored = store.get(id)?.map(|task| task.due);
        assert_eq!(stored, Some(Some(datetime!(1969-12-31 23:59:59.999 UTC))));
        Ok(())
    }

    #[test]
    fn update_of_missing_row_reports_false() -> Result<()> {
        let store = MemoryStore::new();
        let ghost = Task::from_draft(TaskId(12), TaskDraft::new("ghost", ""));
        assert!(!store.update(&ghost)?);
        assert!(!store.delete(ghost.id)?);
        assert_eq!(store.get(ghost.id)?, None);
        Ok(())
    }
}
