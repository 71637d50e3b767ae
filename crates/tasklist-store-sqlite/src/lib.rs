//! SQLite-backed storage implementation for tasklist.

mod error;

pub use error::SqliteStoreError;

use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tasklist_core::{Task, TaskDraft, TaskId};
use time::OffsetDateTime;
use tracing::{debug, info};

const SCHEMA_VERSION: i64 = 1;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL DEFAULT '',
    details TEXT NOT NULL DEFAULT '',
    due_ms INTEGER
);
CREATE INDEX IF NOT EXISTS tasks_due_idx ON tasks(due_ms, id);
";

/// Rows are returned undated first, then by ascending due date and id.
const SELECT_ORDERED: &str = "SELECT id, title, details, due_ms FROM tasks ORDER BY due_ms ASC, id ASC";

type Result<T, E = SqliteStoreError> = std::result::Result<T, E>;

/// Task table stored in a single SQLite database file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
    fresh: bool,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, creating parent directories.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created, the file cannot be
    /// opened as a SQLite database, or the schema cannot be installed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path).map_err(|source| SqliteStoreError::Open {
            path: path.clone(),
            source,
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let fresh = install_schema(&conn)?;
        info!(path = %path.display(), fresh, "Opened task database");
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path),
            fresh,
        })
    }

    /// Open a private database that lives only as long as this store.
    ///
    /// # Errors
    /// Returns an error if SQLite cannot allocate the database or install the schema.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let fresh = install_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
            fresh,
        })
    }

    /// Location of the database file, `None` for in-memory stores.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// True when this open created the schema, i.e. the database was new.
    #[must_use]
    pub const fn is_fresh(&self) -> bool {
        self.fresh
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| SqliteStoreError::LockError)
    }

    /// Insert a new row and return its assigned id.
    ///
    /// # Errors
    /// Returns an error if the due date is out of range or the insert fails.
    pub fn insert(&self, draft: &TaskDraft) -> Result<TaskId> {
        let due_ms = draft.due.map(to_millis).transpose()?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO tasks(title, details, due_ms) VALUES (?1, ?2, ?3)",
            params![draft.title, draft.details, due_ms],
        )?;
        let id = TaskId(conn.last_insert_rowid());
        drop(conn);
        info!(%id, "Inserted task");
        Ok(id)
    }

    /// Replace every mutable field of the row matching `task.id`.
    ///
    /// Returns `false` without error when no such row exists.
    ///
    /// # Errors
    /// Returns an error if the due date is out of range or the update fails.
    pub fn update(&self, task: &Task) -> Result<bool> {
        let due_ms = task.due.map(to_millis).transpose()?;
        let changed = self.conn()?.execute(
            "UPDATE tasks SET title = ?1, details = ?2, due_ms = ?3 WHERE id = ?4",
            params![task.title, task.details, due_ms, task.id.get()],
        )?;
        if changed == 0 {
            debug!(id = %task.id, "Update matched no task");
        } else {
            info!(id = %task.id, "Updated task");
        }
        Ok(changed > 0)
    }

    /// Delete the row matching `id`; `false` when it did not exist.
    ///
    /// # Errors
    /// Returns an error if the delete statement fails.
    pub fn delete(&self, id: TaskId) -> Result<bool> {
        let changed = self
            .conn()?
            .execute("DELETE FROM tasks WHERE id = ?1", params![id.get()])?;
        if changed == 0 {
            debug!(%id, "Delete matched no task");
        } else {
            info!(%id, "Deleted task");
        }
        Ok(changed > 0)
    }

    /// Remove every row; the table stays in place.
    ///
    /// # Errors
    /// Returns an error if the delete statement fails.
    pub fn delete_all(&self) -> Result<usize> {
        let removed = self.conn()?.execute("DELETE FROM tasks", [])?;
        info!(removed, "Deleted all tasks");
        Ok(removed)
    }

    /// Load every task in display order.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored due date is out of range.
    pub fn list_ordered(&self) -> Result<Vec<Task>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(SELECT_ORDERED)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);
        drop(conn);
        rows.into_iter().map(row_to_task).collect()
    }

    /// Look up a single task.
    ///
    /// # Errors
    /// Returns an error if the query fails or the stored due date is out of range.
    pub fn get(&self, id: TaskId) -> Result<Option<Task>> {
        let row = self
            .conn()?
            .query_row(
                "SELECT id, title, details, due_ms FROM tasks WHERE id = ?1",
                params![id.get()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<i64>>(3)?,
                    ))
                },
            )
            .optional()?;
        row.map(row_to_task).transpose()
    }
}

/// Install the schema when the database has never been initialized.
///
/// Returns `true` when the schema was created by this call.
fn install_schema(conn: &Connection) -> Result<bool> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    conn.execute_batch(SCHEMA)?;
    if version >= SCHEMA_VERSION {
        return Ok(false);
    }
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(true)
}

fn row_to_task((id, title, details, due_ms): (i64, String, String, Option<i64>)) -> Result<Task> {
    Ok(Task {
        id: TaskId(id),
        title,
        details,
        due: due_ms.map(from_millis).transpose()?,
    })
}

fn to_millis(due: OffsetDateTime) -> Result<i64> {
    i64::try_from(due.unix_timestamp_nanos().div_euclid(1_000_000))
        .map_err(|_| SqliteStoreError::TimestampOutOfRange(due.to_string()))
}

fn from_millis(ms: i64) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .map_err(|_| SqliteStoreError::TimestampOutOfRange(format!("{ms} ms")))
}
