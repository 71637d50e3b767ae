//! Store construction for composition roots.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tasklist_core::TaskDraft;
use tasklist_store_sqlite::SqliteStore;
use time::OffsetDateTime;
use tracing::info;

use crate::config::ProjectConfig;
use crate::task_store::TaskStore;

/// Welcome task inserted into a freshly created database.
#[must_use]
pub fn welcome_task() -> TaskDraft {
    TaskDraft::new("Task", "Added details").with_due(Some(OffsetDateTime::now_utc()))
}

/// Open the configured database for the project at `workdir`.
///
/// # Errors
/// Returns an error when the database cannot be opened or seeded.
pub fn open_store(config: &ProjectConfig, workdir: &Path) -> Result<Arc<SqliteStore>> {
    open_store_at(config, &config.storage.database_path(workdir))
}

/// Open the database at an explicit `path`, seeding it when new.
///
/// # Errors
/// Returns an error when the database cannot be opened or seeded.
pub fn open_store_at(config: &ProjectConfig, path: &Path) -> Result<Arc<SqliteStore>> {
    let store = SqliteStore::open(path)
        .with_context(|| format!("failed to open task database {}", path.display()))?;
    seed_if_fresh(config, &store, store.is_fresh())?;
    Ok(Arc::new(store))
}

/// Insert the welcome task when `fresh` and seeding is enabled.
///
/// # Errors
/// Returns an error when the insert fails.
pub fn seed_if_fresh<S: TaskStore>(config: &ProjectConfig, store: &S, fresh: bool) -> Result<()> {
    if !fresh || !config.storage.seed_on_create {
        return Ok(());
    }
    let id = store
        .insert(&welcome_task())
        .map_err(Into::<anyhow::Error>::into)
        .context("failed to seed new task database")?;
    info!(%id, "Seeded new task database");
    Ok(())
}
