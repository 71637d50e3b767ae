//! Application layer for tasklist.
//!
//! [`TaskListController`] queues mutations against a [`TaskStore`] and
//! publishes ordered snapshots through a [`ChangeNotifier`]. Configuration
//! and store bootstrapping live here so every front end shares them.

pub mod bootstrap;
/// Project configuration loaded from `.tasklist/config.toml`.
pub mod config;
pub mod controller;
pub mod memory_store;
pub mod notifier;
pub mod reminder;
pub mod task_store;

// Re-exports for convenience
pub use bootstrap::{open_store, open_store_at, seed_if_fresh, welcome_task};
pub use config::{DisplayConfig, ProjectConfig, StorageConfig};
pub use controller::{FailureNotice, Operation, Pending, Submission, TaskListController, TaskListError};
pub use memory_store::MemoryStore;
pub use notifier::{ChangeNotifier, LiveTasks, Snapshot, SnapshotObserver, Subscription};
pub use reminder::{ReminderScheduler, TracingReminders};
pub use task_store::TaskStore;
