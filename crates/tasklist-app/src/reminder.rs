//! One-shot reminder boundary.

use tasklist_core::{Task, TaskId};
use time::OffsetDateTime;
use tracing::info;

/// Collaborator that fires a single notification for a task at a given time.
///
/// Delivery (alarms, desktop notifications) is up to the implementation.
pub trait ReminderScheduler: Send + Sync {
    /// Arrange one notification for `task` at `at`, replacing any earlier one.
    fn schedule_once(&self, task: &Task, at: OffsetDateTime);

    /// Drop the pending reminder for `id`, if any.
    fn cancel(&self, id: TaskId);

    /// Drop every pending reminder.
    fn cancel_all(&self);
}

/// Scheduler that only records requests in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReminders;

impl ReminderScheduler for TracingReminders {
    fn schedule_once(&self, task: &Task, at: OffsetDateTime) {
        info!(id = %task.id, title = %task.title, %at, "Reminder scheduled");
    }

    fn cancel(&self, id: TaskId) {
        info!(%id, "Reminder cancelled");
    }

    fn cancel_all(&self) {
        info!("All reminders cancelled");
    }
}
