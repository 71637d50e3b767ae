//! Task list façade: queued mutations, live snapshots and failure notices.

use anyhow::anyhow;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tasklist_core::{Task, TaskDraft, TaskId};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::notifier::{ChangeNotifier, LiveTasks, Snapshot, SnapshotObserver, Subscription};
use crate::reminder::{ReminderScheduler, TracingReminders};
use crate::task_store::TaskStore;

/// Failure notices kept for slow receivers before they start lagging.
const FAILURE_CAPACITY: usize = 16;

/// Errors surfaced through [`Pending`] results.
#[derive(Debug, Error)]
pub enum TaskListError {
    /// The store call failed. For a mutation nothing was persisted; for a
    /// refresh the published snapshot is stale.
    #[error("storage unavailable: {0:#}")]
    StorageUnavailable(#[from] anyhow::Error),
    /// The worker exited before answering.
    #[error("task list worker has stopped")]
    WorkerStopped,
}

/// Mutating operations, named in failure notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// New task.
    Create,
    /// Field replacement on an existing task.
    Edit,
    /// Single deletion.
    Remove,
    /// Deletion of every task.
    RemoveAll,
    /// Re-query and publication, on request or after a mutation.
    Refresh,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Remove => "remove",
            Self::RemoveAll => "remove all",
            Self::Refresh => "refresh",
        })
    }
}

/// Broadcast when a queued operation fails, so a surface can say "not saved".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureNotice {
    /// Operation that failed.
    pub operation: Operation,
    /// Rendered error chain.
    pub message: String,
}

impl fmt::Display for FailureNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.operation, self.message)
    }
}

type Reply<T> = oneshot::Sender<Result<T, TaskListError>>;

/// Outcome of a queued operation.
///
/// Await it to learn the result; dropping it leaves the operation queued.
#[derive(Debug)]
#[must_use = "await the result, or drop it explicitly to leave the operation running"]
pub struct Pending<T> {
    rx: oneshot::Receiver<Result<T, TaskListError>>,
}

impl<T> Future for Pending<T> {
    type Output = Result<T, TaskListError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(TaskListError::WorkerStopped)))
    }
}

/// Result of submitting a draft for create or edit.
#[derive(Debug)]
#[must_use = "a blank draft is reported here rather than as an error"]
pub enum Submission<T> {
    /// Draft accepted and queued.
    Queued(Pending<T>),
    /// Title and details were both empty; nothing was queued.
    NothingToSave,
}

impl<T: Send> Submission<T> {
    /// True when the draft was queued.
    #[must_use]
    pub const fn is_queued(&self) -> bool {
        matches!(self, Self::Queued(_))
    }

    /// Await the queued operation, `None` when nothing was queued.
    ///
    /// # Errors
    /// Propagates the operation's [`TaskListError`].
    pub async fn wait(self) -> Result<Option<T>, TaskListError> {
        match self {
            Self::Queued(pending) => pending.await.map(Some),
            Self::NothingToSave => Ok(None),
        }
    }
}

enum Job {
    Create(TaskDraft, Reply<TaskId>),
    Edit(Task, Reply<bool>),
    Remove(TaskId, Reply<bool>),
    RemoveAll(Reply<usize>),
    Refresh(Reply<()>),
}

/// Entry point used by display surfaces.
///
/// Mutations are queued and executed in submission order by a single worker;
/// each one is followed by a fresh [`Snapshot`] of the ordered list.
pub struct TaskListController {
    queue: mpsc::UnboundedSender<Job>,
    notifier: Arc<ChangeNotifier>,
    failures: broadcast::Sender<FailureNotice>,
    worker: JoinHandle<()>,
}

impl fmt::Debug for TaskListController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskListController")
            .field("notifier", &self.notifier)
            .field("worker_finished", &self.worker.is_finished())
            .finish_non_exhaustive()
    }
}

impl TaskListController {
    /// Start a controller over `store` with log-only reminders.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn spawn<S>(store: Arc<S>) -> Self
    where
        S: TaskStore + 'static,
    {
        Self::spawn_with_reminders(store, Arc::new(TracingReminders))
    }

    /// Start a controller over `store` using `reminders` for due dates.
    ///
    /// An initial refresh is queued so observers get a first snapshot.
    pub fn spawn_with_reminders<S>(store: Arc<S>, reminders: Arc<dyn ReminderScheduler>) -> Self
    where
        S: TaskStore + 'static,
    {
        let (queue, jobs) = mpsc::unbounded_channel();
        let notifier = Arc::new(ChangeNotifier::new());
        let (failures, _) = broadcast::channel(FAILURE_CAPACITY);
        let worker = Worker {
            store,
            notifier: Arc::clone(&notifier),
            failures: failures.clone(),
            reminders,
        };
        let controller = Self {
            queue,
            notifier,
            failures,
            worker: tokio::spawn(worker.run(jobs)),
        };
        drop(controller.refresh());
        controller
    }

    /// Live view of the ordered task list.
    #[must_use]
    pub fn observe_all(&self) -> LiveTasks {
        self.notifier.live()
    }

    /// Attach a push observer; see [`ChangeNotifier::subscribe`].
    pub fn subscribe<O>(&self, observer: O) -> Subscription
    where
        O: SnapshotObserver + 'static,
    {
        self.notifier.subscribe(observer)
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn latest(&self) -> Option<Snapshot> {
        self.notifier.latest()
    }

    /// Receiver for failure notices raised after this call.
    #[must_use]
    pub fn failures(&self) -> broadcast::Receiver<FailureNotice> {
        self.failures.subscribe()
    }

    /// Queue a new task. Blank drafts are not queued.
    pub fn create(
        &self,
        title: impl Into<String>,
        details: impl Into<String>,
        due: Option<OffsetDateTime>,
    ) -> Submission<TaskId> {
        match TaskDraft::new(title, details).with_due(due).validate() {
            Ok(draft) => Submission::Queued(self.enqueue(|reply| Job::Create(draft, reply))),
            Err(err) => {
                debug!(%err, "Create skipped");
                Submission::NothingToSave
            }
        }
    }

    /// Queue a replacement of every field of task `id`.
    ///
    /// Resolves to `false` when no such task exists.
    pub fn edit(
        &self,
        id: TaskId,
        title: impl Into<String>,
        details: impl Into<String>,
        due: Option<OffsetDateTime>,
    ) -> Submission<bool> {
        match TaskDraft::new(title, details).with_due(due).validate() {
            Ok(draft) => {
                let task = Task::from_draft(id, draft);
                Submission::Queued(self.enqueue(|reply| Job::Edit(task, reply)))
            }
            Err(err) => {
                debug!(%id, %err, "Edit skipped");
                Submission::NothingToSave
            }
        }
    }

    /// Queue deletion of `task`. Deleting a missing task resolves to `false`.
    pub fn remove(&self, task: &Task) -> Pending<bool> {
        let id = task.id;
        self.enqueue(|reply| Job::Remove(id, reply))
    }

    /// Queue deletion of every task; resolves to the number removed.
    pub fn remove_all(&self) -> Pending<usize> {
        self.enqueue(Job::RemoveAll)
    }

    /// Queue a re-query and publication without mutating anything.
    pub fn refresh(&self) -> Pending<()> {
        self.enqueue(Job::Refresh)
    }

    /// Close the queue and wait for the worker to drain it.
    pub async fn shutdown(self) {
        let Self { queue, worker, .. } = self;
        drop(queue);
        if let Err(err) = worker.await {
            warn!(%err, "Task list worker ended abnormally");
        }
    }

    fn enqueue<T>(&self, job: impl FnOnce(Reply<T>) -> Job) -> Pending<T> {
        let (reply, rx) = oneshot::channel();
        if self.queue.send(job(reply)).is_err() {
            warn!("Task list worker has stopped; operation dropped");
        }
        Pending { rx }
    }
}

struct Worker<S> {
    store: Arc<S>,
    notifier: Arc<ChangeNotifier>,
    failures: broadcast::Sender<FailureNotice>,
    reminders: Arc<dyn ReminderScheduler>,
}

impl<S> Worker<S>
where
    S: TaskStore + 'static,
{
    async fn run(self, mut jobs: mpsc::UnboundedReceiver<Job>) {
        while let Some(job) = jobs.recv().await {
            self.handle(job).await;
        }
        debug!("Task list queue closed");
    }

    async fn handle(&self, job: Job) {
        match job {
            Job::Create(draft, reply) => {
                let created = draft.clone();
                let result = self
                    .execute(Operation::Create, move |store| store.insert(&draft))
                    .await;
                if let Ok(id) = &result {
                    self.schedule(&Task::from_draft(*id, created));
                }
                respond(reply, result);
            }
            Job::Edit(task, reply) => {
                let edited = task.clone();
                let result = self
                    .execute(Operation::Edit, move |store| store.update(&task))
                    .await;
                match &result {
                    Ok(true) => self.schedule(&edited),
                    Ok(false) => debug!(id = %edited.id, "Edit matched no task"),
                    Err(_) => {}
                }
                respond(reply, result);
            }
            Job::Remove(id, reply) => {
                let result = self
                    .execute(Operation::Remove, move |store| store.delete(id))
                    .await;
                match &result {
                    Ok(true) => self.reminders.cancel(id),
                    Ok(false) => debug!(%id, "Remove matched no task"),
                    Err(_) => {}
                }
                respond(reply, result);
            }
            Job::RemoveAll(reply) => {
                let result = self
                    .execute(Operation::RemoveAll, S::delete_all)
                    .await;
                if result.is_ok() {
                    self.reminders.cancel_all();
                }
                respond(reply, result);
            }
            Job::Refresh(reply) => {
                let result = self.republish().await;
                respond(reply, result);
            }
        }
    }

    /// Run `op` on the blocking pool, then re-query and publish.
    ///
    /// Once `op` has succeeded its value is returned even if the re-query
    /// fails; that failure goes out as a [`Operation::Refresh`] notice.
    async fn execute<T, F>(&self, operation: Operation, op: F) -> Result<T, TaskListError>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> Result<T, S::Error> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let value = blocking(move || op(store.as_ref()).map_err(Into::into))
            .await
            .inspect_err(|err| self.report(operation, err))?;
        if self.republish().await.is_err() {
            debug!(%operation, "Persisted without a fresh snapshot");
        }
        Ok(value)
    }

    /// Re-query the ordered list and publish it; the last snapshot stays on failure.
    async fn republish(&self) -> Result<(), TaskListError> {
        let store = Arc::clone(&self.store);
        let notifier = Arc::clone(&self.notifier);
        blocking(move || {
            let tasks = store.list_ordered().map_err(Into::<anyhow::Error>::into)?;
            notifier.publish(tasks);
            Ok(())
        })
        .await
        .inspect_err(|err| self.report(Operation::Refresh, err))
    }

    fn report(&self, operation: Operation, err: &TaskListError) {
        warn!(%operation, %err, "Task list operation failed");
        let notice = FailureNotice {
            operation,
            message: err.to_string(),
        };
        if self.failures.send(notice).is_err() {
            debug!("No failure listeners");
        }
    }

    fn schedule(&self, task: &Task) {
        match task.due {
            Some(at) if at > OffsetDateTime::now_utc() => self.reminders.schedule_once(task, at),
            _ => self.reminders.cancel(task.id),
        }
    }
}

async fn blocking<T, F>(call: F) -> Result<T, TaskListError>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(call).await {
        Ok(result) => result.map_err(TaskListError::from),
        Err(join) => Err(TaskListError::StorageUnavailable(anyhow!(
            "store call did not complete: {join}"
        ))),
    }
}

fn respond<T>(reply: Reply<T>, result: Result<T, TaskListError>) {
    if reply.send(result).is_err() {
        debug!("Result dropped by caller");
    }
}
