//! Snapshot fan-out from the controller's worker to display surfaces.
//!
//! Two consumption styles are offered: push observers registered with
//! [`ChangeNotifier::subscribe`] and a pull-style [`LiveTasks`] view backed by
//! a `tokio::sync::watch` channel.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tasklist_core::Task;
use tokio::sync::watch;
use tracing::debug;

/// Ordered tasks observed at one instant.
///
/// Clones share the underlying slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    version: u64,
    tasks: Arc<[Task]>,
}

impl Snapshot {
    /// Monotonic publication counter, starting at 1.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Tasks in display order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True when the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Receiver of pushed snapshots.
///
/// Implementations must not call [`Subscription::resume`] or
/// [`ChangeNotifier::subscribe`] from inside `on_snapshot`; deliveries hold
/// the notifier's delivery lock.
pub trait SnapshotObserver: Send + Sync {
    /// Called with every snapshot published while the observer is active.
    fn on_snapshot(&self, snapshot: &Snapshot);
}

impl<F> SnapshotObserver for F
where
    F: Fn(&Snapshot) + Send + Sync,
{
    fn on_snapshot(&self, snapshot: &Snapshot) {
        self(snapshot);
    }
}

struct Entry {
    observer: Arc<dyn SnapshotObserver>,
    active: bool,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    observers: BTreeMap<u64, Entry>,
}

/// Holds the latest snapshot and delivers new ones to observers.
pub struct ChangeNotifier {
    latest: watch::Sender<Option<Snapshot>>,
    registry: Mutex<Registry>,
    delivery: Mutex<()>,
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("version", &self.latest.borrow().as_ref().map(Snapshot::version))
            .field("observers", &self.observer_count())
            .finish_non_exhaustive()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeNotifier {
    /// Notifier with no snapshot published yet.
    #[must_use]
    pub fn new() -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            latest,
            registry: Mutex::new(Registry::default()),
            delivery: Mutex::new(()),
        }
    }

    /// Most recently published snapshot, if any.
    #[must_use]
    pub fn latest(&self) -> Option<Snapshot> {
        self.latest.borrow().clone()
    }

    /// Store `tasks` as the latest snapshot and push it to every active observer.
    pub fn publish(&self, tasks: Vec<Task>) -> Snapshot {
        let _delivery = self.delivery();
        let version = self.latest.borrow().as_ref().map_or(1, |prev| prev.version + 1);
        let snapshot = Snapshot {
            version,
            tasks: tasks.into(),
        };
        self.latest.send_replace(Some(snapshot.clone()));

        let observers = self.active_observers();
        debug!(version, tasks = snapshot.len(), observers = observers.len(), "Publishing snapshot");
        for observer in observers {
            observer.on_snapshot(&snapshot);
        }
        snapshot
    }

    /// Pull-style view over published snapshots.
    #[must_use]
    pub fn live(&self) -> LiveTasks {
        LiveTasks {
            rx: self.latest.subscribe(),
        }
    }

    /// Attach an active observer.
    ///
    /// The latest snapshot, when one exists, is delivered before this returns.
    pub fn subscribe<O>(self: &Arc<Self>, observer: O) -> Subscription
    where
        O: SnapshotObserver + 'static,
    {
        let observer: Arc<dyn SnapshotObserver> = Arc::new(observer);
        let _delivery = self.delivery();
        let id = {
            let mut registry = self.registry();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.observers.insert(
                id,
                Entry {
                    observer: Arc::clone(&observer),
                    active: true,
                },
            );
            id
        };
        if let Some(snapshot) = self.latest() {
            observer.on_snapshot(&snapshot);
        }
        Subscription {
            notifier: Arc::downgrade(self),
            id,
        }
    }

    /// Number of attached observers, active or paused.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.registry().observers.len()
    }

    fn active_observers(&self) -> Vec<Arc<dyn SnapshotObserver>> {
        self.registry()
            .observers
            .values()
            .filter(|entry| entry.active)
            .map(|entry| Arc::clone(&entry.observer))
            .collect()
    }

    fn set_active(&self, id: u64, active: bool) -> Option<Arc<dyn SnapshotObserver>> {
        let mut registry = self.registry();
        let entry = registry.observers.get_mut(&id)?;
        entry.active = active;
        Some(Arc::clone(&entry.observer))
    }

    fn detach(&self, id: u64) {
        if self.registry().observers.remove(&id).is_some() {
            debug!(id, "Observer detached");
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn delivery(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle for an attached observer. Dropping it detaches the observer.
#[derive(Debug)]
#[must_use = "dropping the subscription detaches the observer"]
pub struct Subscription {
    notifier: Weak<ChangeNotifier>,
    id: u64,
}

impl Subscription {
    /// Stop deliveries until [`resume`](Self::resume).
    pub fn pause(&self) {
        if let Some(notifier) = self.notifier.upgrade() {
            notifier.set_active(self.id, false);
        }
    }

    /// Reactivate and immediately re-deliver the latest snapshot.
    ///
    /// The observer may see a snapshot it already received.
    pub fn resume(&self) {
        let Some(notifier) = self.notifier.upgrade() else {
            return;
        };
        let _delivery = notifier.delivery();
        if let Some(observer) = notifier.set_active(self.id, true)
            && let Some(snapshot) = notifier.latest()
        {
            observer.on_snapshot(&snapshot);
        }
    }

    /// True while attached and not paused.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.notifier.upgrade().is_some_and(|notifier| {
            notifier
                .registry()
                .observers
                .get(&self.id)
                .is_some_and(|entry| entry.active)
        })
    }

    /// Detach now instead of at drop.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(notifier) = self.notifier.upgrade() {
            notifier.detach(self.id);
        }
    }
}

/// Async view of the latest snapshot.
#[derive(Debug, Clone)]
pub struct LiveTasks {
    rx: watch::Receiver<Option<Snapshot>>,
}

impl LiveTasks {
    /// Latest snapshot, `None` before the first publication.
    #[must_use]
    pub fn current(&self) -> Option<Snapshot> {
        self.rx.borrow().clone()
    }

    /// Wait for a publication this view has not seen yet.
    ///
    /// Returns `None` once the notifier is gone.
    pub async fn changed(&mut self) -> Option<Snapshot> {
        self.rx.changed().await.ok()?;
        self.rx.borrow_and_update().clone()
    }

    /// Wait until the latest snapshot has at least `version`.
    pub async fn wait_for_version(&mut self, version: u64) -> Option<Snapshot> {
        self.wait_until(|snapshot| snapshot.version >= version).await
    }

    /// Wait until the latest snapshot satisfies `predicate`.
    ///
    /// Returns `None` if the notifier goes away first.
    pub async fn wait_until<P>(&mut self, mut predicate: P) -> Option<Snapshot>
    where
        P: FnMut(&Snapshot) -> bool + Send,
    {
        let snapshot = self
            .rx
            .wait_for(|latest| latest.as_ref().is_some_and(&mut predicate))
            .await
            .ok()?;
        (*snapshot).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasklist_core::{TaskDraft, TaskId};

    fn tasks(ids: &[i64]) -> Vec<Task> {
        ids.iter()
            .map(|&id| Task::from_draft(TaskId(id), TaskDraft::new(format!("task {id}"), "")))
            .collect()
    }

    fn recorder() -> (Arc<Mutex<Vec<u64>>>, impl Fn(&Snapshot) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |snapshot: &Snapshot| {
            sink.lock().unwrap_or_else(PoisonError::into_inner).push(snapshot.version());
        })
    }

    fn versions(seen: &Mutex<Vec<u64>>) -> Vec<u64> {
        seen.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[test]
    fn versions_start_at_one_and_increase() {
        let notifier = ChangeNotifier::new();
        assert!(notifier.latest().is_none());
        assert_eq!(notifier.publish(tasks(&[1])).version(), 1);
        let second = notifier.publish(tasks(&[1, 2]));
        assert_eq!(second.version(), 2);
        assert_eq!(notifier.latest(), Some(second));
    }

    #[test]
    fn new_observer_receives_latest_immediately() {
        let notifier = Arc::new(ChangeNotifier::new());
        let (early_seen, early) = recorder();
        let _early = notifier.subscribe(early);
        assert!(versions(&early_seen).is_empty());

        notifier.publish(tasks(&[1]));
        let (late_seen, late) = recorder();
        let _late = notifier.subscribe(late);
        assert_eq!(versions(&early_seen), vec![1]);
        assert_eq!(versions(&late_seen), vec![1]);
    }

    #[test]
    fn paused_observer_catches_up_on_resume() {
        let notifier = Arc::new(ChangeNotifier::new());
        let (seen, observer) = recorder();
        let subscription = notifier.subscribe(observer);

        notifier.publish(tasks(&[1]));
        subscription.pause();
        assert!(!subscription.is_active());
        notifier.publish(tasks(&[1, 2]));
        notifier.publish(tasks(&[2]));
        assert_eq!(versions(&seen), vec![1]);

        subscription.resume();
        assert!(subscription.is_active());
        assert_eq!(versions(&seen), vec![1, 3]);
    }

    #[test]
    fn dropping_subscription_detaches() {
        let notifier = Arc::new(ChangeNotifier::new());
        let (seen, observer) = recorder();
        let subscription = notifier.subscribe(observer);
        assert_eq!(notifier.observer_count(), 1);

        subscription.unsubscribe();
        assert_eq!(notifier.observer_count(), 0);
        notifier.publish(tasks(&[1]));
        assert!(versions(&seen).is_empty());
    }

    #[test]
    fn subscription_outliving_notifier_is_inert() {
        let notifier = Arc::new(ChangeNotifier::new());
        let subscription = notifier.subscribe(|_: &Snapshot| {});
        drop(notifier);
        subscription.pause();
        subscription.resume();
        assert!(!subscription.is_active());
    }

    #[tokio::test]
    async fn live_view_waits_for_version() {
        let notifier = Arc::new(ChangeNotifier::new());
        let mut live = notifier.live();
        assert!(live.current().is_none());

        let publisher = Arc::clone(&notifier);
        let handle = tokio::spawn(async move {
            publisher.publish(tasks(&[1]));
            publisher.publish(tasks(&[1, 2]));
        });
        let snapshot = live.wait_for_version(2).await;
        handle.await.ok();

        let snapshot = snapshot.map(|s| s.tasks().iter().map(|t| t.id).collect::<Vec<_>>());
        assert_eq!(snapshot, Some(vec![TaskId(1), TaskId(2)]));
    }

    #[tokio::test]
    async fn live_view_ends_with_notifier() {
        let notifier = ChangeNotifier::new();
        let mut live = notifier.live();
        drop(notifier);
        assert!(live.changed().await.is_none());
    }
}
