//! Minimal edit scripts between two ordered task snapshots.
//!
//! Items are matched by id. The matched items forming the longest common
//! subsequence stay put; every other matched item is moved at most once.
//! Unmatched old items are removed, unmatched new items are inserted, and
//! matched items whose fields changed receive an in-place update.
//!
//! Ids must be unique within each snapshot.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::{Task, TaskId};

/// One step of an [`EditScript`].
///
/// Indices always refer to the displayed list as it looks right before the
/// step is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    /// Drop the item at `index`.
    Remove {
        /// Position of the item to drop.
        index: usize,
    },
    /// Take the item at `from` out of the list, then reinsert it at `to`.
    Move {
        /// Current position.
        from: usize,
        /// Position after the item was taken out.
        to: usize,
    },
    /// Insert `task` at `index`.
    Insert {
        /// Final position of the new item.
        index: usize,
        /// The inserted task.
        task: Task,
    },
    /// Replace the content shown at `index`.
    Update {
        /// Final position of the changed item.
        index: usize,
        /// Fresh content.
        task: Task,
    },
}

/// Ordered edits turning one snapshot's display into another's.
///
/// Removals come first (back to front), then moves, then insertions in
/// ascending order, then content updates at final positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditScript {
    edits: Vec<Edit>,
}

/// Receiver of incremental list updates, typically a display surface.
pub trait ListUpdates {
    /// An item disappeared at `index`.
    fn removed(&mut self, index: usize);
    /// An item travelled from `from` to `to`.
    fn moved(&mut self, from: usize, to: usize);
    /// `task` appeared at `index`.
    fn inserted(&mut self, index: usize, task: &Task);
    /// The item at `index` now shows `task`.
    fn updated(&mut self, index: usize, task: &Task);
}

/// Failure applying a script to a list it was not computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// An edit pointed past the end of the list.
    #[error("edit index {index} out of bounds for list of length {len}")]
    OutOfBounds {
        /// Offending index.
        index: usize,
        /// List length at that point.
        len: usize,
    },
}

impl EditScript {
    /// True when the two snapshots display identically.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Number of edits.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.edits.len()
    }

    /// Edits in application order.
    #[must_use]
    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    /// Iterate edits in application order.
    pub fn iter(&self) -> std::slice::Iter<'_, Edit> {
        self.edits.iter()
    }

    /// Number of insertions.
    #[must_use]
    pub fn inserted(&self) -> usize {
        self.count(|edit| matches!(edit, Edit::Insert { .. }))
    }

    /// Number of removals.
    #[must_use]
    pub fn removed(&self) -> usize {
        self.count(|edit| matches!(edit, Edit::Remove { .. }))
    }

    /// Number of moves.
    #[must_use]
    pub fn moved(&self) -> usize {
        self.count(|edit| matches!(edit, Edit::Move { .. }))
    }

    /// Number of content updates.
    #[must_use]
    pub fn updated(&self) -> usize {
        self.count(|edit| matches!(edit, Edit::Update { .. }))
    }

    fn count(&self, pred: impl Fn(&Edit) -> bool) -> usize {
        self.edits.iter().filter(|edit| pred(edit)).count()
    }

    /// Feed every edit to a display surface.
    pub fn dispatch(&self, surface: &mut impl ListUpdates) {
        for edit in &self.edits {
            match edit {
                Edit::Remove { index } => surface.removed(*index),
                Edit::Move { from, to } => surface.moved(*from, *to),
                Edit::Insert { index, task } => surface.inserted(*index, task),
                Edit::Update { index, task } => surface.updated(*index, task),
            }
        }
    }

    /// Apply the script to a copy of the old snapshot.
    ///
    /// # Errors
    /// Returns [`ApplyError::OutOfBounds`] when the list does not match the
    /// snapshot the script was computed from. The list may be partially
    /// modified in that case.
    pub fn apply(&self, list: &mut Vec<Task>) -> Result<(), ApplyError> {
        for edit in &self.edits {
            match edit {
                Edit::Remove { index } => {
                    check(*index, list.len(), false)?;
                    list.remove(*index);
                }
                Edit::Move { from, to } => {
                    check(*from, list.len(), false)?;
                    let task = list.remove(*from);
                    check(*to, list.len(), true)?;
                    list.insert(*to, task);
                }
                Edit::Insert { index, task } => {
                    check(*index, list.len(), true)?;
                    list.insert(*index, task.clone());
                }
                Edit::Update { index, task } => {
                    check(*index, list.len(), false)?;
                    list[*index].clone_from(task);
                }
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a EditScript {
    type Item = &'a Edit;
    type IntoIter = std::slice::Iter<'a, Edit>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// `at_end` admits `index == len`, the slot right after the last item.
const fn check(index: usize, len: usize, at_end: bool) -> Result<(), ApplyError> {
    if index < len || (at_end && index == len) {
        Ok(())
    } else {
        Err(ApplyError::OutOfBounds { index, len })
    }
}

/// Compute the edit script transforming the display of `old` into `new`.
#[must_use]
pub fn reconcile(old: &[Task], new: &[Task]) -> EditScript {
    let old_positions: HashMap<TaskId, usize> = old
        .iter()
        .enumerate()
        .map(|(pos, task)| (task.id, pos))
        .collect();
    let new_ids: HashSet<TaskId> = new.iter().map(|task| task.id).collect();

    let matched: Vec<(TaskId, usize)> = new
        .iter()
        .filter_map(|task| old_positions.get(&task.id).map(|&pos| (task.id, pos)))
        .collect();
    let anchors = longest_common_run(&matched);

    let mut edits = Vec::new();
    let mut working: Vec<TaskId> = old.iter().map(|task| task.id).collect();

    for (pos, task) in old.iter().enumerate().rev() {
        if !new_ids.contains(&task.id) {
            working.remove(pos);
            edits.push(Edit::Remove { index: pos });
        }
    }

    // Anchors already sit in the right relative order. Every other matched
    // item goes right after its nearest already-placed predecessor.
    for (target, task) in new.iter().enumerate() {
        if !old_positions.contains_key(&task.id) || anchors.contains(&task.id) {
            continue;
        }
        let Some(from) = position(&working, task.id) else {
            continue;
        };
        working.remove(from);
        let to = new[..target]
            .iter()
            .rev()
            .find_map(|prev| position(&working, prev.id))
            .map_or(0, |pos| pos + 1);
        working.insert(to, task.id);
        if from != to {
            edits.push(Edit::Move { from, to });
        }
    }

    for (index, task) in new.iter().enumerate() {
        if !old_positions.contains_key(&task.id) {
            working.insert(index, task.id);
            edits.push(Edit::Insert {
                index,
                task: task.clone(),
            });
        }
    }

    for (index, task) in new.iter().enumerate() {
        if let Some(&pos) = old_positions.get(&task.id)
            && !old[pos].same_content(task)
        {
            edits.push(Edit::Update {
                index,
                task: task.clone(),
            });
        }
    }

    debug_assert!(working.iter().copied().eq(new.iter().map(|task| task.id)));
    EditScript { edits }
}

fn position(working: &[TaskId], id: TaskId) -> Option<usize> {
    working.iter().position(|&candidate| candidate == id)
}

/// Ids of the longest run of `matched` whose old positions increase.
///
/// `matched` lists the shared items in new order with their old position,
/// so this run is the longest common subsequence of both snapshots.
fn longest_common_run(matched: &[(TaskId, usize)]) -> HashSet<TaskId> {
    // tails[k]: index into `matched` ending the best run of length k + 1.
    let mut tails: Vec<usize> = Vec::new();
    let mut previous: Vec<Option<usize>> = vec![None; matched.len()];

    for (idx, &(_, old_pos)) in matched.iter().enumerate() {
        let slot = tails.partition_point(|&tail| matched[tail].1 < old_pos);
        if slot > 0 {
            previous[idx] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(idx);
        } else {
            tails[slot] = idx;
        }
    }

    let mut run = HashSet::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(idx) = cursor {
        run.insert(matched[idx].0);
        cursor = previous[idx];
    }
    run
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn task(id: i64) -> Task {
        Task {
            id: TaskId(id),
            title: format!("task {id}"),
            details: String::new(),
            due: None,
        }
    }

    fn tasks(ids: &[i64]) -> Vec<Task> {
        ids.iter().copied().map(task).collect()
    }

    fn assert_transforms(old: &[Task], new: &[Task]) -> EditScript {
        let script = reconcile(old, new);
        let mut list = old.to_vec();
        script.apply(&mut list).expect("script must apply to old snapshot");
        assert_eq!(list, new, "script {script:?} did not reproduce new snapshot");
        script
    }

    #[test]
    fn identical_snapshots_need_no_edits() {
        let old = tasks(&[1, 2, 3, 4]);
        assert!(reconcile(&old, &old).is_empty());
        assert!(reconcile(&[], &[]).is_empty());
    }

    #[test]
    fn empty_old_is_all_insertions() {
        let new = tasks(&[3, 1, 2]);
        let script = assert_transforms(&[], &new);
        assert_eq!(script.inserted(), 3);
        assert_eq!(script.len(), 3);
    }

    #[test]
    fn empty_new_is_all_removals() {
        let old = tasks(&[1, 2, 3]);
        let script = assert_transforms(&old, &[]);
        assert_eq!(script.removed(), 3);
        assert_eq!(
            script.edits(),
            &[
                Edit::Remove { index: 2 },
                Edit::Remove { index: 1 },
                Edit::Remove { index: 0 },
            ]
        );
    }

    #[test]
    fn rotation_moves_a_single_item() {
        let old = tasks(&[1, 2, 3, 4]);
        let new = tasks(&[2, 3, 4, 1]);
        let script = assert_transforms(&old, &new);
        assert_eq!(script.moved(), 1);
        assert_eq!(script.len(), 1);
        assert_eq!(script.edits(), &[Edit::Move { from: 0, to: 3 }]);
    }

    #[test]
    fn content_change_in_place_is_an_update_only() {
        let old = tasks(&[1, 2, 3]);
        let mut new = old.clone();
        new[1].details = "now with details".into();
        let script = assert_transforms(&old, &new);
        assert_eq!(
            script.edits(),
            &[Edit::Update {
                index: 1,
                task: new[1].clone(),
            }]
        );
    }

    #[test]
    fn rescheduled_task_moves_and_updates() {
        // Giving task 1 a due date moves it behind the undated tasks.
        let old = tasks(&[1, 2, 3]);
        let mut moved = task(1);
        moved.due = Some(datetime!(2024-06-01 08:00 UTC));
        let new = vec![task(2), task(3), moved.clone()];

        let script = assert_transforms(&old, &new);
        assert_eq!(script.moved(), 1);
        assert_eq!(script.updated(), 1);
        assert_eq!(
            script.edits().last(),
            Some(&Edit::Update {
                index: 2,
                task: moved,
            })
        );
    }

    #[test]
    fn mixed_insert_remove_move_update() {
        let old = tasks(&[1, 2, 3, 4, 5, 6]);
        let mut new = tasks(&[7, 5, 2, 3, 8, 1, 6]);
        new[3].title = "renamed".into();

        let script = assert_transforms(&old, &new);
        assert_eq!(script.removed(), 1);
        assert_eq!(script.inserted(), 2);
        assert_eq!(script.updated(), 1);
        // 2, 3, 6 keep their relative order; 5 and 1 travel.
        assert_eq!(script.moved(), 2);
    }

    #[test]
    fn same_row_with_different_content_is_not_reinserted() {
        let old = tasks(&[1]);
        let mut new = tasks(&[1]);
        new[0].title = "Buy oat milk".into();
        let script = assert_transforms(&old, &new);
        assert_eq!(script.inserted(), 0);
        assert_eq!(script.removed(), 0);
        assert_eq!(script.updated(), 1);
    }

    #[test]
    fn every_permutation_of_small_lists_applies_cleanly() {
        let base = [1_i64, 2, 3, 4, 5];
        let mut order = base.to_vec();
        let mut seen = 0;
        permute(&mut order, 0, &mut |perm| {
            seen += 1;
            let old = tasks(&base);
            // Drop one item, add one and rename another to mix every kind of edit.
            let mut new: Vec<Task> = perm.iter().copied().filter(|&id| id != 3).map(task).collect();
            new.insert(seen % (new.len() + 1), task(9));
            if let Some(first) = new.first_mut() {
                first.details = format!("variant {seen}");
            }
            let script = assert_transforms(&old, &new);
            assert!(script.moved() <= 3, "too many moves for {perm:?}: {script:?}");

            let plain: Vec<Task> = perm.iter().copied().map(task).collect();
            let script = assert_transforms(&old, &plain);
            assert_eq!(script.len(), script.moved());
        });
        assert_eq!(seen, 120);
    }

    fn permute(items: &mut Vec<i64>, start: usize, visit: &mut impl FnMut(&[i64])) {
        if start == items.len() {
            visit(items);
            return;
        }
        for idx in start..items.len() {
            items.swap(start, idx);
            permute(items, start + 1, visit);
            items.swap(start, idx);
        }
    }

    #[test]
    fn apply_rejects_mismatched_list() {
        let script = reconcile(&tasks(&[1, 2, 3]), &tasks(&[1]));
        let mut unrelated = Vec::new();
        assert!(matches!(
            script.apply(&mut unrelated),
            Err(ApplyError::OutOfBounds { .. })
        ));
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl ListUpdates for Recorder {
        fn removed(&mut self, index: usize) {
            self.calls.push(format!("remove {index}"));
        }

        fn moved(&mut self, from: usize, to: usize) {
            self.calls.push(format!("move {from}->{to}"));
        }

        fn inserted(&mut self, index: usize, task: &Task) {
            self.calls.push(format!("insert {index} #{}", task.id));
        }

        fn updated(&mut self, index: usize, task: &Task) {
            self.calls.push(format!("update {index} #{}", task.id));
        }
    }

    #[test]
    fn dispatch_follows_script_order() {
        let old = tasks(&[1, 2, 3]);
        let mut new = tasks(&[3, 1, 4]);
        new[1].title = "changed".into();

        let mut recorder = Recorder::default();
        reconcile(&old, &new).dispatch(&mut recorder);
        assert_eq!(
            recorder.calls,
            vec!["remove 1", "move 1->0", "insert 2 #4", "update 1 #1"]
        );
    }
}
