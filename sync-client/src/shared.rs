//! State shared by the event manager and the executor.

use peersync_core::{DeleteIndex, ExecutionSlots, FileTree, ReadyQueue};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify};

/// Everything both sides touch, kept under one lock so slot counts and the
/// delete index never disagree with the tree.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) tree: FileTree,
    pub(crate) deleted: DeleteIndex,
    pub(crate) queue: ReadyQueue,
    pub(crate) slots: ExecutionSlots,
    /// Dispatch id of the transfer running for each path. Outlives moves
    /// and removals of the component that started it.
    pub(crate) running: HashMap<PathBuf, u64>,
    pub(crate) last_dispatch: u64,
}

/// Handles passed from the manager to the executor.
#[derive(Debug, Clone)]
pub(crate) struct SharedHandles {
    pub(crate) state: Arc<Mutex<Shared>>,
    pub(crate) wakeup: Arc<Notify>,
}

impl Shared {
    pub(crate) fn new(root: PathBuf, slot_bound: usize, now: Instant) -> Self {
        Self {
            tree: FileTree::new(root, now),
            deleted: DeleteIndex::new(),
            queue: ReadyQueue::new(),
            slots: ExecutionSlots::new(slot_bound),
            running: HashMap::new(),
            last_dispatch: 0,
        }
    }

    /// Remove the subtree at `path` along with its queue and index entries.
    pub(crate) fn forget(&mut self, path: &Path) -> usize {
        let Ok(removed) = self.tree.remove(path) else {
            return 0;
        };
        for component in &removed {
            self.queue.remove(component.path());
            self.deleted.remove(component.path());
        }
        removed.len()
    }

    /// Re-key the subtree at `from` to `to`, carrying queue entries and
    /// pending deletes along.
    pub(crate) fn relocate(
        &mut self,
        from: &Path,
        to: &Path,
        window: Duration,
        now: Instant,
    ) -> Result<Vec<(PathBuf, PathBuf)>, peersync_core::TreeError> {
        // Whatever sits at the destination is replaced
        if from != to && self.tree.contains(to) {
            self.forget(to);
        }
        let moved = self.tree.move_subtree(from, to, now)?;
        for (old, new) in &moved {
            let was_queued = self.queue.remove(old);
            self.deleted.remove(old);

            let Some(node) = self.tree.get_mut(new) else {
                continue;
            };
            if let Some(operation) = node.action_mut().detach() {
                tracing::debug!(from = %old.display(), %operation, "moved while in flight");
            }
            if node.action().state().is_local_delete() {
                self.deleted
                    .insert(new, node.is_folder(), node.content_hash());
            }
            if was_queued {
                self.queue.push(new, node.action().timestamp() + window);
            }
        }
        Ok(moved)
    }

    /// Whether `path` still has a transfer running, whoever owns it now.
    pub(crate) fn is_running(&self, path: &Path) -> bool {
        self.running.contains_key(path) || self.slots.contains(path)
    }

    /// The transfer `dispatch_id` at `path` is over: free its slot.
    pub(crate) fn finish(&mut self, path: &Path, dispatch_id: u64) {
        if self.running.get(path) == Some(&dispatch_id) {
            self.running.remove(path);
            self.slots.release(path);
        }
    }

    /// Whether nothing is queued and nothing is in flight.
    pub(crate) fn is_idle(&self) -> bool {
        self.queue.is_empty()
            && self.slots.is_empty()
            && self.running.is_empty()
            && self
                .tree
                .components()
                .all(|node| !node.action().is_in_flight())
    }
}
