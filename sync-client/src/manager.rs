//! Event ingestion.
//!
//! Watchers report every observed change through [`FileEventManager::notify`].
//! The manager keeps the file tree in step, folds the event into the path's
//! action, detects moves (both reported ones and delete/create pairs with the
//! same content) and queues the path for the executor.

use crate::error::EngineError;
use crate::shared::{Shared, SharedHandles};
use peersync_core::{ActionState, ExecutionListener, Resolution, SchedulePolicy};
use peersync_types::{ContentHash, FileEvent};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

/// One observed change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNotice {
    /// Path the change happened at (destination for moves).
    pub path: PathBuf,
    /// What happened.
    pub event: FileEvent,
    /// Whether the path is a folder.
    pub is_folder: bool,
    /// Content hash, or names hash for folders. Empty if unknown.
    pub content_hash: ContentHash,
}

impl FileNotice {
    /// A notice for a file with no known hash.
    pub fn new(path: impl Into<PathBuf>, event: FileEvent) -> Self {
        Self {
            path: path.into(),
            event,
            is_folder: false,
            content_hash: ContentHash::empty(),
        }
    }

    /// Mark the path as a folder.
    pub fn folder(mut self) -> Self {
        self.is_folder = true;
        self
    }

    /// Attach a content hash.
    pub fn with_hash(mut self, content_hash: ContentHash) -> Self {
        self.content_hash = content_hash;
        self
    }
}

/// Snapshot of engine counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStats {
    /// Components in the tree, root included.
    pub known_paths: usize,
    /// Paths waiting in the ready queue.
    pub queued: usize,
    /// Reserved execution slots.
    pub in_flight: usize,
    /// Deletes waiting for a matching create.
    pub pending_deletes: usize,
    /// Paths stalled in conflict.
    pub conflicts: usize,
}

/// Entry point for watchers.
#[derive(Debug, Clone)]
pub struct FileEventManager {
    handles: SharedHandles,
    policy: SchedulePolicy,
}

impl FileEventManager {
    /// Create a manager for the tree under `root`.
    pub fn new(root: impl Into<PathBuf>, policy: SchedulePolicy) -> Self {
        let shared = Shared::new(root.into(), policy.slot_bound, Instant::now().into_std());
        Self {
            handles: SharedHandles {
                state: Arc::new(Mutex::new(shared)),
                wakeup: Arc::new(Notify::new()),
            },
            policy,
        }
    }

    /// The policy this manager was built with.
    pub fn policy(&self) -> &SchedulePolicy {
        &self.policy
    }

    pub(crate) fn handles(&self) -> SharedHandles {
        self.handles.clone()
    }

    /// Record one observed change.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::State`] if the event cannot follow the path's
    /// current state (the state is left untouched), or [`EngineError::Tree`]
    /// if the path is outside the synchronized root.
    pub async fn notify(&self, notice: FileNotice) -> Result<(), EngineError> {
        let now = Instant::now().into_std();
        let window = self.policy.stability_window;
        let FileNotice {
            path,
            mut event,
            is_folder,
            content_hash,
        } = notice;

        let mut guard = self.handles.state.lock().await;
        let shared = &mut *guard;

        if is_echo(shared, &path, &event, &content_hash) {
            tracing::debug!(path = %path.display(), "ignoring create of unchanged uploaded path");
            return Ok(());
        }

        if let Some(old) = event.moved_from().map(Path::to_path_buf) {
            if old != path {
                if let Some(node) = shared.tree.get(&old) {
                    // Reject before the tree is touched
                    if let Err(e) = node.action().state().on_event(&event) {
                        tracing::warn!(path = %path.display(), "rejected {}: {}", event, e);
                        return Err(e.into());
                    }
                    shared.relocate(&old, &path, window, now)?;
                }
            }
        } else if event == FileEvent::LocalCreate && !content_hash.is_empty() {
            let candidate = if is_folder {
                shared.deleted.take_folder(&content_hash, &path)
            } else {
                shared.deleted.take_file(&content_hash, &path)
            };
            if let Some(source) = candidate.filter(|source| shared.tree.contains(source)) {
                let moved = shared.relocate(&source, &path, window, now)?;
                // The folder move carries its descendants along
                for (_, descendant) in moved.iter().filter(|(_, new)| new != &path) {
                    shared.queue.remove(descendant);
                    shared.deleted.remove(descendant);
                    if let Some(node) = shared.tree.get_mut(descendant) {
                        if let Err(e) = node.action_mut().discard() {
                            tracing::debug!(
                                path = %descendant.display(),
                                error = %e,
                                "keeping descendant state across folder move"
                            );
                        }
                    }
                }
                shared.queue.remove(&path);
                tracing::info!(
                    from = %source.display(),
                    to = %path.display(),
                    "paired delete and create into a move"
                );
                event = FileEvent::LocalMove { old_path: source };
            }
        }

        let node = shared.tree.insert(&path, is_folder, content_hash.clone(), now)?;
        let was_local_delete = node.action().state().is_local_delete();
        if let Err(e) = node.action_mut().apply(&event, now) {
            tracing::warn!(path = %path.display(), "rejected {}: {}", event, e);
            return Err(e.into());
        }
        if !event.is_delete() && !content_hash.is_empty() {
            node.set_content_hash(content_hash);
        }

        let state = node.action().state().clone();
        let ready_at = node.action().timestamp() + window;
        let node_hash = node.content_hash().clone();
        let node_is_folder = node.is_folder();

        if state.is_local_delete() {
            shared.deleted.insert(&path, node_is_folder, &node_hash);
        } else if was_local_delete {
            shared.deleted.remove(&path);
        }
        if state.is_conflict() {
            tracing::warn!(path = %path.display(), "conflicting local and remote changes");
        }
        tracing::debug!(path = %path.display(), %event, %state, "event applied");

        shared.queue.push(&path, ready_at);
        drop(guard);
        self.handles.wakeup.notify_one();
        Ok(())
    }

    /// Leave the conflict state at `path`.
    pub async fn resolve(&self, path: &Path, resolution: Resolution) -> Result<(), EngineError> {
        let now = Instant::now().into_std();
        let mut guard = self.handles.state.lock().await;
        let shared = &mut *guard;

        let node = shared
            .tree
            .get_mut(path)
            .ok_or_else(|| EngineError::UnknownPath(path.to_path_buf()))?;
        node.action_mut().resolve(resolution, now)?;
        let ready_at = node.action().timestamp() + self.policy.stability_window;
        tracing::info!(path = %path.display(), ?resolution, "conflict resolved");

        shared.queue.push(path, ready_at);
        drop(guard);
        self.handles.wakeup.notify_one();
        Ok(())
    }

    /// Subscribe to completion of operations at `path`.
    ///
    /// Returns `false` if the listener was already registered.
    pub async fn add_listener(
        &self,
        path: &Path,
        listener: Arc<dyn ExecutionListener>,
    ) -> Result<bool, EngineError> {
        let mut shared = self.handles.state.lock().await;
        let node = shared
            .tree
            .get_mut(path)
            .ok_or_else(|| EngineError::UnknownPath(path.to_path_buf()))?;
        Ok(node.action_mut().add_listener(listener))
    }

    /// Current state of the action at `path`.
    pub async fn state_of(&self, path: &Path) -> Option<ActionState> {
        let shared = self.handles.state.lock().await;
        shared
            .tree
            .get(path)
            .map(|node| node.action().state().clone())
    }

    /// Lifetime execution count of the action at `path`.
    pub async fn execution_attempts(&self, path: &Path) -> Option<u32> {
        let shared = self.handles.state.lock().await;
        shared
            .tree
            .get(path)
            .map(|node| node.action().execution_attempts())
    }

    /// Counters for logging and tests.
    pub async fn stats(&self) -> EngineStats {
        let shared = self.handles.state.lock().await;
        EngineStats {
            known_paths: shared.tree.len(),
            queued: shared.queue.len(),
            in_flight: shared.slots.len(),
            pending_deletes: shared.deleted.len(),
            conflicts: shared
                .tree
                .components()
                .filter(|node| node.action().state().is_conflict())
                .count(),
        }
    }

    /// Whether nothing is queued and nothing is in flight.
    pub async fn is_idle(&self) -> bool {
        self.handles.state.lock().await.is_idle()
    }
}

/// A create for an uploaded, settled, unqueued path with unchanged content
/// is the watcher echoing a completed operation.
fn is_echo(shared: &Shared, path: &Path, event: &FileEvent, hash: &ContentHash) -> bool {
    if *event != FileEvent::LocalCreate || hash.is_empty() {
        return false;
    }
    shared.tree.get(path).is_some_and(|node| {
        node.is_uploaded()
            && node.action().state().is_initial()
            && !shared.queue.contains(path)
            && node.content_hash() == hash
    })
}
