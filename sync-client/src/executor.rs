//! The executor: a single consumer loop over the ready queue.
//!
//! The loop sleeps until the earliest deadline in the queue, a wakeup from
//! the manager, a transfer completion, or shutdown. For every due path it
//! checks that the change has been quiet for the stability window, that the
//! path has nothing in flight and that a slot is free; otherwise the path is
//! re-queued. Dispatched operations run on their own tasks and report back
//! through a completion sink attached to each dispatch. Completions carry the
//! dispatch id, so a transfer that outlived a move of its path never touches
//! the action now living there.

use crate::error::EngineError;
use crate::manager::FileEventManager;
use crate::shared::SharedHandles;
use crate::transfer::{self, TransferDelegate};
use peersync_core::{ExecutionListener, SchedulePolicy};
use peersync_types::{Operation, TransferFailure};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Result of one transfer attempt, as seen by the executor.
#[derive(Debug)]
struct Completion {
    path: PathBuf,
    dispatch_id: u64,
    operation: Operation,
    result: Result<(), TransferFailure>,
}

/// Listener attached to every dispatch; forwards completions, tagged with
/// the dispatch id, to the executor loop.
struct CompletionSink {
    tx: mpsc::UnboundedSender<Completion>,
    dispatch_id: u64,
}

impl CompletionSink {
    fn send(&self, path: &Path, operation: &Operation, result: Result<(), TransferFailure>) {
        let _ = self.tx.send(Completion {
            path: path.to_path_buf(),
            dispatch_id: self.dispatch_id,
            operation: operation.clone(),
            result,
        });
    }
}

impl ExecutionListener for CompletionSink {
    fn on_execute_succeeded(&self, path: &Path, operation: &Operation) {
        self.send(path, operation, Ok(()));
    }

    fn on_execute_failed(&self, path: &Path, operation: &Operation, failure: &TransferFailure) {
        self.send(path, operation, Err(failure.clone()));
    }
}

/// A transfer ready to be spawned once the lock is released.
struct Dispatch {
    path: PathBuf,
    operation: Operation,
    listeners: Vec<Arc<dyn ExecutionListener>>,
}

/// Consumer side of the engine.
pub struct ActionExecutor {
    handles: SharedHandles,
    policy: SchedulePolicy,
    delegate: Arc<dyn TransferDelegate>,
    tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
}

/// Handle to a running executor.
#[derive(Debug)]
pub struct ExecutorHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ExecutorHandle {
    /// Stop the loop and wait for it to exit.
    ///
    /// Transfers already in flight are not cancelled.
    pub async fn shutdown(self) -> Result<(), EngineError> {
        let _ = self.shutdown.send(());
        self.task
            .await
            .map_err(|e| EngineError::Executor(e.to_string()))
    }
}

impl ActionExecutor {
    /// Create an executor consuming the queue of `manager`.
    pub fn new(manager: &FileEventManager, delegate: Arc<dyn TransferDelegate>) -> Self {
        let (tx, completions) = mpsc::unbounded_channel();
        Self {
            handles: manager.handles(),
            policy: manager.policy().clone(),
            delegate,
            tx,
            completions,
        }
    }

    /// Run the loop on a new task.
    pub fn spawn(self) -> ExecutorHandle {
        let (shutdown, signal) = oneshot::channel();
        let task = tokio::spawn(self.run(signal));
        ExecutorHandle { shutdown, task }
    }

    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        tracing::info!(
            window_ms = self.policy.stability_window.as_millis() as u64,
            slots = self.policy.slot_bound,
            max_attempts = self.policy.max_attempts,
            "executor started"
        );

        loop {
            self.drain_due().await;

            let deadline = self.handles.state.lock().await.queue.next_ready_at();
            let sleep = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(Instant::from_std(at)).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("executor stopped");
                    break;
                }
                Some(completion) = self.completions.recv() => {
                    self.on_completion(completion).await;
                }
                _ = self.handles.wakeup.notified() => {}
                _ = sleep => {}
            }
        }
    }

    /// Listener snapshot for one attempt: the action's listeners plus a
    /// sink tagged with the dispatch id.
    fn listeners_for(
        &self,
        mut listeners: Vec<Arc<dyn ExecutionListener>>,
        dispatch_id: u64,
    ) -> Vec<Arc<dyn ExecutionListener>> {
        listeners.push(Arc::new(CompletionSink {
            tx: self.tx.clone(),
            dispatch_id,
        }));
        listeners
    }

    /// Pop every due path and dispatch or re-queue it.
    async fn drain_due(&self) {
        let now = Instant::now().into_std();
        let mut dispatches = Vec::new();
        let mut deferred = Vec::new();

        let mut guard = self.handles.state.lock().await;
        let shared = &mut *guard;

        while let Some(path) = shared.queue.pop_due(now) {
            // A transfer may still run here for a component that moved away
            let running = shared.is_running(&path);
            let Some(node) = shared.tree.get_mut(&path) else {
                tracing::debug!(path = %path.display(), "dropping entry for removed path");
                continue;
            };

            let age = node.action().age(now);
            if running
                || node.action().is_in_flight()
                || !self.policy.is_ready(age)
                || !shared.slots.has_free()
            {
                deferred.push((path, now + self.policy.wait_for(age)));
                continue;
            }

            let state = node.action().state();
            if state.is_initial() || state.is_executing() {
                continue;
            }
            if state.is_conflict() {
                tracing::warn!(path = %path.display(), "conflict stalls until resolved");
                continue;
            }

            if self.policy.wait_for_completion && !shared.slots.reserve(&path) {
                deferred.push((path, now + self.policy.wait_for(age)));
                continue;
            }
            let is_delete = state.is_local_delete();
            shared.last_dispatch += 1;
            let dispatch_id = shared.last_dispatch;

            let action = node.action_mut();
            let operation = match action.execute(dispatch_id) {
                Ok(operation) => operation,
                Err(e) => {
                    shared.slots.release(&path);
                    tracing::error!(path = %path.display(), "cannot execute: {}", e);
                    continue;
                }
            };
            let listeners = self.listeners_for(action.listeners(), dispatch_id);
            node.mark_uploaded();
            if is_delete {
                shared.deleted.remove(&path);
            }
            shared.running.insert(path.clone(), dispatch_id);

            tracing::info!(path = %path.display(), %operation, dispatch_id, "dispatching");
            dispatches.push(Dispatch {
                path,
                operation,
                listeners,
            });
        }

        for (path, ready_at) in deferred {
            shared.queue.requeue(&path, ready_at);
        }
        drop(guard);

        for dispatch in dispatches {
            self.spawn_transfer(dispatch);
        }
    }

    /// Run one transfer attempt on its own task.
    ///
    /// The delegate call runs on a nested task so a panic inside it is
    /// reported as a failure instead of losing the completion.
    fn spawn_transfer(&self, dispatch: Dispatch) {
        let delegate = Arc::clone(&self.delegate);
        tokio::spawn(async move {
            let Dispatch {
                path,
                operation,
                listeners,
            } = dispatch;

            let call = {
                let operation = operation.clone();
                tokio::spawn(async move { transfer::perform(delegate.as_ref(), &operation).await })
            };
            let result = match call.await {
                Ok(result) => result,
                Err(e) => Err(TransferFailure::internal(format!("transfer task failed: {e}"))),
            };

            for listener in &listeners {
                match &result {
                    Ok(()) => listener.on_execute_succeeded(&path, &operation),
                    Err(failure) => listener.on_execute_failed(&path, &operation, failure),
                }
            }
        });
    }

    async fn on_completion(&self, completion: Completion) {
        let Completion {
            path,
            dispatch_id,
            operation,
            result,
        } = completion;

        let mut guard = self.handles.state.lock().await;
        let shared = &mut *guard;

        let owned = shared
            .tree
            .get(&path)
            .is_some_and(|node| node.action().owns(dispatch_id));
        if !owned {
            // The component moved or was replaced while the transfer ran
            shared.finish(&path, dispatch_id);
            drop(guard);
            tracing::debug!(
                path = %path.display(),
                %operation,
                dispatch_id,
                failed = result.is_err(),
                "completion for a dispatch no action owns"
            );
            self.handles.wakeup.notify_one();
            return;
        }

        let failure = match result {
            Ok(()) => {
                shared.finish(&path, dispatch_id);
                let Some(node) = shared.tree.get_mut(&path) else {
                    return;
                };
                let settled = node.action_mut().complete();
                tracing::info!(path = %path.display(), %operation, settled, "executed");

                if settled && operation.is_delete() {
                    let removed = shared.forget(&path);
                    tracing::debug!(path = %path.display(), removed, "removed deleted subtree");
                }
                drop(guard);
                self.handles.wakeup.notify_one();
                return;
            }
            Err(failure) => failure,
        };

        let Some(node) = shared.tree.get_mut(&path) else {
            shared.finish(&path, dispatch_id);
            return;
        };
        let action = node.action_mut();

        if self.policy.may_retry(action.dispatch_attempts()) {
            if let Some(retry) = action.retry() {
                tracing::warn!(
                    path = %path.display(),
                    attempt = action.dispatch_attempts(),
                    "transfer failed, retrying: {}",
                    failure
                );
                let dispatch = Dispatch {
                    listeners: self.listeners_for(action.listeners(), dispatch_id),
                    path,
                    operation: retry,
                };
                drop(guard);
                self.spawn_transfer(dispatch);
                return;
            }
        }

        let attempts = action.dispatch_attempts();
        let listeners = action.listeners();
        action.abandon();
        shared.finish(&path, dispatch_id);
        drop(guard);

        tracing::error!(
            path = %path.display(),
            %operation,
            attempts,
            "giving up after repeated failures: {}",
            failure
        );
        for listener in &listeners {
            listener.on_execute_abandoned(&path, &operation, &failure);
        }
        self.handles.wakeup.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::manager::FileNotice;
    use crate::transfer::MockTransfer;
    use peersync_core::{ActionState, Resolution};
    use peersync_types::{ContentHash, FailureKind, FileEvent, OperationKind};
    use std::sync::Mutex;
    use std::time::Duration;

    fn start(policy: SchedulePolicy) -> (Engine, MockTransfer) {
        let transfer = MockTransfer::new();
        let engine = Engine::start("/", policy, Arc::new(transfer.clone()));
        (engine, transfer)
    }

    fn notice(path: &str, event: FileEvent) -> FileNotice {
        FileNotice::new(path, event).with_hash(ContentHash::of_bytes(path.as_bytes()))
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[derive(Default)]
    struct Abandoned {
        paths: Mutex<Vec<PathBuf>>,
    }

    impl ExecutionListener for Abandoned {
        fn on_execute_succeeded(&self, _path: &Path, _operation: &Operation) {}

        fn on_execute_failed(&self, _path: &Path, _operation: &Operation, _failure: &TransferFailure) {}

        fn on_execute_abandoned(&self, path: &Path, _operation: &Operation, _failure: &TransferFailure) {
            self.paths.lock().unwrap().push(path.to_path_buf());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_stability_window() {
        let (engine, transfer) = start(SchedulePolicy::default());
        let started = Instant::now();
        engine
            .manager()
            .notify(notice("/a", FileEvent::LocalCreate))
            .await
            .unwrap();

        tokio::time::sleep(ms(1900)).await;
        assert!(transfer.calls().is_empty());

        tokio::time::sleep(ms(200)).await;
        let calls = transfer.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].operation.kind, OperationKind::Create);
        assert!(calls[0].at - started >= ms(2000));

        engine.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn burst_executes_once() {
        let (engine, transfer) = start(SchedulePolicy::default());
        let started = Instant::now();
        let manager = engine.manager();

        manager.notify(notice("/a", FileEvent::LocalCreate)).await.unwrap();
        for _ in 0..3 {
            tokio::time::sleep(ms(500)).await;
            manager.notify(notice("/a", FileEvent::LocalUpdate)).await.unwrap();
        }

        tokio::time::sleep(ms(5000)).await;
        let calls = transfer.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].operation.kind, OperationKind::Create);
        // Last event at 1500ms, so nothing before 3500ms
        assert!(calls[0].at - started >= ms(3500));
        assert_eq!(manager.execution_attempts(Path::new("/a")).await, Some(1));

        engine.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn single_slot_serializes_paths() {
        let policy = SchedulePolicy {
            slot_bound: 1,
            ..SchedulePolicy::default()
        };
        let (engine, transfer) = start(policy);
        let started = Instant::now();

        engine.manager().notify(notice("/a", FileEvent::LocalCreate)).await.unwrap();
        engine.manager().notify(notice("/b", FileEvent::LocalCreate)).await.unwrap();

        tokio::time::sleep(ms(3000)).await;
        let a = transfer.calls_for(Path::new("/a"));
        let b = transfer.calls_for(Path::new("/b"));
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);

        let a_at = a[0].at - started;
        let b_at = b[0].at - started;
        assert!(a_at >= ms(2000) && a_at < ms(2100), "a at {a_at:?}");
        assert!(b_at >= ms(2500) && b_at < ms(2600), "b at {b_at:?}");

        engine.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_never_exceeds_bound() {
        let policy = SchedulePolicy {
            slot_bound: 2,
            ..SchedulePolicy::default()
        };
        let (engine, transfer) = start(policy);
        transfer.set_delay(ms(1000));

        for i in 0..5 {
            let path = format!("/f{i}");
            engine
                .manager()
                .notify(notice(&path, FileEvent::LocalCreate))
                .await
                .unwrap();
        }

        tokio::time::sleep(ms(10_000)).await;
        assert_eq!(transfer.calls().len(), 5);
        assert_eq!(transfer.max_concurrent(), 2);
        assert!(engine.manager().is_idle().await);

        engine.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn fire_and_forget_ignores_slots() {
        let policy = SchedulePolicy {
            slot_bound: 1,
            wait_for_completion: false,
            ..SchedulePolicy::default()
        };
        let (engine, transfer) = start(policy);
        transfer.set_delay(ms(1000));

        engine.manager().notify(notice("/a", FileEvent::LocalCreate)).await.unwrap();
        engine.manager().notify(notice("/b", FileEvent::LocalCreate)).await.unwrap();

        tokio::time::sleep(ms(2100)).await;
        assert_eq!(transfer.calls().len(), 2);
        assert_eq!(transfer.max_concurrent(), 2);

        engine.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn retries_are_bounded() {
        let policy = SchedulePolicy {
            max_attempts: 3,
            ..SchedulePolicy::default()
        };
        let (engine, transfer) = start(policy);
        transfer.fail_always(FailureKind::PutFailed);

        let manager = engine.manager();
        manager.notify(notice("/a", FileEvent::LocalUpdate)).await.unwrap();
        let abandoned = Arc::new(Abandoned::default());
        manager
            .add_listener(Path::new("/a"), abandoned.clone())
            .await
            .unwrap();

        tokio::time::sleep(ms(10_000)).await;
        assert_eq!(transfer.calls().len(), 4);
        assert_eq!(*abandoned.paths.lock().unwrap(), vec![PathBuf::from("/a")]);

        // Abandoned actions keep their pending state and stay in the tree
        assert_eq!(
            manager.state_of(Path::new("/a")).await,
            Some(ActionState::LocalUpdate)
        );
        assert_eq!(manager.execution_attempts(Path::new("/a")).await, Some(4));
        assert!(manager.is_idle().await);

        engine.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_action_rearmed_by_new_event() {
        let policy = SchedulePolicy {
            max_attempts: 0,
            ..SchedulePolicy::default()
        };
        let (engine, transfer) = start(policy);
        transfer.fail_next(FailureKind::NoPeerConnection, "offline");

        let manager = engine.manager();
        manager.notify(notice("/a", FileEvent::LocalUpdate)).await.unwrap();
        tokio::time::sleep(ms(3000)).await;
        assert_eq!(transfer.calls().len(), 1);

        manager.notify(notice("/a", FileEvent::LocalUpdate)).await.unwrap();
        tokio::time::sleep(ms(3000)).await;
        assert_eq!(transfer.calls().len(), 2);
        assert_eq!(
            manager.state_of(Path::new("/a")).await,
            Some(ActionState::Initial)
        );

        engine.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn retry_then_success_settles() {
        let (engine, transfer) = start(SchedulePolicy::default());
        transfer.fail_next(FailureKind::VersionFork, "diverged");

        engine.manager().notify(notice("/a", FileEvent::RemoteCreate)).await.unwrap();
        tokio::time::sleep(ms(3000)).await;

        let ops = transfer.operations();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0], ops[1]);
        assert_eq!(
            engine.manager().state_of(Path::new("/a")).await,
            Some(ActionState::Initial)
        );

        engine.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_transfer_frees_slot() {
        let policy = SchedulePolicy {
            slot_bound: 1,
            max_attempts: 0,
            ..SchedulePolicy::default()
        };
        let (engine, transfer) = start(policy);
        transfer.panic_on("/a");

        engine.manager().notify(notice("/a", FileEvent::LocalCreate)).await.unwrap();
        engine.manager().notify(notice("/b", FileEvent::LocalCreate)).await.unwrap();

        tokio::time::sleep(ms(5000)).await;
        assert_eq!(transfer.calls_for(Path::new("/b")).len(), 1);
        assert_eq!(
            engine.manager().state_of(Path::new("/a")).await,
            Some(ActionState::LocalCreate)
        );
        assert!(engine.manager().is_idle().await);

        engine.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn executed_delete_removes_component() {
        let (engine, transfer) = start(SchedulePolicy::default());
        engine.manager().notify(notice("/gone", FileEvent::LocalDelete)).await.unwrap();

        tokio::time::sleep(ms(3000)).await;
        assert_eq!(transfer.operations()[0].kind, OperationKind::Delete);
        assert_eq!(engine.manager().state_of(Path::new("/gone")).await, None);
        assert_eq!(engine.manager().stats().await.pending_deletes, 0);

        engine.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn paired_move_executes_once() {
        let (engine, transfer) = start(SchedulePolicy::default());
        let manager = engine.manager();
        let content = ContentHash::of_bytes(b"report");

        manager
            .notify(FileNotice::new("/old.txt", FileEvent::LocalDelete).with_hash(content.clone()))
            .await
            .unwrap();
        tokio::time::sleep(ms(300)).await;
        manager
            .notify(FileNotice::new("/new.txt", FileEvent::LocalCreate).with_hash(content.clone()))
            .await
            .unwrap();

        tokio::time::sleep(ms(5000)).await;
        let ops = transfer.operations();
        assert_eq!(ops.len(), 1);
        assert_eq!(
            ops[0].kind,
            OperationKind::Move {
                source: "/old.txt".into()
            }
        );
        assert_eq!(ops[0].path, Path::new("/new.txt"));

        // The watcher echoing the finished move is ignored
        manager
            .notify(FileNotice::new("/new.txt", FileEvent::LocalCreate).with_hash(content))
            .await
            .unwrap();
        tokio::time::sleep(ms(5000)).await;
        assert_eq!(transfer.operations().len(), 1);

        engine.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn conflict_stalls_until_resolved() {
        let (engine, transfer) = start(SchedulePolicy::default());
        let manager = engine.manager();

        manager.notify(notice("/a", FileEvent::LocalUpdate)).await.unwrap();
        manager.notify(notice("/a", FileEvent::RemoteUpdate)).await.unwrap();

        tokio::time::sleep(ms(5000)).await;
        assert!(transfer.calls().is_empty());
        assert!(manager.is_idle().await);

        manager
            .resolve(Path::new("/a"), Resolution::KeepLocal)
            .await
            .unwrap();
        tokio::time::sleep(ms(3000)).await;

        let ops = transfer.operations();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind, OperationKind::Update);

        engine.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn event_during_execution_runs_after_completion() {
        let (engine, transfer) = start(SchedulePolicy::default());
        transfer.set_delay(ms(1000));
        let manager = engine.manager();

        manager.notify(notice("/a", FileEvent::LocalCreate)).await.unwrap();
        tokio::time::sleep(ms(2500)).await;
        assert_eq!(transfer.calls().len(), 1);

        manager.notify(notice("/a", FileEvent::LocalUpdate)).await.unwrap();
        tokio::time::sleep(ms(5000)).await;

        let ops = transfer.operations();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[1].kind, OperationKind::Update);
        assert_eq!(manager.execution_attempts(Path::new("/a")).await, Some(2));

        engine.shutdown().await.unwrap();
    }

    /// Moves `/a` to `/b` while the create of `/a` is running, then creates
    /// a new `/a`.
    async fn move_while_running(manager: &FileEventManager) {
        manager.notify(notice("/a", FileEvent::LocalCreate)).await.unwrap();
        tokio::time::sleep(ms(2100)).await;
        manager
            .notify(notice(
                "/b",
                FileEvent::LocalMove {
                    old_path: "/a".into(),
                },
            ))
            .await
            .unwrap();
        manager.notify(notice("/a", FileEvent::LocalCreate)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn recreated_path_waits_for_moved_transfer() {
        let policy = SchedulePolicy {
            slot_bound: 2,
            ..SchedulePolicy::default()
        };
        let (engine, transfer) = start(policy);
        transfer.set_delay(ms(5000));
        let manager = engine.manager();

        move_while_running(manager).await;
        tokio::time::sleep(ms(3000)).await;
        // Old transfer of /a still running, new /a must wait for it
        assert_eq!(transfer.calls_for(Path::new("/a")).len(), 1);
        assert!(manager.stats().await.in_flight <= 2);

        tokio::time::sleep(ms(20_000)).await;
        let a = transfer.calls_for(Path::new("/a"));
        assert_eq!(a.len(), 2);
        assert!(a[1].at - a[0].at >= ms(5000), "overlap: {:?}", a[1].at - a[0].at);

        let b = transfer.calls_for(Path::new("/b"));
        assert_eq!(b.len(), 1);
        assert_eq!(
            b[0].operation.kind,
            OperationKind::Move {
                source: "/a".into()
            }
        );
        assert!(transfer.max_concurrent() <= 2);
        assert_eq!(
            manager.state_of(Path::new("/a")).await,
            Some(ActionState::Initial)
        );
        assert!(manager.is_idle().await);

        engine.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stale_completion_leaves_new_transfer_retrying() {
        let policy = SchedulePolicy {
            max_attempts: 3,
            ..SchedulePolicy::default()
        };
        let (engine, transfer) = start(policy);
        transfer.set_delay(ms(5000));
        let manager = engine.manager();

        move_while_running(manager).await;
        let abandoned = Arc::new(Abandoned::default());
        manager
            .add_listener(Path::new("/a"), abandoned.clone())
            .await
            .unwrap();

        // The running call already succeeded from the mock's point of view
        tokio::time::sleep(ms(800)).await;
        transfer.fail_always(FailureKind::PutFailed);

        tokio::time::sleep(ms(40_000)).await;
        // Moved original, then the new create and its three retries
        assert_eq!(transfer.calls_for(Path::new("/a")).len(), 5);
        assert_eq!(*abandoned.paths.lock().unwrap(), vec![PathBuf::from("/a")]);
        assert_eq!(
            manager.state_of(Path::new("/a")).await,
            Some(ActionState::LocalCreate)
        );
        assert!(manager.is_idle().await);

        engine.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_dispatching() {
        let (engine, transfer) = start(SchedulePolicy::default());
        let manager = engine.manager().clone();

        manager.notify(notice("/a", FileEvent::LocalCreate)).await.unwrap();
        engine.shutdown().await.unwrap();

        tokio::time::sleep(ms(5000)).await;
        assert!(transfer.calls().is_empty());
        assert_eq!(manager.stats().await.queued, 1);
    }
}
