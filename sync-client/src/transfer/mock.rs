//! Mock transfer delegate for testing.
//!
//! Records every call, and can be scripted to fail, panic or take time.

use super::TransferDelegate;
use async_trait::async_trait;
use peersync_types::{FailureKind, Operation, OperationKind, Origin, TransferFailure};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// One call received by [`MockTransfer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// The operation that was requested.
    pub operation: Operation,
    /// When the call started.
    pub at: Instant,
}

/// Mock transfer delegate.
///
/// Clones share state, so a test can keep one handle while the engine owns
/// another.
#[derive(Debug, Default, Clone)]
pub struct MockTransfer {
    inner: Arc<Mutex<MockTransferInner>>,
}

#[derive(Debug, Default)]
struct MockTransferInner {
    calls: Vec<RecordedCall>,
    scripted_failures: VecDeque<TransferFailure>,
    fail_always: Option<FailureKind>,
    panic_paths: HashSet<PathBuf>,
    delay: Duration,
    active: usize,
    max_active: usize,
}

impl MockTransfer {
    /// Create a new mock that succeeds immediately.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockTransferInner> {
        // A panicking call never holds the lock, but stay usable regardless
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Cause the next call to fail.
    pub fn fail_next(&self, kind: FailureKind, message: &str) {
        self.lock()
            .scripted_failures
            .push_back(TransferFailure::new(kind, message));
    }

    /// Cause every call to fail until [`MockTransfer::succeed`] is called.
    pub fn fail_always(&self, kind: FailureKind) {
        self.lock().fail_always = Some(kind);
    }

    /// Stop failing every call.
    pub fn succeed(&self) {
        self.lock().fail_always = None;
    }

    /// Panic inside any call for `path`.
    pub fn panic_on(&self, path: impl Into<PathBuf>) {
        self.lock().panic_paths.insert(path.into());
    }

    /// Make every call take `delay` before resolving.
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = delay;
    }

    /// All calls received so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Operations received so far.
    pub fn operations(&self) -> Vec<Operation> {
        self.lock()
            .calls
            .iter()
            .map(|c| c.operation.clone())
            .collect()
    }

    /// Calls whose target is `path`.
    pub fn calls_for(&self, path: &Path) -> Vec<RecordedCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation.path == path)
            .cloned()
            .collect()
    }

    /// Highest number of calls that were running at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.lock().max_active
    }

    /// Clear all recorded calls and scripting.
    pub fn reset(&self) {
        *self.lock() = MockTransferInner::default();
    }

    async fn record(&self, operation: Operation) -> Result<(), TransferFailure> {
        let (delay, outcome) = {
            let mut inner = self.lock();
            let panics = inner.panic_paths.contains(&operation.path);
            inner.calls.push(RecordedCall {
                operation: operation.clone(),
                at: Instant::now(),
            });
            if panics {
                drop(inner);
                panic!("mock transfer panicked on {}", operation.path.display());
            }

            inner.active += 1;
            inner.max_active = inner.max_active.max(inner.active);
            let outcome = match inner.scripted_failures.pop_front() {
                Some(failure) => Err(failure),
                None => match inner.fail_always {
                    Some(kind) => Err(TransferFailure::new(kind, "scripted failure")),
                    None => Ok(()),
                },
            };
            (inner.delay, outcome)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.lock().active -= 1;
        outcome
    }
}

#[async_trait]
impl TransferDelegate for MockTransfer {
    async fn create(&self, path: &Path, origin: Origin) -> Result<(), TransferFailure> {
        self.record(Operation::new(OperationKind::Create, path, origin))
            .await
    }

    async fn update(&self, path: &Path, origin: Origin) -> Result<(), TransferFailure> {
        self.record(Operation::new(OperationKind::Update, path, origin))
            .await
    }

    async fn delete(&self, path: &Path, origin: Origin) -> Result<(), TransferFailure> {
        self.record(Operation::new(OperationKind::Delete, path, origin))
            .await
    }

    async fn move_file(
        &self,
        from: &Path,
        to: &Path,
        origin: Origin,
    ) -> Result<(), TransferFailure> {
        let kind = OperationKind::Move {
            source: from.to_path_buf(),
        };
        self.record(Operation::new(kind, to, origin)).await
    }
}
