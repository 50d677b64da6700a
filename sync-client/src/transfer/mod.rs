//! Transfer abstraction for peersync.
//!
//! The engine decides *when* a change is propagated; a [`TransferDelegate`]
//! decides *how*. Each call resolves exactly once, and that resolution is
//! the completion the executor waits for.
//!
//! # Example
//!
//! ```ignore
//! let transfer = MockTransfer::new();
//! transfer.fail_next(FailureKind::NoPeerConnection, "offline");
//! let result = perform(&transfer, &operation).await;
//! ```

mod mock;

pub use mock::{MockTransfer, RecordedCall};

use async_trait::async_trait;
use peersync_types::{Operation, OperationKind, Origin, TransferFailure};
use std::path::Path;

/// The layer that actually propagates changes (network puts and gets).
#[async_trait]
pub trait TransferDelegate: Send + Sync {
    /// Propagate a newly created file or folder.
    async fn create(&self, path: &Path, origin: Origin) -> Result<(), TransferFailure>;

    /// Propagate changed content.
    async fn update(&self, path: &Path, origin: Origin) -> Result<(), TransferFailure>;

    /// Propagate a removal.
    async fn delete(&self, path: &Path, origin: Origin) -> Result<(), TransferFailure>;

    /// Propagate a move from `from` to `to`.
    async fn move_file(&self, from: &Path, to: &Path, origin: Origin)
        -> Result<(), TransferFailure>;
}

/// Run `operation` against `delegate`.
pub async fn perform(
    delegate: &dyn TransferDelegate,
    operation: &Operation,
) -> Result<(), TransferFailure> {
    let path = operation.path.as_path();
    match &operation.kind {
        OperationKind::Create => delegate.create(path, operation.origin).await,
        OperationKind::Update => delegate.update(path, operation.origin).await,
        OperationKind::Delete => delegate.delete(path, operation.origin).await,
        OperationKind::Move { source } => delegate.move_file(source, path, operation.origin).await,
    }
}
