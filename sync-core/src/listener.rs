//! Completion callbacks for executed operations.

use peersync_types::{Operation, TransferFailure};
use std::path::Path;

/// Subscriber notified when an action's operation finishes.
///
/// Registered per action; the same listener (by `Arc` identity) is only
/// notified once per completion no matter how often it was registered.
pub trait ExecutionListener: Send + Sync {
    /// The transfer layer reported success.
    fn on_execute_succeeded(&self, path: &Path, operation: &Operation);

    /// One attempt failed. The scheduler may still retry.
    fn on_execute_failed(&self, path: &Path, operation: &Operation, failure: &TransferFailure);

    /// All attempts failed and the operation was given up.
    fn on_execute_abandoned(&self, _path: &Path, _operation: &Operation, _failure: &TransferFailure) {}
}
