//! # sync-types
//!
//! Shared vocabulary for the peersync change-reconciliation engine.
//!
//! This crate provides the foundational types used across all peersync crates:
//! - [`FileEvent`], [`Origin`] - What a watcher observed, and on which side
//! - [`ContentHash`], [`FileInfo`] - Content fingerprints used for move detection
//! - [`Operation`], [`OperationKind`] - What gets handed to the transfer layer
//! - [`TransferFailure`], [`FailureKind`] - How the transfer layer reports failure

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod event;
mod hash;
mod operation;

pub use error::{FailureKind, TransferFailure};
pub use event::{FileEvent, Origin};
pub use hash::{ContentHash, FileInfo};
pub use operation::{Operation, OperationKind};
