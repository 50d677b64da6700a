//! Failure reporting from the transfer layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a failed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Writing to the network failed
    PutFailed,
    /// Reading from the network failed
    GetFailed,
    /// The parent folder is unknown to the peers
    ParentNotFound,
    /// Concurrent versions diverged
    VersionFork,
    /// No active session with the synchronization engine
    NoSession,
    /// No peer reachable
    NoPeerConnection,
    /// Path lies outside the synchronized root
    IllegalFileLocation,
    /// Unexpected failure inside the engine (including a panicking transfer)
    Internal,
}

impl FailureKind {
    /// Short name used in log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::PutFailed => "put failed",
            FailureKind::GetFailed => "get failed",
            FailureKind::ParentNotFound => "parent not found",
            FailureKind::VersionFork => "version fork",
            FailureKind::NoSession => "no session",
            FailureKind::NoPeerConnection => "no peer connection",
            FailureKind::IllegalFileLocation => "illegal file location",
            FailureKind::Internal => "internal",
        }
    }
}

/// A transfer attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{}: {message}", kind.as_str())]
pub struct TransferFailure {
    /// What went wrong.
    pub kind: FailureKind,
    /// Human-readable detail.
    pub message: String,
}

impl TransferFailure {
    /// Create a new failure.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Failure raised by the engine itself rather than the network.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Internal, message)
    }
}
