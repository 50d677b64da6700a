//! Error types for sync-client.

use crate::config::ConfigError;
use peersync_core::{StateError, TreeError};
use std::path::PathBuf;

/// Main error type for engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The event or request does not fit the path's current state.
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// The path cannot be placed in the file tree.
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No component is known at the path.
    #[error("unknown path: {0}")]
    UnknownPath(PathBuf),

    /// The executor task ended abnormally.
    #[error("executor task failed: {0}")]
    Executor(String),
}
