//! File events reported by the filesystem watcher and the remote-notification layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Which side of the synchronization a change was observed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Observed on the local filesystem.
    Local,
    /// Reported by a remote peer.
    Remote,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Local => write!(f, "local"),
            Origin::Remote => write!(f, "remote"),
        }
    }
}

/// A single observed change for one path.
///
/// Move events are reported for the *destination* path and carry the path
/// the file was moved away from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileEvent {
    /// A file or folder appeared locally.
    LocalCreate,
    /// A file or folder was removed locally.
    LocalDelete,
    /// File content changed locally.
    LocalUpdate,
    /// A file or folder was moved locally onto this path.
    LocalMove {
        /// Previous location.
        old_path: PathBuf,
    },
    /// A peer created a file or folder.
    RemoteCreate,
    /// A peer removed a file or folder.
    RemoteDelete,
    /// A peer changed file content.
    RemoteUpdate,
    /// A peer moved a file or folder onto this path.
    RemoteMove {
        /// Previous location.
        old_path: PathBuf,
    },
}

impl FileEvent {
    /// Side of the synchronization this event was observed on.
    pub fn origin(&self) -> Origin {
        match self {
            FileEvent::LocalCreate
            | FileEvent::LocalDelete
            | FileEvent::LocalUpdate
            | FileEvent::LocalMove { .. } => Origin::Local,
            FileEvent::RemoteCreate
            | FileEvent::RemoteDelete
            | FileEvent::RemoteUpdate
            | FileEvent::RemoteMove { .. } => Origin::Remote,
        }
    }

    /// Whether this event removes the path.
    pub fn is_delete(&self) -> bool {
        matches!(self, FileEvent::LocalDelete | FileEvent::RemoteDelete)
    }

    /// Source path for move events.
    pub fn moved_from(&self) -> Option<&Path> {
        match self {
            FileEvent::LocalMove { old_path } | FileEvent::RemoteMove { old_path } => {
                Some(old_path)
            }
            _ => None,
        }
    }

    /// Short name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            FileEvent::LocalCreate => "local create",
            FileEvent::LocalDelete => "local delete",
            FileEvent::LocalUpdate => "local update",
            FileEvent::LocalMove { .. } => "local move",
            FileEvent::RemoteCreate => "remote create",
            FileEvent::RemoteDelete => "remote delete",
            FileEvent::RemoteUpdate => "remote update",
            FileEvent::RemoteMove { .. } => "remote move",
        }
    }
}

impl fmt::Display for FileEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.moved_from() {
            Some(old) => write!(f, "{} from {}", self.name(), old.display()),
            None => f.write_str(self.name()),
        }
    }
}
