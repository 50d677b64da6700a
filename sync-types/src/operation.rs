//! Operations handed to the transfer layer.

use crate::event::Origin;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// What the transfer layer should do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationKind {
    /// Propagate a new file or folder.
    Create,
    /// Propagate changed content.
    Update,
    /// Propagate a removal.
    Delete,
    /// Propagate a move from `source`.
    Move {
        /// Previous location.
        source: PathBuf,
    },
}

/// One executable unit of work for a single path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// What to do.
    #[serde(flatten)]
    pub kind: OperationKind,
    /// Target path (destination for moves).
    pub path: PathBuf,
    /// Side the change was observed on.
    pub origin: Origin,
}

impl Operation {
    /// Create a new operation.
    pub fn new(kind: OperationKind, path: impl Into<PathBuf>, origin: Origin) -> Self {
        Self {
            kind,
            path: path.into(),
            origin,
        }
    }

    /// Whether this operation removes the path.
    pub fn is_delete(&self) -> bool {
        matches!(self.kind, OperationKind::Delete)
    }

    /// Source path of a move.
    pub fn source(&self) -> Option<&Path> {
        match &self.kind {
            OperationKind::Move { source } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            OperationKind::Create => write!(f, "{} create {}", self.origin, self.path.display()),
            OperationKind::Update => write!(f, "{} update {}", self.origin, self.path.display()),
            OperationKind::Delete => write!(f, "{} delete {}", self.origin, self.path.display()),
            OperationKind::Move { source } => write!(
                f,
                "{} move {} -> {}",
                self.origin,
                source.display(),
                self.path.display()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_display() {
        let op = Operation::new(
            OperationKind::Move {
                source: "/old".into(),
            },
            "/new",
            Origin::Local,
        );
        assert_eq!(op.to_string(), "local move /old -> /new");
        assert_eq!(op.source(), Some(Path::new("/old")));
    }

    #[test]
    fn flattened_json() {
        let op = Operation::new(OperationKind::Delete, "/gone", Origin::Remote);
        let json = serde_json::to_string(&op).unwrap();
        assert_eq!(json, r#"{"kind":"delete","path":"/gone","origin":"remote"}"#);
        assert!(op.is_delete());
    }
}
