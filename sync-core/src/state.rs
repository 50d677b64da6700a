//! Per-path action state machine.
//!
//! Every path known to the engine has exactly one [`ActionState`]. Incoming
//! [`FileEvent`]s are folded into it by [`ActionState::on_event`], which is a
//! pure function: it returns the next state, or a [`StateError`] if the event
//! cannot follow the current state. The caller keeps the old state on error.
//!
//! Local and remote histories are kept apart. A remote event arriving on top
//! of a pending local change (or vice versa) is a conflict, and `Conflict`
//! absorbs everything until [`ActionState::resolve`] is called.

use peersync_types::{FileEvent, Operation, OperationKind, Origin};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// The event cannot follow the current state.
    #[error("illegal transition: {event} while in {state}")]
    IllegalTransition {
        /// State the action was in.
        state: &'static str,
        /// Event that was rejected.
        event: String,
    },

    /// `resolve` was called on an action that is not in conflict.
    #[error("cannot resolve {state}: not a conflict")]
    NotInConflict {
        /// State the action was in.
        state: &'static str,
    },

    /// The state has no operation to hand to the transfer layer.
    #[error("nothing to execute in state {state}")]
    NotExecutable {
        /// State the action was in.
        state: &'static str,
    },

    /// An operation for this action is already with the transfer layer.
    #[error("operation already in flight for {path}")]
    AlreadyInFlight {
        /// Path of the action.
        path: PathBuf,
    },
}

/// How to leave the `Conflict` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Propagate the local version.
    KeepLocal,
    /// Accept the remote version.
    KeepRemote,
    /// Drop both and start over.
    Discard,
}

/// State of one pending change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActionState {
    /// Nothing pending.
    #[default]
    Initial,
    /// Created locally.
    LocalCreate,
    /// Deleted locally.
    LocalDelete,
    /// Modified locally.
    LocalUpdate,
    /// Moved locally from `source`.
    LocalMove {
        /// Previous location.
        source: PathBuf,
    },
    /// Created by a peer.
    RemoteCreate,
    /// Deleted by a peer.
    RemoteDelete,
    /// Modified by a peer.
    RemoteUpdate,
    /// Moved by a peer from `source`.
    RemoteMove {
        /// Previous location.
        source: PathBuf,
    },
    /// Local and remote changes collided.
    Conflict,
    /// `operation` has been handed to the transfer layer.
    Executing {
        /// The operation in flight.
        operation: Operation,
        /// State to fall back to if the operation is abandoned.
        resume: Box<ActionState>,
    },
}

/// The change a pending state or an event stands for, without its side.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Change {
    Create,
    Delete,
    Update,
    Move(PathBuf),
}

impl Change {
    fn of_event(event: &FileEvent) -> Self {
        match event {
            FileEvent::LocalCreate | FileEvent::RemoteCreate => Change::Create,
            FileEvent::LocalDelete | FileEvent::RemoteDelete => Change::Delete,
            FileEvent::LocalUpdate | FileEvent::RemoteUpdate => Change::Update,
            FileEvent::LocalMove { old_path } | FileEvent::RemoteMove { old_path } => {
                Change::Move(old_path.clone())
            }
        }
    }
}

impl ActionState {
    /// Create a new state machine in `Initial`.
    pub fn new() -> Self {
        Self::Initial
    }

    /// Fold one event into the state.
    pub fn on_event(&self, event: &FileEvent) -> Result<Self, StateError> {
        if self.is_conflict() {
            return Ok(Self::Conflict);
        }
        let Some((side, change)) = self.pending_change() else {
            // Initial and Executing start a fresh history
            return Ok(Self::entered_by(event));
        };

        if event.origin() != side {
            // Both sides moved the same file away from the same place
            if let (Change::Move(ours), Some(theirs)) = (&change, event.moved_from()) {
                if ours == theirs {
                    return Ok(self.clone());
                }
            }
            return Ok(Self::Conflict);
        }

        let next = match (change, Change::of_event(event)) {
            (Change::Update | Change::Move(_), Change::Move(_)) => {
                return Err(StateError::IllegalTransition {
                    state: self.name(),
                    event: event.to_string(),
                });
            }
            (_, Change::Delete) => Change::Delete,
            (Change::Create | Change::Delete, Change::Move(source)) => Change::Move(source),
            (Change::Delete, Change::Create) => Change::Update,
            (current, _) => current,
        };

        Ok(Self::pending(side, next))
    }

    /// Leave `Conflict`.
    pub fn resolve(&self, resolution: Resolution) -> Result<Self, StateError> {
        if !self.is_conflict() {
            return Err(StateError::NotInConflict { state: self.name() });
        }
        Ok(match resolution {
            Resolution::KeepLocal => Self::LocalUpdate,
            Resolution::KeepRemote => Self::RemoteUpdate,
            Resolution::Discard => Self::Initial,
        })
    }

    /// Drop a pending change without executing it.
    ///
    /// Used when a parent folder's move already covers this path. Conflicts
    /// and operations in flight are left alone.
    pub fn discard(&self) -> Result<Self, StateError> {
        match self {
            Self::Conflict | Self::Executing { .. } => Err(StateError::IllegalTransition {
                state: self.name(),
                event: "discard".into(),
            }),
            _ => Ok(Self::Initial),
        }
    }

    /// Operation this state would hand to the transfer layer for `path`.
    ///
    /// `None` for `Initial`, `Conflict` and `Executing`.
    pub fn operation(&self, path: &Path) -> Option<Operation> {
        let (origin, change) = self.pending_change()?;
        let kind = match change {
            Change::Create => OperationKind::Create,
            Change::Delete => OperationKind::Delete,
            Change::Update => OperationKind::Update,
            Change::Move(source) => OperationKind::Move { source },
        };
        Some(Operation::new(kind, path, origin))
    }

    /// Move to `Executing`, returning the operation to run.
    pub fn dispatch(&self, path: &Path) -> Result<(Self, Operation), StateError> {
        let operation = self
            .operation(path)
            .ok_or(StateError::NotExecutable { state: self.name() })?;
        let next = Self::Executing {
            operation: operation.clone(),
            resume: Box::new(self.clone()),
        };
        Ok((next, operation))
    }

    /// Whether this state carries an operation.
    pub fn is_executable(&self) -> bool {
        self.pending_change().is_some()
    }

    /// Check if in `Conflict`.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict)
    }

    /// Check if in `Executing`.
    pub fn is_executing(&self) -> bool {
        matches!(self, Self::Executing { .. })
    }

    /// Check if in `Initial`.
    pub fn is_initial(&self) -> bool {
        matches!(self, Self::Initial)
    }

    /// Check if this is a pending local delete.
    pub fn is_local_delete(&self) -> bool {
        matches!(self, Self::LocalDelete)
    }

    /// Side of a pending change.
    pub fn origin(&self) -> Option<Origin> {
        self.pending_change().map(|(origin, _)| origin)
    }

    /// Short name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::LocalCreate => "local create",
            Self::LocalDelete => "local delete",
            Self::LocalUpdate => "local update",
            Self::LocalMove { .. } => "local move",
            Self::RemoteCreate => "remote create",
            Self::RemoteDelete => "remote delete",
            Self::RemoteUpdate => "remote update",
            Self::RemoteMove { .. } => "remote move",
            Self::Conflict => "conflict",
            Self::Executing { .. } => "executing",
        }
    }

    fn entered_by(event: &FileEvent) -> Self {
        Self::pending(event.origin(), Change::of_event(event))
    }

    fn pending(side: Origin, change: Change) -> Self {
        match (side, change) {
            (Origin::Local, Change::Create) => Self::LocalCreate,
            (Origin::Local, Change::Delete) => Self::LocalDelete,
            (Origin::Local, Change::Update) => Self::LocalUpdate,
            (Origin::Local, Change::Move(source)) => Self::LocalMove { source },
            (Origin::Remote, Change::Create) => Self::RemoteCreate,
            (Origin::Remote, Change::Delete) => Self::RemoteDelete,
            (Origin::Remote, Change::Update) => Self::RemoteUpdate,
            (Origin::Remote, Change::Move(source)) => Self::RemoteMove { source },
        }
    }

    fn pending_change(&self) -> Option<(Origin, Change)> {
        Some(match self {
            Self::LocalCreate => (Origin::Local, Change::Create),
            Self::LocalDelete => (Origin::Local, Change::Delete),
            Self::LocalUpdate => (Origin::Local, Change::Update),
            Self::LocalMove { source } => (Origin::Local, Change::Move(source.clone())),
            Self::RemoteCreate => (Origin::Remote, Change::Create),
            Self::RemoteDelete => (Origin::Remote, Change::Delete),
            Self::RemoteUpdate => (Origin::Remote, Change::Update),
            Self::RemoteMove { source } => (Origin::Remote, Change::Move(source.clone())),
            Self::Initial | Self::Conflict | Self::Executing { .. } => return None,
        })
    }
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalMove { source } | Self::RemoteMove { source } => {
                write!(f, "{} from {}", self.name(), source.display())
            }
            Self::Executing { operation, .. } => write!(f, "executing {operation}"),
            _ => f.write_str(self.name()),
        }
    }
}
