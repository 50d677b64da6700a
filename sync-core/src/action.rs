//! Per-path action record.
//!
//! An [`Action`] wraps the [`ActionState`] of one path together with the
//! bookkeeping the scheduler needs: when the last event arrived, how often
//! the action was executed, what is currently in flight and who wants to
//! hear about completion.

use crate::listener::ExecutionListener;
use crate::state::{ActionState, Resolution, StateError};
use peersync_types::{FileEvent, Operation};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Pending change for one path.
pub struct Action {
    file_path: PathBuf,
    state: ActionState,
    timestamp: Instant,
    execution_attempts: u32,
    dispatch_attempts: u32,
    in_flight: Option<Operation>,
    dispatch_id: Option<u64>,
    listeners: Vec<Arc<dyn ExecutionListener>>,
}

impl Action {
    /// Create an action in `Initial`, stamped with `now`.
    pub fn new(file_path: impl Into<PathBuf>, now: Instant) -> Self {
        Self {
            file_path: file_path.into(),
            state: ActionState::Initial,
            timestamp: now,
            execution_attempts: 0,
            dispatch_attempts: 0,
            in_flight: None,
            dispatch_id: None,
            listeners: Vec::new(),
        }
    }

    /// Fold an event into the state and stamp the time.
    ///
    /// On error neither the state nor the timestamp change.
    pub fn apply(&mut self, event: &FileEvent, now: Instant) -> Result<(), StateError> {
        self.state = self.state.on_event(event)?;
        self.timestamp = now;
        Ok(())
    }

    /// Leave `Conflict`, making the result eligible for scheduling.
    pub fn resolve(&mut self, resolution: Resolution, now: Instant) -> Result<(), StateError> {
        self.state = self.state.resolve(resolution)?;
        self.timestamp = now;
        Ok(())
    }

    /// Drop the pending change (see [`ActionState::discard`]).
    pub fn discard(&mut self) -> Result<(), StateError> {
        self.state = self.state.discard()?;
        Ok(())
    }

    /// Hand the current state's operation to the caller and enter `Executing`.
    ///
    /// `dispatch_id` names this dispatch; completions carrying a different id
    /// belong to an operation this action no longer owns.
    pub fn execute(&mut self, dispatch_id: u64) -> Result<Operation, StateError> {
        if self.in_flight.is_some() {
            return Err(StateError::AlreadyInFlight {
                path: self.file_path.clone(),
            });
        }
        let (next, operation) = self.state.dispatch(&self.file_path)?;
        self.state = next;
        self.execution_attempts = self.execution_attempts.saturating_add(1);
        self.dispatch_attempts = 1;
        self.in_flight = Some(operation.clone());
        self.dispatch_id = Some(dispatch_id);
        Ok(operation)
    }

    /// Execute the in-flight operation again after a failure.
    pub fn retry(&mut self) -> Option<Operation> {
        let operation = self.in_flight.clone()?;
        self.execution_attempts = self.execution_attempts.saturating_add(1);
        self.dispatch_attempts = self.dispatch_attempts.saturating_add(1);
        Some(operation)
    }

    /// The in-flight operation succeeded.
    ///
    /// Returns `true` if the action settled back to `Initial`, `false` if a
    /// newer event arrived in the meantime and is still pending.
    pub fn complete(&mut self) -> bool {
        self.in_flight = None;
        self.dispatch_id = None;
        self.dispatch_attempts = 0;
        if self.state.is_executing() {
            self.state = ActionState::Initial;
            true
        } else {
            false
        }
    }

    /// Give up on the in-flight operation.
    ///
    /// If no newer event arrived, the state before dispatch is restored so a
    /// fresh event can re-arm the action.
    pub fn abandon(&mut self) -> Option<Operation> {
        self.dispatch_attempts = 0;
        self.dispatch_id = None;
        let operation = self.in_flight.take();
        if let ActionState::Executing { resume, .. } = &self.state {
            self.state = (**resume).clone();
        }
        operation
    }

    /// Drop the in-flight operation without settling the state.
    ///
    /// Used when the path is re-keyed while a transfer runs: the completion
    /// reports the old path and never reaches this action.
    pub fn detach(&mut self) -> Option<Operation> {
        self.dispatch_attempts = 0;
        self.dispatch_id = None;
        self.in_flight.take()
    }

    /// Register a completion listener. Returns `false` if already registered.
    pub fn add_listener(&mut self, listener: Arc<dyn ExecutionListener>) -> bool {
        if self.listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            return false;
        }
        self.listeners.push(listener);
        true
    }

    /// Registered listeners, for notifying outside of any lock.
    pub fn listeners(&self) -> Vec<Arc<dyn ExecutionListener>> {
        self.listeners.clone()
    }

    /// Follow the component to a new path.
    pub fn rename(&mut self, file_path: impl Into<PathBuf>) {
        self.file_path = file_path.into();
    }

    /// Time since the last event.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.timestamp)
    }

    /// Path this action belongs to.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Current state.
    pub fn state(&self) -> &ActionState {
        &self.state
    }

    /// Time of the last event.
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Number of executions over the action's lifetime.
    pub fn execution_attempts(&self) -> u32 {
        self.execution_attempts
    }

    /// Executions since the current dispatch (0 when idle).
    pub fn dispatch_attempts(&self) -> u32 {
        self.dispatch_attempts
    }

    /// The operation currently with the transfer layer.
    pub fn in_flight(&self) -> Option<&Operation> {
        self.in_flight.as_ref()
    }

    /// Id of the dispatch currently in flight.
    pub fn dispatch_id(&self) -> Option<u64> {
        self.dispatch_id
    }

    /// Whether a completion for `dispatch_id` belongs to this action.
    pub fn owns(&self, dispatch_id: u64) -> bool {
        self.dispatch_id == Some(dispatch_id)
    }

    /// Check if an operation is with the transfer layer.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("file_path", &self.file_path)
            .field("state", &self.state)
            .field("timestamp", &self.timestamp)
            .field("execution_attempts", &self.execution_attempts)
            .field("dispatch_attempts", &self.dispatch_attempts)
            .field("in_flight", &self.in_flight)
            .field("dispatch_id", &self.dispatch_id)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
