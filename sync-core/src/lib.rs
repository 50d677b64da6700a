//! # sync-core
//!
//! Pure logic for peersync (no I/O, no async, instant tests).
//!
//! This crate holds the per-path action state machine and the data
//! structures the scheduler is built from:
//! - [`ActionState`] - closed set of pending-change states and their transitions
//! - [`Action`] - per-path record: state, timestamp, attempts, listeners
//! - [`FileTree`] - in-memory mirror of the synchronized folder
//! - [`DeleteIndex`] - pending deletes by content hash, for move detection
//! - [`ReadyQueue`], [`ExecutionSlots`] - deadline queue and bounded in-flight set
//! - [`SchedulePolicy`] - stability window, retry budget, slot bound
//!
//! Time is always passed in by the caller. The async side (`sync-client`)
//! owns the clock, the locks and the transfer calls.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod action;
pub mod deleted;
pub mod listener;
pub mod policy;
pub mod queue;
pub mod state;
pub mod tree;

pub use action::Action;
pub use deleted::DeleteIndex;
pub use listener::ExecutionListener;
pub use policy::SchedulePolicy;
pub use queue::{ExecutionSlots, ReadyQueue};
pub use state::{ActionState, Resolution, StateError};
pub use tree::{FileComponent, FileTree, TreeError};
