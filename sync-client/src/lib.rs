//! # sync-client
//!
//! The runtime side of peersync: turns file events into debounced,
//! bounded, retried calls on a transfer layer.
//!
//! ## Pieces
//!
//! - **[`FileEventManager`]**: entry point for watchers. Feeds events into the
//!   per-path state machine, pairs deletes with creates into moves, and
//!   queues paths for the executor.
//! - **[`ActionExecutor`]**: single consumer loop. Waits out the stability
//!   window, keeps the number of in-flight operations bounded, retries
//!   failures and gives up after the configured number of attempts.
//! - **[`TransferDelegate`]**: the seam to whatever actually moves bytes
//!   ([`MockTransfer`] for tests).
//! - **[`Engine`]**: wires the three together.
//!
//! ## Example
//!
//! ```ignore
//! use peersync_client::{Engine, FileNotice, MockTransfer};
//! use peersync_core::SchedulePolicy;
//! use peersync_types::FileEvent;
//!
//! let transfer = Arc::new(MockTransfer::new());
//! let engine = Engine::start("/sync", SchedulePolicy::default(), transfer);
//!
//! engine
//!     .manager()
//!     .notify(FileNotice::new("/sync/a.txt", FileEvent::LocalCreate))
//!     .await?;
//!
//! engine.wait_idle().await;
//! engine.shutdown().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod manager;
pub mod transfer;

mod shared;

pub use config::{Config, ConfigError, ExecutorConfig, LoggingConfig};
pub use engine::Engine;
pub use error::EngineError;
pub use executor::{ActionExecutor, ExecutorHandle};
pub use manager::{EngineStats, FileEventManager, FileNotice};
pub use transfer::{perform, MockTransfer, RecordedCall, TransferDelegate};
