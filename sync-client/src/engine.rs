//! Explicit wiring of manager, executor and transfer delegate.

use crate::error::EngineError;
use crate::executor::{ActionExecutor, ExecutorHandle};
use crate::manager::FileEventManager;
use crate::transfer::TransferDelegate;
use peersync_core::SchedulePolicy;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// How often [`Engine::wait_idle`] looks at the queue.
const IDLE_POLL: Duration = Duration::from_millis(50);

/// A running engine: one manager for producers, one executor task.
#[derive(Debug)]
pub struct Engine {
    manager: FileEventManager,
    executor: ExecutorHandle,
}

impl Engine {
    /// Build the engine for `root` and start the executor loop.
    pub fn start(
        root: impl Into<PathBuf>,
        policy: SchedulePolicy,
        delegate: Arc<dyn TransferDelegate>,
    ) -> Self {
        let manager = FileEventManager::new(root, policy);
        let executor = ActionExecutor::new(&manager, delegate).spawn();
        Self { manager, executor }
    }

    /// The producer side. Clone it to hand to watchers.
    pub fn manager(&self) -> &FileEventManager {
        &self.manager
    }

    /// Wait until nothing is queued and nothing is in flight.
    ///
    /// Paths stalled in conflict or abandoned after failures do not keep
    /// the engine busy.
    pub async fn wait_idle(&self) {
        while !self.manager.is_idle().await {
            tokio::time::sleep(IDLE_POLL).await;
        }
    }

    /// Stop the executor loop.
    pub async fn shutdown(self) -> Result<(), EngineError> {
        self.executor.shutdown().await
    }
}
