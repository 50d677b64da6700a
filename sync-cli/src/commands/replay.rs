//! Replay a recorded event log against a dry-run transfer layer.
//!
//! Each line of the log is one JSON object:
//!
//! ```json
//! { "at_ms": 0, "path": "/docs/a.txt", "event": { "kind": "local_create" }, "hash": "..." }
//! ```
//!
//! `is_folder` defaults to false. Instead of a precomputed `hash`, a line may
//! carry `content`, which is hashed the same way file contents are. Blank
//! lines and lines starting with `#` are skipped.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use peersync_client::{Config, Engine, FileNotice, TransferDelegate};
use peersync_types::{
    ContentHash, FailureKind, FileEvent, Operation, OperationKind, Origin, TransferFailure,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// One line of the event log.
#[derive(Debug, Clone, Deserialize)]
struct LoggedEvent {
    /// Offset from the start of the replay.
    #[serde(default)]
    at_ms: u64,
    path: PathBuf,
    event: FileEvent,
    #[serde(default)]
    is_folder: bool,
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

impl LoggedEvent {
    fn into_notice(self) -> FileNotice {
        let content_hash = match (self.hash, self.content) {
            (Some(hash), _) => ContentHash::new(hash),
            (None, Some(content)) => ContentHash::of_bytes(content.as_bytes()),
            (None, None) => ContentHash::empty(),
        };
        let mut notice = FileNotice::new(self.path, self.event).with_hash(content_hash);
        if self.is_folder {
            notice = notice.folder();
        }
        notice
    }
}

/// Parse the log, keeping line numbers for error messages.
fn parse_log(text: &str) -> Result<Vec<LoggedEvent>> {
    let mut events = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event: LoggedEvent = serde_json::from_str(line)
            .with_context(|| format!("Invalid event on line {}", index + 1))?;
        events.push(event);
    }
    Ok(events)
}

/// Outcome of one transfer call.
#[derive(Debug, Clone)]
struct Attempt {
    operation: Operation,
    failure: Option<TransferFailure>,
}

/// Transfer layer that only records what it was asked to do.
#[derive(Debug, Default)]
struct DryRunTransfer {
    fail_every: Option<u32>,
    calls: AtomicU32,
    attempts: Mutex<Vec<Attempt>>,
}

impl DryRunTransfer {
    fn new(fail_every: Option<u32>) -> Self {
        Self {
            fail_every,
            ..Self::default()
        }
    }

    fn record(&self, operation: Operation) -> Result<(), TransferFailure> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let failure = match self.fail_every {
            Some(n) if n > 0 && call % n == 0 => Some(TransferFailure::new(
                FailureKind::PutFailed,
                format!("injected failure on call {call}"),
            )),
            _ => None,
        };

        match &failure {
            Some(failure) => tracing::warn!(%operation, %failure, "dry-run transfer failed"),
            None => tracing::info!(%operation, "dry-run transfer"),
        }

        self.attempts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Attempt {
                operation,
                failure: failure.clone(),
            });

        match failure {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }

    fn attempts(&self) -> Vec<Attempt> {
        self.attempts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl TransferDelegate for DryRunTransfer {
    async fn create(&self, path: &Path, origin: Origin) -> Result<(), TransferFailure> {
        self.record(Operation::new(OperationKind::Create, path, origin))
    }

    async fn update(&self, path: &Path, origin: Origin) -> Result<(), TransferFailure> {
        self.record(Operation::new(OperationKind::Update, path, origin))
    }

    async fn delete(&self, path: &Path, origin: Origin) -> Result<(), TransferFailure> {
        self.record(Operation::new(OperationKind::Delete, path, origin))
    }

    async fn move_file(&self, from: &Path, to: &Path, origin: Origin) -> Result<(), TransferFailure> {
        let kind = OperationKind::Move {
            source: from.to_path_buf(),
        };
        self.record(Operation::new(kind, to, origin))
    }
}

/// Run the replay command.
pub async fn run(
    config: &Config,
    events: &Path,
    root: PathBuf,
    fail_every: Option<u32>,
) -> Result<()> {
    if fail_every == Some(0) {
        bail!("--fail-every must be at least 1");
    }

    let text = tokio::fs::read_to_string(events)
        .await
        .with_context(|| format!("Failed to read event log {}", events.display()))?;
    let log = parse_log(&text)?;

    tracing::info!(
        events = log.len(),
        root = %root.display(),
        "Replaying event log"
    );

    let transfer = Arc::new(DryRunTransfer::new(fail_every));
    let engine = Engine::start(root, config.policy(), transfer.clone());

    let start = Instant::now();
    for entry in log {
        tokio::time::sleep_until(start + Duration::from_millis(entry.at_ms)).await;
        let notice = entry.into_notice();
        if let Err(e) = engine.manager().notify(notice.clone()).await {
            tracing::warn!(path = %notice.path.display(), event = %notice.event, error = %e, "Event rejected");
        }
    }

    engine.wait_idle().await;
    let stats = engine.manager().stats().await;
    engine.shutdown().await?;

    let attempts = transfer.attempts();
    let failed = attempts.iter().filter(|a| a.failure.is_some()).count();
    for attempt in &attempts {
        match &attempt.failure {
            None => println!("ok      {}", attempt.operation),
            Some(failure) => println!("failed  {}: {}", attempt.operation, failure),
        }
    }
    println!(
        "{} operations executed, {} failed attempts",
        attempts.len() - failed,
        failed
    );
    if stats.conflicts > 0 {
        println!("{} paths in conflict", stats.conflicts);
    }

    Ok(())
}
