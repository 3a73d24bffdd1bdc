//! Pipeline worker: claims pending entries and drives them through the
//! orchestrator with bounded concurrency.
//!
//! `submit` returns as soon as an entry is persisted in `Pending`; this
//! worker is the supervised background half of that contract. It polls for
//! claimable entries, processes up to `max_concurrent` at a time, and only
//! sleeps when the queue is empty.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use folio_core::defaults::{
    ENTRY_TIMEOUT_SECS, EVENT_BUS_CAPACITY, WORKER_MAX_CONCURRENT, WORKER_POLL_INTERVAL_MS,
};
use folio_core::{EntryState, IngestMode};

use crate::orchestrator::IngestionOrchestrator;

/// Configuration for the pipeline worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Polling interval in milliseconds when the queue is empty.
    pub poll_interval_ms: u64,
    /// Maximum number of concurrently processed entries.
    pub max_concurrent: usize,
    /// Whether to enable entry processing.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: WORKER_POLL_INTERVAL_MS,
            max_concurrent: WORKER_MAX_CONCURRENT,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `FOLIO_WORKER_ENABLED` | `true` | Enable/disable entry processing |
    /// | `FOLIO_WORKER_MAX_CONCURRENT` | `4` | Max concurrent entries |
    /// | `FOLIO_WORKER_POLL_INTERVAL_MS` | `500` | Polling interval when idle |
    pub fn from_env() -> Self {
        let enabled = std::env::var("FOLIO_WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let max_concurrent = std::env::var("FOLIO_WORKER_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(WORKER_MAX_CONCURRENT)
            .max(1);

        let poll_interval_ms = std::env::var("FOLIO_WORKER_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(WORKER_POLL_INTERVAL_MS);

        Self {
            poll_interval_ms,
            max_concurrent,
            enabled,
        }
    }

    /// Create a new config with custom poll interval.
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set maximum concurrent entries.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Enable or disable entry processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the pipeline worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// An entry was claimed and processing started.
    EntryStarted { entry_id: Uuid },
    /// An entry reached `Completed`.
    EntryCompleted { entry_id: Uuid },
    /// An entry reached `Failed`.
    EntryFailed { entry_id: Uuid },
    /// Worker started.
    WorkerStarted,
    /// Worker stopped.
    WorkerStopped,
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
}

impl WorkerHandle {
    /// Signal the worker to shut down gracefully.
    pub async fn shutdown(&self) -> folio_core::Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| folio_core::Error::Internal("Failed to send shutdown signal".into()))
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Background worker processing pending entries.
pub struct PipelineWorker {
    orchestrator: Arc<IngestionOrchestrator>,
    config: WorkerConfig,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl PipelineWorker {
    /// Create a new worker over an orchestrator.
    pub fn new(orchestrator: Arc<IngestionOrchestrator>, config: WorkerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            orchestrator,
            config,
            event_tx,
        }
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
        }
    }

    /// Run the worker loop with concurrent entry processing.
    ///
    /// Claims up to `max_concurrent` entries at a time and processes them
    /// concurrently. Only sleeps when the queue is empty.
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Pipeline worker is disabled, not starting");
            return;
        }

        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            max_concurrent = self.config.max_concurrent,
            "Pipeline worker started"
        );
        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let repo = self.orchestrator.repository();

        loop {
            if shutdown_rx.try_recv().is_ok() {
                info!("Pipeline worker received shutdown signal");
                break;
            }

            let mut claimed = 0;
            let mut tasks = tokio::task::JoinSet::new();

            for _ in 0..self.config.max_concurrent {
                let entry = match repo.claim_next_pending().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        error!(error = %e, "Failed to claim pending entry");
                        break;
                    }
                };

                claimed += 1;
                let orchestrator = self.orchestrator.clone();
                let event_tx = self.event_tx.clone();
                tasks.spawn(async move {
                    Self::process_one(orchestrator, event_tx, entry).await;
                });
            }

            if claimed == 0 {
                // Queue empty — sleep before polling again.
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Pipeline worker received shutdown signal");
                        break;
                    }
                    _ = sleep(poll_interval) => {}
                }
            } else {
                debug!(claimed, "Processing concurrent entry batch");
                while let Some(result) = tasks.join_next().await {
                    if let Err(e) = result {
                        error!(error = ?e, "Entry task panicked");
                    }
                }
                // No sleep — immediately try to claim more entries.
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!("Pipeline worker stopped");
    }

    /// Process a single claimed entry with a timeout.
    async fn process_one(
        orchestrator: Arc<IngestionOrchestrator>,
        event_tx: broadcast::Sender<WorkerEvent>,
        entry: folio_core::JournalEntry,
    ) {
        let entry_id = entry.id;
        let start = Instant::now();
        let _ = event_tx.send(WorkerEvent::EntryStarted { entry_id });

        let timeout = Duration::from_secs(ENTRY_TIMEOUT_SECS);
        let pass = tokio::time::timeout(
            timeout,
            orchestrator.continue_claimed(entry, IngestMode::Single),
        )
        .await;

        let state = match pass {
            Ok(Ok(report)) => report.state,
            Ok(Err(e)) => {
                error!(entry_id = %entry_id, error = %e, "Entry processing errored");
                EntryState::Failed
            }
            Err(_) => {
                warn!(
                    entry_id = %entry_id,
                    "Entry exceeded timeout of {}s", ENTRY_TIMEOUT_SECS
                );
                if let Err(e) = orchestrator
                    .repository()
                    .mark_failed(entry_id, &format!("processing timeout after {}s", ENTRY_TIMEOUT_SECS))
                    .await
                {
                    error!(entry_id = %entry_id, error = %e, "Failed to mark timed-out entry");
                }
                EntryState::Failed
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        match state {
            EntryState::Completed => {
                info!(entry_id = %entry_id, duration_ms, "Entry processed successfully");
                let _ = event_tx.send(WorkerEvent::EntryCompleted { entry_id });
            }
            _ => {
                warn!(entry_id = %entry_id, duration_ms, "Entry did not complete");
                let _ = event_tx.send(WorkerEvent::EntryFailed { entry_id });
            }
        }
    }
}
