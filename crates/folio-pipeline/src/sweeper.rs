//! Retry sweeper: finds entries whose processing did not reach a terminal
//! success state and resubmits them to the orchestrator.
//!
//! The sweep is a pull-based batch operation, invoked on demand or on a
//! schedule — not a continuously running worker. It claims each candidate
//! with a compare-and-set before doing any work, so it tolerates running
//! concurrently with the normal orchestrator (and with another sweep)
//! without double-processing an entry.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};

use folio_core::defaults::{STALE_PROCESSING_SECS, SWEEP_BATCH_LIMIT};
use folio_core::{EntryRepository, EntryState, IngestMode, Result, SweepOutcome};

use crate::orchestrator::IngestionOrchestrator;

/// Configuration for the retry sweeper.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Age after which a `Processing` entry counts as abandoned.
    pub staleness: Duration,
    /// Maximum entries examined per sweep.
    pub batch_limit: i64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            staleness: Duration::seconds(STALE_PROCESSING_SECS),
            batch_limit: SWEEP_BATCH_LIMIT,
        }
    }
}

impl SweeperConfig {
    /// Set the staleness window.
    pub fn with_staleness(mut self, staleness: Duration) -> Self {
        self.staleness = staleness;
        self
    }

    /// Set the per-sweep batch limit.
    pub fn with_batch_limit(mut self, limit: i64) -> Self {
        self.batch_limit = limit;
        self
    }
}

/// Scans for `Failed` and stale-`Processing` entries and re-enters the
/// orchestrator's resumable procedure for each.
pub struct RetrySweeper {
    repo: Arc<dyn EntryRepository>,
    orchestrator: Arc<IngestionOrchestrator>,
    config: SweeperConfig,
}

impl RetrySweeper {
    /// Create a sweeper over the orchestrator's repository.
    pub fn new(orchestrator: Arc<IngestionOrchestrator>) -> Self {
        Self {
            repo: orchestrator.repository(),
            orchestrator,
            config: SweeperConfig::default(),
        }
    }

    /// Override the sweeper configuration.
    pub fn with_config(mut self, config: SweeperConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one sweep.
    ///
    /// Returns aggregate counts only: `retried` is the number of entries
    /// that were resubmitted and recovered to `Completed`; `still_failed`
    /// counts entries that failed again. Per-entry detail stays on each
    /// entry's `failure_reason`. Completed entries are never selected, so a
    /// second sweep after a successful recovery does nothing.
    pub async fn sweep(&self) -> Result<SweepOutcome> {
        let stale_before = Utc::now() - self.config.staleness;
        let candidates = self
            .repo
            .list_retryable(stale_before, self.config.batch_limit)
            .await?;

        let mut outcome = SweepOutcome::default();

        for candidate in candidates {
            // Claim before doing work; losing the compare-and-set means the
            // orchestrator (or a concurrent sweep) owns the entry.
            let claimed = match candidate.state {
                EntryState::Failed => self.repo.claim(candidate.id, EntryState::Failed).await?,
                EntryState::Processing => {
                    self.repo.reclaim_stale(candidate.id, stale_before).await?
                }
                _ => None,
            };
            let Some(entry) = claimed else {
                continue;
            };

            match self
                .orchestrator
                .continue_claimed(entry, IngestMode::Single)
                .await
            {
                Ok(report) if report.state == EntryState::Completed => outcome.retried += 1,
                Ok(_) => outcome.still_failed += 1,
                Err(e) => {
                    warn!(
                        subsystem = "pipeline",
                        component = "sweeper",
                        entry_id = %candidate.id,
                        error = %e,
                        "Retry pass errored"
                    );
                    outcome.still_failed += 1;
                }
            }
        }

        info!(
            subsystem = "pipeline",
            component = "sweeper",
            op = "sweep",
            retried = outcome.retried,
            still_failed = outcome.still_failed,
            "Sweep finished"
        );
        Ok(outcome)
    }
}
