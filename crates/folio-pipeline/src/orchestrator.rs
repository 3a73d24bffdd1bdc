//! Ingestion orchestrator: drives one journal entry through the state
//! machine, calling the extraction and analysis collaborators and handling
//! their failures locally.
//!
//! The per-entry sequence is one resumable procedure. A fresh entry runs
//! extraction → late duplicate check → transcription → analysis; a
//! sweep-driven retry re-enters at the right step (analysis when usable text
//! already exists, extraction otherwise). Collaborator failures terminate in
//! the entry's `Failed` state with a human-readable reason and never
//! propagate to callers — the only way to observe them is `status()`.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use folio_core::{
    defaults, segment, Analyzer, BatchSummary, CreateEntryRequest, EntryRepository, EntryState,
    EntryStatus, Error, IngestMode, JournalEntry, Result, SplitEntry, SyncTarget, TextExtractor,
    TextFingerprint,
};

use crate::gate::{Admission, DuplicateGate};

/// Outcome of submitting one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Entry created; poll `status()` for progress.
    Accepted(Uuid),
    /// Near-duplicate of an existing entry; nothing was persisted.
    Duplicate { existing: Uuid },
}

/// One file of a bulk submission.
#[derive(Debug, Clone)]
pub struct Upload {
    pub title: Option<String>,
    pub image: Vec<u8>,
}

/// Internal result of one orchestrator pass over a claimed entry.
#[derive(Debug)]
pub(crate) struct PassReport {
    /// Terminal state the claimed entry reached.
    pub state: EntryState,
    /// Additional entries created by multi-day splitting.
    pub splits: Vec<Uuid>,
}

/// Coordinates entries through extraction, analysis, persistence, and state
/// transitions.
pub struct IngestionOrchestrator {
    repo: Arc<dyn EntryRepository>,
    extractor: Arc<dyn TextExtractor>,
    analyzer: Arc<dyn Analyzer>,
    sync_targets: Vec<Arc<dyn SyncTarget>>,
    gate: DuplicateGate,
}

impl IngestionOrchestrator {
    /// Create an orchestrator over explicit collaborator handles.
    pub fn new(
        repo: Arc<dyn EntryRepository>,
        extractor: Arc<dyn TextExtractor>,
        analyzer: Arc<dyn Analyzer>,
    ) -> Self {
        let gate = DuplicateGate::new(repo.clone());
        Self {
            repo,
            extractor,
            analyzer,
            sync_targets: Vec::new(),
            gate,
        }
    }

    /// Register a best-effort downstream sync target.
    pub fn with_sync_target(mut self, target: Arc<dyn SyncTarget>) -> Self {
        self.sync_targets.push(target);
        self
    }

    /// Override the image duplicate threshold.
    pub fn with_image_distance_threshold(mut self, max_distance: u32) -> Self {
        self.gate = DuplicateGate::new(self.repo.clone()).with_max_distance(max_distance);
        self
    }

    /// The repository this orchestrator persists through.
    pub(crate) fn repository(&self) -> Arc<dyn EntryRepository> {
        self.repo.clone()
    }

    /// Accept or reject one upload.
    ///
    /// Returns immediately with the entry in `Pending`; a worker (or an
    /// explicit [`Self::process_entry`] call) drives it from there.
    /// `Unreadable` content is a synchronous error; duplicates are a
    /// synchronous rejection and never create a persisted entry.
    pub async fn submit(
        &self,
        owner_id: Uuid,
        image: Vec<u8>,
        title: Option<String>,
    ) -> Result<SubmitOutcome> {
        if image.len() > defaults::MAX_UPLOAD_SIZE_BYTES {
            return Err(Error::InvalidInput(format!(
                "upload of {} bytes exceeds the {} byte limit",
                image.len(),
                defaults::MAX_UPLOAD_SIZE_BYTES
            )));
        }

        let fingerprint = match self.gate.admit(owner_id, &image).await? {
            Admission::Accepted(fp) => fp,
            Admission::Rejected { existing } => {
                return Ok(SubmitOutcome::Duplicate { existing })
            }
        };

        // The gate's pre-check is racy by construction; the repository's
        // uniqueness constraint is the authoritative guard.
        match self
            .repo
            .insert(CreateEntryRequest::pending(owner_id, title, fingerprint, image))
            .await
        {
            Ok(entry) => {
                info!(
                    subsystem = "pipeline",
                    component = "orchestrator",
                    op = "submit",
                    entry_id = %entry.id,
                    owner_id = %owner_id,
                    "Upload accepted"
                );
                Ok(SubmitOutcome::Accepted(entry.id))
            }
            Err(Error::DuplicateContent { existing }) => {
                Ok(SubmitOutcome::Duplicate { existing })
            }
            Err(e) => Err(e),
        }
    }

    /// Drive one pending entry through the pipeline, then report its status.
    ///
    /// If another pass already claimed the entry, the current status is
    /// returned without double-processing.
    pub async fn process_entry(&self, id: Uuid) -> Result<EntryStatus> {
        if let Some(entry) = self.repo.claim(id, EntryState::Pending).await? {
            self.continue_claimed(entry, IngestMode::Single).await?;
        }
        self.repo.status(id).await
    }

    /// Process multiple images sequentially.
    ///
    /// Files run one at a time to bound concurrent load on the extraction
    /// and analysis collaborators; a failure in one file never aborts the
    /// rest. In [`IngestMode::MultiDay`] each extraction result is run
    /// through date segmentation and may fan out into several entries.
    pub async fn submit_batch(
        &self,
        owner_id: Uuid,
        uploads: Vec<Upload>,
        mode: IngestMode,
    ) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();

        for (index, upload) in uploads.into_iter().enumerate() {
            let label = index + 1;
            let outcome = self.submit(owner_id, upload.image, upload.title).await;

            let entry_id = match outcome {
                Ok(SubmitOutcome::Accepted(id)) => id,
                Ok(SubmitOutcome::Duplicate { existing }) => {
                    summary.duplicates.push(existing);
                    continue;
                }
                Err(e) => {
                    summary.errors.push(format!("upload {}: {}", label, e));
                    continue;
                }
            };

            // Claim immediately so the batch processes inline with the
            // requested mode; losing the claim means a worker picked the
            // entry up and it is already in flight.
            let Some(entry) = self.repo.claim(entry_id, EntryState::Pending).await? else {
                summary.processed.push(entry_id);
                continue;
            };

            match self.continue_claimed(entry, mode).await {
                Ok(report) => {
                    if report.state == EntryState::Failed {
                        let status = self.repo.status(entry_id).await?;
                        summary.errors.push(format!(
                            "upload {}: {}",
                            label,
                            status
                                .failure_reason
                                .unwrap_or_else(|| "processing failed".to_string())
                        ));
                    } else {
                        summary.processed.push(entry_id);
                    }
                    summary.processed.extend(report.splits);
                }
                Err(e) => {
                    summary.errors.push(format!("upload {}: {}", label, e));
                }
            }
        }

        info!(
            subsystem = "pipeline",
            component = "orchestrator",
            op = "submit_batch",
            owner_id = %owner_id,
            processed = summary.processed.len(),
            duplicates = summary.duplicates.len(),
            errors = summary.errors.len(),
            "Batch ingestion finished"
        );
        Ok(summary)
    }

    /// Caller-facing status view (the polling contract).
    pub async fn status(&self, id: Uuid) -> Result<EntryStatus> {
        self.repo.status(id).await
    }

    /// Apply an owner edit to a completed entry.
    ///
    /// Forces `Completed → Transcribed` and re-runs analysis so stored
    /// themes, tags, and sentiment never go stale relative to the edited
    /// text. Returns the refreshed entry.
    pub async fn edit_text(&self, id: Uuid, new_text: &str) -> Result<JournalEntry> {
        if new_text.trim().is_empty() {
            return Err(Error::InvalidInput(
                "edited text must not be empty".to_string(),
            ));
        }

        let fingerprint = TextFingerprint::of(new_text);
        self.repo.reopen_for_edit(id, new_text, &fingerprint).await?;

        info!(
            subsystem = "pipeline",
            component = "orchestrator",
            op = "edit_text",
            entry_id = %id,
            "Entry re-opened for analysis after edit"
        );

        self.analyze_entry(id, new_text).await?;
        self.repo.fetch(id).await
    }

    /// Soft-delete an entry, releasing its fingerprints for future uploads.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.repo.soft_delete(id).await
    }

    /// Run the resumable per-entry procedure over a claimed entry.
    ///
    /// The entry must already be in `Processing` (claimed by the caller).
    /// Re-entry rule: usable extracted text resumes at analysis; otherwise
    /// the pass starts at extraction, overwriting any partial text.
    pub(crate) async fn continue_claimed(
        &self,
        entry: JournalEntry,
        mode: IngestMode,
    ) -> Result<PassReport> {
        debug_assert_eq!(entry.state, EntryState::Processing);

        if entry.has_text() {
            return self.resume_at_analysis(entry).await;
        }
        self.run_extraction(entry, mode).await
    }

    /// Steps 2-4: extraction, segmentation, late duplicate check,
    /// transcription; then analysis for every resulting entry.
    async fn run_extraction(&self, entry: JournalEntry, mode: IngestMode) -> Result<PassReport> {
        let id = entry.id;
        let owner_id = entry.owner_id;

        let Some(image) = entry.image_data.as_deref() else {
            let state = self.fail_entry(id, "no stored image to extract from").await?;
            return Ok(PassReport {
                state,
                splits: Vec::new(),
            });
        };

        let extracted = match self.extractor.extract(image).await {
            Ok(extracted) => extracted,
            Err(e) => {
                let state = self
                    .fail_entry(id, &format!("extraction failed: {}", e))
                    .await?;
                return Ok(PassReport {
                    state,
                    splits: Vec::new(),
                });
            }
        };

        if extracted.text.trim().is_empty() {
            let state = self.fail_entry(id, "no readable text").await?;
            return Ok(PassReport {
                state,
                splits: Vec::new(),
            });
        }

        // Date segmentation runs only in multi-day mode; a single upload is
        // one entry regardless of embedded dates.
        let splits = match mode {
            IngestMode::MultiDay => {
                let splits = segment(&extracted.text);
                debug!(
                    subsystem = "pipeline",
                    component = "orchestrator",
                    entry_id = %id,
                    split_count = splits.len(),
                    "Date segmentation finished"
                );
                splits
            }
            IngestMode::Single => vec![SplitEntry {
                date: None,
                content: extracted.text.trim().to_string(),
                span: 0..extracted.text.len(),
            }],
        };

        // The first block stays on the claimed entry, which keeps the image
        // fingerprint; further blocks become entries of their own.
        let first = &splits[0];
        let fingerprint = TextFingerprint::of(&first.content);

        if let Admission::Rejected { existing } =
            self.gate.admit_text(owner_id, &fingerprint).await?
        {
            let state = self
                .fail_entry(id, &format!("duplicate content (matches entry {})", existing))
                .await?;
            return Ok(PassReport {
                state,
                splits: Vec::new(),
            });
        }

        match self
            .repo
            .store_transcription(id, &first.content, extracted.confidence, &fingerprint, first.date)
            .await
        {
            Ok(()) => {}
            Err(Error::DuplicateContent { existing }) => {
                let state = self
                    .fail_entry(id, &format!("duplicate content (matches entry {})", existing))
                    .await?;
                return Ok(PassReport {
                    state,
                    splits: Vec::new(),
                });
            }
            Err(e) => return Err(e),
        }

        let mut created: Vec<(Uuid, String)> = Vec::new();
        for split in &splits[1..] {
            if let Some(split_id) = self
                .create_split_entry(owner_id, split, extracted.confidence)
                .await?
            {
                created.push((split_id, split.content.clone()));
            }
        }

        // Step 5-6: analysis, for the claimed entry and every split.
        let state = self.analyze_entry(id, &first.content).await?;
        for (split_id, content) in &created {
            self.analyze_entry(*split_id, content).await?;
        }

        Ok(PassReport {
            state,
            splits: created.into_iter().map(|(split_id, _)| split_id).collect(),
        })
    }

    /// Create one per-day split entry, skipping blocks whose text already
    /// exists for this owner.
    async fn create_split_entry(
        &self,
        owner_id: Uuid,
        split: &SplitEntry,
        confidence: i32,
    ) -> Result<Option<Uuid>> {
        let fingerprint = TextFingerprint::of(&split.content);

        if let Admission::Rejected { existing } =
            self.gate.admit_text(owner_id, &fingerprint).await?
        {
            debug!(
                subsystem = "pipeline",
                component = "orchestrator",
                owner_id = %owner_id,
                entry_id = %existing,
                "Skipping split block duplicating an existing entry"
            );
            return Ok(None);
        }

        let req = CreateEntryRequest::transcribed_split(
            owner_id,
            split.content.clone(),
            confidence,
            fingerprint,
            split.date,
        );

        match self.repo.insert(req).await {
            Ok(entry) => Ok(Some(entry.id)),
            Err(Error::DuplicateContent { existing }) => {
                debug!(
                    subsystem = "pipeline",
                    component = "orchestrator",
                    owner_id = %owner_id,
                    entry_id = %existing,
                    "Split block lost a duplicate race; skipping"
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Retry path when usable text already exists: re-assert the
    /// transcription (overwriting any partial write) and go straight to
    /// analysis.
    async fn resume_at_analysis(&self, entry: JournalEntry) -> Result<PassReport> {
        let id = entry.id;
        let text = entry.extracted_text.clone().unwrap_or_default();
        let confidence = entry
            .extraction_confidence
            .unwrap_or(defaults::VISION_EXTRACTION_CONFIDENCE);
        let fingerprint = entry
            .text_fingerprint
            .clone()
            .unwrap_or_else(|| TextFingerprint::of(&text));

        let state = match self
            .repo
            .store_transcription(id, &text, confidence, &fingerprint, entry.entry_date)
            .await
        {
            Ok(()) => self.analyze_entry(id, &text).await?,
            Err(Error::DuplicateContent { existing }) => {
                self.fail_entry(id, &format!("duplicate content (matches entry {})", existing))
                    .await?
            }
            Err(e) => return Err(e),
        };

        Ok(PassReport {
            state,
            splits: Vec::new(),
        })
    }

    /// Steps 5-8: analysis, persistence, best-effort sync.
    async fn analyze_entry(&self, id: Uuid, text: &str) -> Result<EntryState> {
        let analysis = match self.analyzer.analyze(text).await {
            Ok(analysis) => analysis,
            Err(e) => {
                return self
                    .fail_entry(id, &format!("analysis failed: {}", e))
                    .await;
            }
        };

        self.repo.store_analysis(id, &analysis).await?;
        info!(
            subsystem = "pipeline",
            component = "orchestrator",
            op = "analyze",
            entry_id = %id,
            state = "completed",
            "Entry completed"
        );

        self.sync_completed(id).await;
        Ok(EntryState::Completed)
    }

    /// Notify downstream mirrors of a completed entry. Best-effort: a sync
    /// failure is logged and never rolls back or fails the entry.
    async fn sync_completed(&self, id: Uuid) {
        if self.sync_targets.is_empty() {
            return;
        }

        let entry = match self.repo.fetch(id).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(
                    subsystem = "pipeline",
                    component = "orchestrator",
                    entry_id = %id,
                    error = %e,
                    "Could not load completed entry for sync"
                );
                return;
            }
        };

        for target in &self.sync_targets {
            if let Err(e) = target.sync(&entry).await {
                warn!(
                    subsystem = "pipeline",
                    component = "orchestrator",
                    entry_id = %id,
                    target = target.name(),
                    error = %e,
                    "Downstream sync failed; entry state unchanged"
                );
            }
        }
    }

    /// Record a terminal failure on the entry.
    async fn fail_entry(&self, id: Uuid, reason: &str) -> Result<EntryState> {
        self.repo.mark_failed(id, reason).await?;
        warn!(
            subsystem = "pipeline",
            component = "orchestrator",
            entry_id = %id,
            state = "failed",
            error = reason,
            "Entry failed"
        );
        Ok(EntryState::Failed)
    }
}
