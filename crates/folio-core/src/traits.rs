//! Core traits for folio abstractions.
//!
//! These traits define the interfaces that concrete implementations must
//! satisfy, enabling pluggable backends and testability. The orchestrator
//! receives collaborators as explicit handles at construction; no global
//! clients.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::fingerprint::{ImageFingerprint, TextFingerprint};
use crate::models::*;

// =============================================================================
// ENTRY REPOSITORY
// =============================================================================

/// Repository for journal entry persistence and state transitions.
///
/// All state changes are durable updates; a transition method succeeds only
/// when the entry is currently in a state the transition table allows, so
/// concurrent orchestrator and sweeper passes can never double-process an
/// entry.
#[async_trait]
pub trait EntryRepository: Send + Sync {
    /// Insert a new entry.
    ///
    /// Fingerprint uniqueness per owner (scoped to non-deleted entries) is
    /// enforced here as the authoritative guard; a collision surfaces as
    /// [`crate::Error::DuplicateContent`] naming the existing entry.
    async fn insert(&self, req: CreateEntryRequest) -> Result<JournalEntry>;

    /// Fetch a full entry by ID.
    async fn fetch(&self, id: Uuid) -> Result<JournalEntry>;

    /// Caller-facing status view (the polling contract).
    async fn status(&self, id: Uuid) -> Result<EntryStatus>;

    /// Claim an entry for processing: compare-and-set `from → Processing`.
    ///
    /// Returns `None` when the entry is no longer in `from` (someone else
    /// claimed it first).
    async fn claim(&self, id: Uuid, from: EntryState) -> Result<Option<JournalEntry>>;

    /// Claim the oldest pending entry, if any.
    async fn claim_next_pending(&self) -> Result<Option<JournalEntry>>;

    /// Re-assert `Processing` on an entry that has sat in `Processing` since
    /// before `stale_before` (recovery from a crashed orchestrator pass).
    ///
    /// The staleness guard is part of the compare-and-set: an entry touched
    /// after `stale_before` is not reclaimed.
    async fn reclaim_stale(
        &self,
        id: Uuid,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<JournalEntry>>;

    /// Find a non-deleted entry of this owner whose image fingerprint is
    /// within `max_distance` bits of the given fingerprint.
    async fn find_image_duplicate(
        &self,
        owner_id: Uuid,
        fingerprint: &ImageFingerprint,
        max_distance: u32,
    ) -> Result<Option<Uuid>>;

    /// Find a non-deleted entry of this owner with an identical text
    /// fingerprint.
    async fn find_text_duplicate(
        &self,
        owner_id: Uuid,
        fingerprint: &TextFingerprint,
    ) -> Result<Option<Uuid>>;

    /// Persist extraction output and transition `Processing → Transcribed`.
    ///
    /// Overwrites any partially-written text from an earlier pass. A text
    /// fingerprint collision surfaces as
    /// [`crate::Error::DuplicateContent`].
    async fn store_transcription(
        &self,
        id: Uuid,
        text: &str,
        confidence: i32,
        fingerprint: &TextFingerprint,
        entry_date: Option<NaiveDate>,
    ) -> Result<()>;

    /// Persist analysis output and transition `Transcribed → Completed`.
    /// Replaces any previous analysis wholesale.
    async fn store_analysis(&self, id: Uuid, analysis: &AnalysisResult) -> Result<()>;

    /// Transition to `Failed`, recording a human-readable reason.
    async fn mark_failed(&self, id: Uuid, reason: &str) -> Result<()>;

    /// Apply an owner edit: replace the text and fingerprint and transition
    /// `Completed → Transcribed` so analysis re-runs. Editing an entry
    /// already in `Transcribed` keeps it there.
    async fn reopen_for_edit(
        &self,
        id: Uuid,
        new_text: &str,
        fingerprint: &TextFingerprint,
    ) -> Result<JournalEntry>;

    /// List entries eligible for a retry sweep: `Failed`, plus `Processing`
    /// entries untouched since `stale_before`.
    async fn list_retryable(
        &self,
        stale_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<JournalEntry>>;

    /// Soft-delete an entry, releasing its fingerprints for future uploads.
    async fn soft_delete(&self, id: Uuid) -> Result<()>;
}

// =============================================================================
// COLLABORATOR CONTRACTS
// =============================================================================

/// Output of the text extraction collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    /// Confidence 0-100.
    pub confidence: i32,
}

/// Text extraction collaborator (OCR over a stored page image).
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract text from raw image bytes.
    async fn extract(&self, image: &[u8]) -> Result<ExtractedText>;

    /// Check if the extraction backend is available.
    async fn health_check(&self) -> Result<bool>;

    /// Human-readable backend name.
    fn name(&self) -> &str;
}

/// Analysis collaborator (themes, tags, sentiment over transcribed text).
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyze transcribed entry text.
    async fn analyze(&self, text: &str) -> Result<AnalysisResult>;

    /// Check if the analysis backend is available.
    async fn health_check(&self) -> Result<bool>;

    /// Human-readable backend name.
    fn name(&self) -> &str;
}

/// Downstream sync collaborator (document/knowledge-base mirrors).
///
/// Best-effort: a sync failure must never block or fail the pipeline's own
/// state transitions.
#[async_trait]
pub trait SyncTarget: Send + Sync {
    /// Target name for logs.
    fn name(&self) -> &str;

    /// Mirror a completed entry.
    async fn sync(&self, entry: &JournalEntry) -> Result<()>;
}

/// No-op sync target for when mirroring isn't configured.
pub struct NoOpSync;

#[async_trait]
impl SyncTarget for NoOpSync {
    fn name(&self) -> &str {
        "noop"
    }

    async fn sync(&self, _entry: &JournalEntry) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_sync() {
        let target = NoOpSync;
        assert_eq!(target.name(), "noop");

        let entry = JournalEntry {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            state: EntryState::Completed,
            title: None,
            image_fingerprint: None,
            image_data: None,
            text_fingerprint: None,
            extracted_text: Some("text".to_string()),
            extraction_confidence: Some(90),
            entry_date: None,
            analysis: None,
            failure_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        };
        assert!(target.sync(&entry).await.is_ok());
    }

    #[test]
    fn test_extracted_text_equality() {
        let a = ExtractedText {
            text: "hello".to_string(),
            confidence: 90,
        };
        let b = a.clone();
        assert_eq!(a, b);
    }
}
