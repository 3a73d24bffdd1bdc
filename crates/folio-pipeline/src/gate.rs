//! Duplicate gate: fast-fail rejection of near-duplicate uploads.
//!
//! The gate rejects an upload before any expensive extraction or analysis is
//! spent on it. Its check is advisory-then-enforced: two concurrent uploads
//! of the same content can both pass the pre-check, so the repository's
//! uniqueness constraints remain the authoritative guard — the gate is only
//! the cheap early exit.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use folio_core::defaults::IMAGE_DISTANCE_THRESHOLD;
use folio_core::{EntryRepository, ImageFingerprint, Result, TextFingerprint};

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission<T = ()> {
    /// No duplicate found; processing may proceed.
    Accepted(T),
    /// A near-duplicate exists; the conflicting entry is named so the caller
    /// can view it instead of re-uploading.
    Rejected { existing: Uuid },
}

impl<T> Admission<T> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted(_))
    }
}

/// Pre-check gate over the persisted fingerprints of one owner's entries.
pub struct DuplicateGate {
    repo: Arc<dyn EntryRepository>,
    max_distance: u32,
}

impl DuplicateGate {
    /// Create a gate with the default similarity threshold.
    pub fn new(repo: Arc<dyn EntryRepository>) -> Self {
        Self {
            repo,
            max_distance: IMAGE_DISTANCE_THRESHOLD,
        }
    }

    /// Override the Hamming-distance duplicate threshold.
    pub fn with_max_distance(mut self, max_distance: u32) -> Self {
        self.max_distance = max_distance;
        self
    }

    /// Admit or reject an upload by its perceptual image fingerprint.
    ///
    /// Fingerprints the image (an unreadable image errors here, before any
    /// entry exists) and scans the owner's stored fingerprints for one
    /// within the similarity threshold.
    pub async fn admit(
        &self,
        owner_id: Uuid,
        image_bytes: &[u8],
    ) -> Result<Admission<ImageFingerprint>> {
        let fingerprint = ImageFingerprint::compute(image_bytes)?;

        match self
            .repo
            .find_image_duplicate(owner_id, &fingerprint, self.max_distance)
            .await?
        {
            Some(existing) => {
                debug!(
                    subsystem = "pipeline",
                    component = "gate",
                    owner_id = %owner_id,
                    entry_id = %existing,
                    "Upload rejected as near-duplicate image"
                );
                Ok(Admission::Rejected { existing })
            }
            None => Ok(Admission::Accepted(fingerprint)),
        }
    }

    /// Late duplicate check on the exact text fingerprint, run once
    /// extraction completes (two different photographs can transcribe to
    /// identical text).
    pub async fn admit_text(
        &self,
        owner_id: Uuid,
        fingerprint: &TextFingerprint,
    ) -> Result<Admission> {
        match self.repo.find_text_duplicate(owner_id, fingerprint).await? {
            Some(existing) => {
                debug!(
                    subsystem = "pipeline",
                    component = "gate",
                    owner_id = %owner_id,
                    entry_id = %existing,
                    "Extracted text matches an existing entry"
                );
                Ok(Admission::Rejected { existing })
            }
            None => Ok(Admission::Accepted(())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::{CreateEntryRequest, Error};
    use folio_db::MemoryEntryRepository;

    #[tokio::test]
    async fn test_admit_rejects_unreadable_image() {
        let repo = Arc::new(MemoryEntryRepository::new());
        let gate = DuplicateGate::new(repo);

        let err = gate
            .admit(Uuid::new_v4(), b"not an image")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unreadable(_)));
    }

    #[tokio::test]
    async fn test_admit_text_against_existing_entry() {
        let repo = Arc::new(MemoryEntryRepository::new());
        let owner = Uuid::new_v4();
        let fp = TextFingerprint::of("same words");
        let existing = repo
            .insert(CreateEntryRequest::transcribed_split(
                owner,
                "same words".to_string(),
                90,
                fp.clone(),
                None,
            ))
            .await
            .unwrap();

        let gate = DuplicateGate::new(repo);
        match gate.admit_text(owner, &fp).await.unwrap() {
            Admission::Rejected { existing: id } => assert_eq!(id, existing.id),
            other => panic!("expected rejection, got {:?}", other),
        }

        // A different owner is unaffected.
        assert!(gate
            .admit_text(Uuid::new_v4(), &fp)
            .await
            .unwrap()
            .is_accepted());
    }
}
