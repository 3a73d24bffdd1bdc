//! In-memory EntryRepository for deterministic tests.
//!
//! Mirrors the semantics of the PostgreSQL repository — compare-and-set
//! transitions, exact-match fingerprint uniqueness scoped to non-deleted
//! entries — without a database, so pipeline tests run hermetically.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use folio_core::{
    new_v7, AnalysisResult, CreateEntryRequest, EntryRepository, EntryState, EntryStatus, Error,
    ImageFingerprint, JournalEntry, Result, TextFingerprint,
};

/// In-memory implementation of EntryRepository.
#[derive(Default)]
pub struct MemoryEntryRepository {
    entries: Mutex<HashMap<Uuid, JournalEntry>>,
}

impl MemoryEntryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored entry, for test assertions.
    pub fn all(&self) -> Vec<JournalEntry> {
        let mut entries: Vec<_> = self.entries.lock().unwrap().values().cloned().collect();
        entries.sort_by_key(|e| e.created_at);
        entries
    }

    /// Count of non-deleted entries.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.deleted_at.is_none())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn image_conflict(
        entries: &HashMap<Uuid, JournalEntry>,
        owner_id: Uuid,
        fp: &ImageFingerprint,
        exclude: Option<Uuid>,
    ) -> Option<Uuid> {
        entries
            .values()
            .find(|e| {
                e.deleted_at.is_none()
                    && e.owner_id == owner_id
                    && Some(e.id) != exclude
                    && e.image_fingerprint.as_ref() == Some(fp)
            })
            .map(|e| e.id)
    }

    fn text_conflict(
        entries: &HashMap<Uuid, JournalEntry>,
        owner_id: Uuid,
        fp: &TextFingerprint,
        exclude: Option<Uuid>,
    ) -> Option<Uuid> {
        entries
            .values()
            .find(|e| {
                e.deleted_at.is_none()
                    && e.owner_id == owner_id
                    && Some(e.id) != exclude
                    && e.text_fingerprint.as_ref() == Some(fp)
            })
            .map(|e| e.id)
    }
}

#[async_trait]
impl EntryRepository for MemoryEntryRepository {
    async fn insert(&self, req: CreateEntryRequest) -> Result<JournalEntry> {
        let mut entries = self.entries.lock().unwrap();

        if let Some(fp) = &req.image_fingerprint {
            if let Some(existing) = Self::image_conflict(&entries, req.owner_id, fp, None) {
                return Err(Error::DuplicateContent { existing });
            }
        }
        if let Some(fp) = &req.text_fingerprint {
            if let Some(existing) = Self::text_conflict(&entries, req.owner_id, fp, None) {
                return Err(Error::DuplicateContent { existing });
            }
        }

        let now = Utc::now();
        let entry = JournalEntry {
            id: new_v7(),
            owner_id: req.owner_id,
            state: req.state,
            title: req.title,
            image_fingerprint: req.image_fingerprint,
            image_data: req.image_data,
            text_fingerprint: req.text_fingerprint,
            extracted_text: req.extracted_text,
            extraction_confidence: req.extraction_confidence,
            entry_date: req.entry_date,
            analysis: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn fetch(&self, id: Uuid) -> Result<JournalEntry> {
        self.entries
            .lock()
            .unwrap()
            .get(&id)
            .filter(|e| e.deleted_at.is_none())
            .cloned()
            .ok_or(Error::EntryNotFound(id))
    }

    async fn status(&self, id: Uuid) -> Result<EntryStatus> {
        let entry = self.fetch(id).await?;
        Ok(EntryStatus {
            id: entry.id,
            state: entry.state,
            extracted_text: entry.extracted_text,
            confidence: entry.extraction_confidence,
            failure_reason: entry.failure_reason,
        })
    }

    async fn claim(&self, id: Uuid, from: EntryState) -> Result<Option<JournalEntry>> {
        if !from.can_transition_to(EntryState::Processing) {
            return Err(Error::InvalidState(format!(
                "{} -> processing",
                from.as_str()
            )));
        }

        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(&id) {
            Some(e) if e.deleted_at.is_none() && e.state == from => {
                e.state = EntryState::Processing;
                e.failure_reason = None;
                e.updated_at = Utc::now();
                Ok(Some(e.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn claim_next_pending(&self) -> Result<Option<JournalEntry>> {
        let mut entries = self.entries.lock().unwrap();
        let next = entries
            .values()
            .filter(|e| e.deleted_at.is_none() && e.state == EntryState::Pending)
            .min_by_key(|e| e.created_at)
            .map(|e| e.id);

        match next {
            Some(id) => {
                let e = entries.get_mut(&id).expect("entry id just observed");
                e.state = EntryState::Processing;
                e.updated_at = Utc::now();
                Ok(Some(e.clone()))
            }
            None => Ok(None),
        }
    }

    async fn reclaim_stale(
        &self,
        id: Uuid,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<JournalEntry>> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(&id) {
            Some(e)
                if e.deleted_at.is_none()
                    && e.state == EntryState::Processing
                    && e.updated_at < stale_before =>
            {
                e.updated_at = Utc::now();
                Ok(Some(e.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn find_image_duplicate(
        &self,
        owner_id: Uuid,
        fingerprint: &ImageFingerprint,
        max_distance: u32,
    ) -> Result<Option<Uuid>> {
        let entries = self.entries.lock().unwrap();
        for e in entries.values() {
            if e.deleted_at.is_some() || e.owner_id != owner_id {
                continue;
            }
            if let Some(stored) = &e.image_fingerprint {
                if fingerprint.distance(stored)? <= max_distance {
                    return Ok(Some(e.id));
                }
            }
        }
        Ok(None)
    }

    async fn find_text_duplicate(
        &self,
        owner_id: Uuid,
        fingerprint: &TextFingerprint,
    ) -> Result<Option<Uuid>> {
        let entries = self.entries.lock().unwrap();
        Ok(Self::text_conflict(&entries, owner_id, fingerprint, None))
    }

    async fn store_transcription(
        &self,
        id: Uuid,
        text: &str,
        confidence: i32,
        fingerprint: &TextFingerprint,
        entry_date: Option<NaiveDate>,
    ) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();

        let owner_id = entries
            .get(&id)
            .filter(|e| e.deleted_at.is_none())
            .map(|e| e.owner_id)
            .ok_or(Error::EntryNotFound(id))?;

        if let Some(existing) = Self::text_conflict(&entries, owner_id, fingerprint, Some(id)) {
            return Err(Error::DuplicateContent { existing });
        }

        let e = entries.get_mut(&id).expect("entry id just observed");
        if e.state != EntryState::Processing {
            return Err(Error::InvalidState(format!(
                "entry {} is not in processing",
                id
            )));
        }
        e.extracted_text = Some(text.to_string());
        e.extraction_confidence = Some(confidence);
        e.text_fingerprint = Some(fingerprint.clone());
        e.entry_date = entry_date;
        e.state = EntryState::Transcribed;
        e.updated_at = Utc::now();
        Ok(())
    }

    async fn store_analysis(&self, id: Uuid, analysis: &AnalysisResult) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        let e = entries
            .get_mut(&id)
            .filter(|e| e.deleted_at.is_none())
            .ok_or(Error::EntryNotFound(id))?;

        if e.state != EntryState::Transcribed {
            return Err(Error::InvalidState(format!(
                "entry {} is not in transcribed",
                id
            )));
        }
        e.analysis = Some(analysis.clone());
        e.failure_reason = None;
        e.state = EntryState::Completed;
        e.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, reason: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        let e = entries
            .get_mut(&id)
            .filter(|e| e.deleted_at.is_none())
            .ok_or(Error::EntryNotFound(id))?;

        if !e.state.can_transition_to(EntryState::Failed) {
            return Err(Error::InvalidState(format!(
                "entry {} cannot fail from its current state",
                id
            )));
        }
        e.state = EntryState::Failed;
        e.failure_reason = Some(reason.to_string());
        e.updated_at = Utc::now();
        Ok(())
    }

    async fn reopen_for_edit(
        &self,
        id: Uuid,
        new_text: &str,
        fingerprint: &TextFingerprint,
    ) -> Result<JournalEntry> {
        let mut entries = self.entries.lock().unwrap();

        let owner_id = entries
            .get(&id)
            .filter(|e| e.deleted_at.is_none())
            .map(|e| e.owner_id)
            .ok_or(Error::EntryNotFound(id))?;

        if let Some(existing) = Self::text_conflict(&entries, owner_id, fingerprint, Some(id)) {
            return Err(Error::DuplicateContent { existing });
        }

        let e = entries.get_mut(&id).expect("entry id just observed");
        if !matches!(e.state, EntryState::Completed | EntryState::Transcribed) {
            return Err(Error::InvalidState(format!(
                "entry {} cannot be edited in its current state",
                id
            )));
        }
        e.extracted_text = Some(new_text.to_string());
        e.text_fingerprint = Some(fingerprint.clone());
        e.analysis = None;
        e.state = EntryState::Transcribed;
        e.updated_at = Utc::now();
        Ok(e.clone())
    }

    async fn list_retryable(
        &self,
        stale_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<JournalEntry>> {
        let entries = self.entries.lock().unwrap();
        let mut retryable: Vec<_> = entries
            .values()
            .filter(|e| {
                e.deleted_at.is_none()
                    && (e.state == EntryState::Failed
                        || (e.state == EntryState::Processing && e.updated_at < stale_before))
            })
            .cloned()
            .collect();
        retryable.sort_by_key(|e| e.updated_at);
        retryable.truncate(limit.max(0) as usize);
        Ok(retryable)
    }

    async fn soft_delete(&self, id: Uuid) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        let e = entries
            .get_mut(&id)
            .filter(|e| e.deleted_at.is_none())
            .ok_or(Error::EntryNotFound(id))?;
        let now = Utc::now();
        e.deleted_at = Some(now);
        e.updated_at = now;
        Ok(())
    }
}
