//! Journal entry repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, warn};
use uuid::Uuid;

use folio_core::{
    new_v7, AnalysisResult, CreateEntryRequest, EntryRepository, EntryState, EntryStatus, Error,
    ImageFingerprint, JournalEntry, Result, TextFingerprint,
};

/// Columns selected for every full-entry read.
const ENTRY_COLUMNS: &str = "id, owner_id, state, title, image_fingerprint, image_data, \
     text_fingerprint, extracted_text, extraction_confidence, entry_date, analysis, \
     failure_reason, created_at, updated_at, deleted_at";

/// PostgreSQL implementation of EntryRepository.
pub struct PgEntryRepository {
    pool: Pool<Postgres>,
}

impl PgEntryRepository {
    /// Create a new PgEntryRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Convert string from database to EntryState.
    fn str_to_state(s: &str) -> EntryState {
        EntryState::parse(s).unwrap_or_else(|| {
            warn!(value = s, "Unknown entry state in database, treating as pending");
            EntryState::Pending
        })
    }

    /// Parse an entry row into a JournalEntry struct.
    fn parse_entry_row(row: sqlx::postgres::PgRow) -> Result<JournalEntry> {
        let state: String = row.get("state");
        let image_fp: Option<String> = row.get("image_fingerprint");
        let text_fp: Option<String> = row.get("text_fingerprint");
        let analysis: Option<serde_json::Value> = row.get("analysis");

        Ok(JournalEntry {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            state: Self::str_to_state(&state),
            title: row.get("title"),
            image_fingerprint: image_fp.as_deref().map(ImageFingerprint::from_hex).transpose()?,
            image_data: row.get("image_data"),
            text_fingerprint: text_fp.as_deref().map(TextFingerprint::from_hex).transpose()?,
            extracted_text: row.get("extracted_text"),
            extraction_confidence: row.get("extraction_confidence"),
            entry_date: row.get("entry_date"),
            analysis: analysis
                .map(serde_json::from_value::<AnalysisResult>)
                .transpose()?,
            failure_reason: row.get("failure_reason"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            deleted_at: row.get("deleted_at"),
        })
    }

    /// Whether a sqlx error is a unique-constraint violation on one of the
    /// fingerprint guards.
    fn is_fingerprint_violation(e: &sqlx::Error) -> bool {
        e.as_database_error()
            .is_some_and(|db| db.is_unique_violation())
    }

    /// Resolve the entry already holding a fingerprint, for naming in a
    /// DuplicateContent rejection.
    async fn existing_holder(
        &self,
        owner_id: Uuid,
        image_fp: Option<&ImageFingerprint>,
        text_fp: Option<&TextFingerprint>,
    ) -> Result<Option<Uuid>> {
        if let Some(fp) = image_fp {
            let hit: Option<Uuid> = sqlx::query_scalar(
                "SELECT id FROM journal_entries
                 WHERE owner_id = $1 AND image_fingerprint = $2 AND deleted_at IS NULL
                 LIMIT 1",
            )
            .bind(owner_id)
            .bind(fp.to_hex())
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
            if hit.is_some() {
                return Ok(hit);
            }
        }
        if let Some(fp) = text_fp {
            let hit: Option<Uuid> = sqlx::query_scalar(
                "SELECT id FROM journal_entries
                 WHERE owner_id = $1 AND text_fingerprint = $2 AND deleted_at IS NULL
                 LIMIT 1",
            )
            .bind(owner_id)
            .bind(fp.to_hex())
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
            return Ok(hit);
        }
        Ok(None)
    }

    /// Translate a fingerprint unique violation into DuplicateContent naming
    /// the conflicting entry.
    async fn duplicate_error(
        &self,
        owner_id: Uuid,
        image_fp: Option<&ImageFingerprint>,
        text_fp: Option<&TextFingerprint>,
    ) -> Error {
        match self.existing_holder(owner_id, image_fp, text_fp).await {
            Ok(Some(existing)) => Error::DuplicateContent { existing },
            Ok(None) => {
                Error::Internal("fingerprint collision with no visible holder".to_string())
            }
            Err(e) => e,
        }
    }
}

#[async_trait]
impl EntryRepository for PgEntryRepository {
    async fn insert(&self, req: CreateEntryRequest) -> Result<JournalEntry> {
        let id = new_v7();
        let now = Utc::now();

        let result = sqlx::query(&format!(
            "INSERT INTO journal_entries
                 (id, owner_id, state, title, image_fingerprint, image_data, text_fingerprint,
                  extracted_text, extraction_confidence, entry_date, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
             RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(id)
        .bind(req.owner_id)
        .bind(req.state.as_str())
        .bind(&req.title)
        .bind(req.image_fingerprint.as_ref().map(|f| f.to_hex()))
        .bind(&req.image_data)
        .bind(req.text_fingerprint.as_ref().map(|f| f.to_hex()))
        .bind(&req.extracted_text)
        .bind(req.extraction_confidence)
        .bind(req.entry_date)
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Self::parse_entry_row(row),
            Err(e) if Self::is_fingerprint_violation(&e) => Err(self
                .duplicate_error(
                    req.owner_id,
                    req.image_fingerprint.as_ref(),
                    req.text_fingerprint.as_ref(),
                )
                .await),
            Err(e) => Err(Error::Database(e)),
        }
    }

    async fn fetch(&self, id: Uuid) -> Result<JournalEntry> {
        let row = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM journal_entries
             WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_entry_row)
            .transpose()?
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

        let row = sqlx::query(&format!(
            "UPDATE journal_entries
             SET state = 'processing', failure_reason = NULL, updated_at = $1
             WHERE id = $2 AND state = $3 AND deleted_at IS NULL
             RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(Utc::now())
        .bind(id)
        .bind(from.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_entry_row).transpose()
    }

    async fn claim_next_pending(&self) -> Result<Option<JournalEntry>> {
        // FOR UPDATE SKIP LOCKED so concurrent workers never claim the same
        // entry.
        let row = sqlx::query(&format!(
            "UPDATE journal_entries
             SET state = 'processing', updated_at = $1
             WHERE id = (
                 SELECT id FROM journal_entries
                 WHERE state = 'pending' AND deleted_at IS NULL
                 ORDER BY created_at ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_entry_row).transpose()
    }

    async fn reclaim_stale(
        &self,
        id: Uuid,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<JournalEntry>> {
        // The staleness guard is part of the compare-and-set: an entry the
        // main orchestrator touched after `stale_before` is left alone.
        let row = sqlx::query(&format!(
            "UPDATE journal_entries
             SET updated_at = $1
             WHERE id = $2 AND state = 'processing' AND updated_at < $3
                   AND deleted_at IS NULL
             RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(Utc::now())
        .bind(id)
        .bind(stale_before)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_entry_row).transpose()
    }

    async fn find_image_duplicate(
        &self,
        owner_id: Uuid,
        fingerprint: &ImageFingerprint,
        max_distance: u32,
    ) -> Result<Option<Uuid>> {
        // Postgres has no Hamming operator for hex text, so the per-owner
        // candidate set is scanned in Rust. Owners hold at most a few
        // thousand pages; this stays cheap.
        let rows = sqlx::query(
            "SELECT id, image_fingerprint FROM journal_entries
             WHERE owner_id = $1 AND image_fingerprint IS NOT NULL AND deleted_at IS NULL",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        for row in rows {
            let id: Uuid = row.get("id");
            let stored: String = row.get("image_fingerprint");
            let candidate = ImageFingerprint::from_hex(&stored)?;
            let distance = fingerprint.distance(&candidate)?;
            if distance <= max_distance {
                debug!(
                    subsystem = "db",
                    component = "entries",
                    entry_id = %id,
                    distance,
                    "Image fingerprint within duplicate threshold"
                );
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    async fn find_text_duplicate(
        &self,
        owner_id: Uuid,
        fingerprint: &TextFingerprint,
    ) -> Result<Option<Uuid>> {
        let hit: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM journal_entries
             WHERE owner_id = $1 AND text_fingerprint = $2 AND deleted_at IS NULL
             LIMIT 1",
        )
        .bind(owner_id)
        .bind(fingerprint.to_hex())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(hit)
    }

    async fn store_transcription(
        &self,
        id: Uuid,
        text: &str,
        confidence: i32,
        fingerprint: &TextFingerprint,
        entry_date: Option<NaiveDate>,
    ) -> Result<()> {
        let owner_id: Uuid = sqlx::query_scalar(
            "SELECT owner_id FROM journal_entries WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::EntryNotFound(id))?;

        // Overwrites, never appends: a sweep-driven re-extraction replaces
        // any partially-written text from the crashed pass.
        let result = sqlx::query(
            "UPDATE journal_entries
             SET extracted_text = $1, extraction_confidence = $2, text_fingerprint = $3,
                 entry_date = $4, state = 'transcribed', updated_at = $5
             WHERE id = $6 AND state = 'processing' AND deleted_at IS NULL",
        )
        .bind(text)
        .bind(confidence)
        .bind(fingerprint.to_hex())
        .bind(entry_date)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 1 => Ok(()),
            Ok(_) => Err(Error::InvalidState(format!(
                "entry {} is not in processing",
                id
            ))),
            Err(e) if Self::is_fingerprint_violation(&e) => {
                Err(self.duplicate_error(owner_id, None, Some(fingerprint)).await)
            }
            Err(e) => Err(Error::Database(e)),
        }
    }

    async fn store_analysis(&self, id: Uuid, analysis: &AnalysisResult) -> Result<()> {
        let payload = serde_json::to_value(analysis)?;
        let done = sqlx::query(
            "UPDATE journal_entries
             SET analysis = $1, state = 'completed', failure_reason = NULL, updated_at = $2
             WHERE id = $3 AND state = 'transcribed' AND deleted_at IS NULL",
        )
        .bind(payload)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if done.rows_affected() == 1 {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "entry {} is not in transcribed",
                id
            )))
        }
    }

    async fn mark_failed(&self, id: Uuid, reason: &str) -> Result<()> {
        let done = sqlx::query(
            "UPDATE journal_entries
             SET state = 'failed', failure_reason = $1, updated_at = $2
             WHERE id = $3 AND state IN ('processing', 'transcribed') AND deleted_at IS NULL",
        )
        .bind(reason)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if done.rows_affected() == 1 {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "entry {} cannot fail from its current state",
                id
            )))
        }
    }

    async fn reopen_for_edit(
        &self,
        id: Uuid,
        new_text: &str,
        fingerprint: &TextFingerprint,
    ) -> Result<JournalEntry> {
        let owner_id: Uuid = sqlx::query_scalar(
            "SELECT owner_id FROM journal_entries WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::EntryNotFound(id))?;

        // Stale analysis is cleared so polling never sees themes that no
        // longer match the edited text; the re-analysis pass rewrites it.
        let result = sqlx::query(&format!(
            "UPDATE journal_entries
             SET extracted_text = $1, text_fingerprint = $2, analysis = NULL,
                 state = 'transcribed', updated_at = $3
             WHERE id = $4 AND state IN ('completed', 'transcribed') AND deleted_at IS NULL
             RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(new_text)
        .bind(fingerprint.to_hex())
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(row)) => Self::parse_entry_row(row),
            Ok(None) => Err(Error::InvalidState(format!(
                "entry {} cannot be edited in its current state",
                id
            ))),
            Err(e) if Self::is_fingerprint_violation(&e) => {
                Err(self.duplicate_error(owner_id, None, Some(fingerprint)).await)
            }
            Err(e) => Err(Error::Database(e)),
        }
    }

    async fn list_retryable(
        &self,
        stale_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<JournalEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM journal_entries
             WHERE deleted_at IS NULL
               AND (state = 'failed' OR (state = 'processing' AND updated_at < $1))
             ORDER BY updated_at ASC
             LIMIT $2"
        ))
        .bind(stale_before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(Self::parse_entry_row).collect()
    }

    async fn soft_delete(&self, id: Uuid) -> Result<()> {
        let now = Utc::now();
        let done = sqlx::query(
            "UPDATE journal_entries
             SET deleted_at = $1, updated_at = $1
             WHERE id = $2 AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if done.rows_affected() == 1 {
            Ok(())
        } else {
            Err(Error::EntryNotFound(id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_str_to_state_known_values() {
        assert_eq!(
            PgEntryRepository::str_to_state("pending"),
            EntryState::Pending
        );
        assert_eq!(
            PgEntryRepository::str_to_state("processing"),
            EntryState::Processing
        );
        assert_eq!(
            PgEntryRepository::str_to_state("transcribed"),
            EntryState::Transcribed
        );
        assert_eq!(
            PgEntryRepository::str_to_state("completed"),
            EntryState::Completed
        );
        assert_eq!(
            PgEntryRepository::str_to_state("failed"),
            EntryState::Failed
        );
    }

    #[test]
    fn test_str_to_state_unknown_fallback() {
        assert_eq!(
            PgEntryRepository::str_to_state("cancelled"),
            EntryState::Pending
        );
        assert_eq!(PgEntryRepository::str_to_state(""), EntryState::Pending);
    }

    #[test]
    fn test_entry_columns_cover_model() {
        // Every JournalEntry field has a column in the shared select list.
        for col in [
            "id",
            "owner_id",
            "state",
            "title",
            "image_fingerprint",
            "image_data",
            "text_fingerprint",
            "extracted_text",
            "extraction_confidence",
            "entry_date",
            "analysis",
            "failure_reason",
            "created_at",
            "updated_at",
            "deleted_at",
        ] {
            assert!(ENTRY_COLUMNS.contains(col), "missing column {}", col);
        }
    }
}
