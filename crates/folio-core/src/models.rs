//! Core data models for the folio ingestion pipeline.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fingerprint::{ImageFingerprint, TextFingerprint};

/// Processing state of a journal entry.
///
/// The lifecycle is `Pending → Processing → Transcribed → Completed`, with
/// `Failed` reachable from `Processing` or `Transcribed`. There is no cancel
/// transition: an in-flight entry always resolves to a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    /// Upload accepted, waiting for a worker to claim it.
    Pending,
    /// Claimed by an orchestrator pass; extraction in flight.
    Processing,
    /// Text extracted and persisted; analysis pending.
    Transcribed,
    /// Analysis persisted; terminal success.
    Completed,
    /// Terminal failure; `failure_reason` holds the diagnostic.
    Failed,
}

impl EntryState {
    /// Database/string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryState::Pending => "pending",
            EntryState::Processing => "processing",
            EntryState::Transcribed => "transcribed",
            EntryState::Completed => "completed",
            EntryState::Failed => "failed",
        }
    }

    /// Parse from the database representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EntryState::Pending),
            "processing" => Some(EntryState::Processing),
            "transcribed" => Some(EntryState::Transcribed),
            "completed" => Some(EntryState::Completed),
            "failed" => Some(EntryState::Failed),
            _ => None,
        }
    }

    /// Whether the transition `self → to` is legal.
    ///
    /// `Completed → Transcribed` (owner edits text) is the one legitimate
    /// backward transition; it re-opens analysis so stored themes never go
    /// stale relative to edited text.
    pub fn can_transition_to(&self, to: EntryState) -> bool {
        use EntryState::*;
        matches!(
            (self, to),
            (Pending, Processing)
                | (Processing, Transcribed)
                | (Processing, Failed)
                | (Transcribed, Completed)
                | (Transcribed, Failed)
                | (Failed, Processing)
                | (Completed, Transcribed)
        )
    }

    /// Whether the state is terminal (no transition without retry or edit).
    pub fn is_terminal(&self) -> bool {
        matches!(self, EntryState::Completed | EntryState::Failed)
    }
}

impl std::fmt::Display for EntryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One theme surfaced by the analysis collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub title: String,
    pub description: String,
    /// Confidence 0-100.
    pub confidence: i32,
}

/// Sentiment breakdown for an entry. `positive + neutral + concern == 100`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub positive: i32,
    pub neutral: i32,
    pub concern: i32,
    /// Dominant label, e.g. "positive".
    pub overall: String,
}

impl Sentiment {
    /// A neutral breakdown, used when the analyzer returns nothing usable.
    pub fn neutral() -> Self {
        Self {
            positive: 0,
            neutral: 100,
            concern: 0,
            overall: "neutral".to_string(),
        }
    }
}

/// Analysis output persisted on a completed entry.
///
/// Written once per successful analysis pass and replaced wholesale on
/// re-analysis after an edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub themes: Vec<Theme>,
    pub tags: Vec<String>,
    pub sentiment: Sentiment,
}

/// One photographed journal page moving through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    /// Owning user; all queries and duplicate checks are scoped per owner.
    pub owner_id: Uuid,
    pub state: EntryState,
    pub title: Option<String>,
    /// Perceptual fingerprint of the source image; set once at creation.
    pub image_fingerprint: Option<ImageFingerprint>,
    /// Raw bytes of the source image, kept so a retry pass can re-run
    /// extraction. Absent on per-day splits. Skipped in serialization.
    #[serde(skip)]
    pub image_data: Option<Vec<u8>>,
    /// Exact fingerprint of the normalized extracted text.
    pub text_fingerprint: Option<TextFingerprint>,
    pub extracted_text: Option<String>,
    /// OCR confidence 0-100.
    pub extraction_confidence: Option<i32>,
    /// Calendar date the entry text was written, when detected.
    pub entry_date: Option<NaiveDate>,
    pub analysis: Option<AnalysisResult>,
    /// Present only when `state == Failed`.
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft-deletion marker; deleted entries release their fingerprints.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl JournalEntry {
    /// Whether the entry has usable extracted text.
    pub fn has_text(&self) -> bool {
        self.extracted_text
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }
}

/// Request for creating a new journal entry.
#[derive(Debug, Clone)]
pub struct CreateEntryRequest {
    pub owner_id: Uuid,
    pub title: Option<String>,
    pub state: EntryState,
    pub image_fingerprint: Option<ImageFingerprint>,
    pub image_data: Option<Vec<u8>>,
    pub extracted_text: Option<String>,
    pub extraction_confidence: Option<i32>,
    pub text_fingerprint: Option<TextFingerprint>,
    pub entry_date: Option<NaiveDate>,
}

impl CreateEntryRequest {
    /// A freshly accepted upload, waiting to be claimed.
    pub fn pending(
        owner_id: Uuid,
        title: Option<String>,
        fingerprint: ImageFingerprint,
        image_data: Vec<u8>,
    ) -> Self {
        Self {
            owner_id,
            title,
            state: EntryState::Pending,
            image_fingerprint: Some(fingerprint),
            image_data: Some(image_data),
            extracted_text: None,
            extraction_confidence: None,
            text_fingerprint: None,
            entry_date: None,
        }
    }

    /// A per-day split of an already-transcribed multi-day page.
    ///
    /// Split entries carry no image fingerprint; only the first block of a
    /// page keeps it.
    pub fn transcribed_split(
        owner_id: Uuid,
        text: String,
        confidence: i32,
        fingerprint: TextFingerprint,
        entry_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            owner_id,
            title: None,
            state: EntryState::Transcribed,
            image_fingerprint: None,
            image_data: None,
            extracted_text: Some(text),
            extraction_confidence: Some(confidence),
            text_fingerprint: Some(fingerprint),
            entry_date,
        }
    }
}

/// Caller-facing status view of an entry (the polling contract).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryStatus {
    pub id: Uuid,
    pub state: EntryState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// Aggregate result of one retry sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepOutcome {
    /// Entries resubmitted and recovered to a success state.
    pub retried: i64,
    /// Entries that failed again (or could not be claimed).
    pub still_failed: i64,
}

/// How a batch of uploads should be interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestMode {
    /// One entry per image.
    #[default]
    Single,
    /// Extracted text may span several days; run date segmentation.
    MultiDay,
}

/// Per-file outcome summary of a bulk ingestion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Entries created (including per-day splits).
    pub processed: Vec<Uuid>,
    /// Existing entries that caused duplicate rejections.
    pub duplicates: Vec<Uuid>,
    /// Human-readable per-file errors.
    pub errors: Vec<String>,
}

impl BatchSummary {
    pub fn is_clean(&self) -> bool {
        self.duplicates.is_empty() && self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_state_round_trip() {
        for state in [
            EntryState::Pending,
            EntryState::Processing,
            EntryState::Transcribed,
            EntryState::Completed,
            EntryState::Failed,
        ] {
            assert_eq!(EntryState::parse(state.as_str()), Some(state));
        }
    }

    #[test]
    fn test_entry_state_parse_unknown() {
        assert_eq!(EntryState::parse("cancelled"), None);
        assert_eq!(EntryState::parse(""), None);
        assert_eq!(EntryState::parse("PENDING"), None);
    }

    #[test]
    fn test_legal_transitions() {
        use EntryState::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Transcribed));
        assert!(Processing.can_transition_to(Failed));
        assert!(Transcribed.can_transition_to(Completed));
        assert!(Transcribed.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Processing));
        assert!(Completed.can_transition_to(Transcribed));
    }

    #[test]
    fn test_illegal_transitions() {
        use EntryState::*;
        // No cancel path, no skipping Transcribed, no resurrect from Completed
        // except the edit transition.
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Failed));
        assert!(!Processing.can_transition_to(Completed));
        assert!(!Processing.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!Failed.can_transition_to(Transcribed));
        assert!(!Transcribed.can_transition_to(Pending));
    }

    #[test]
    fn test_no_state_transitions_to_itself() {
        for state in [
            EntryState::Pending,
            EntryState::Processing,
            EntryState::Transcribed,
            EntryState::Completed,
            EntryState::Failed,
        ] {
            assert!(!state.can_transition_to(state));
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(EntryState::Completed.is_terminal());
        assert!(EntryState::Failed.is_terminal());
        assert!(!EntryState::Pending.is_terminal());
        assert!(!EntryState::Processing.is_terminal());
        assert!(!EntryState::Transcribed.is_terminal());
    }

    #[test]
    fn test_entry_state_serde() {
        let json = serde_json::to_string(&EntryState::Transcribed).unwrap();
        assert_eq!(json, "\"transcribed\"");
        let state: EntryState = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(state, EntryState::Failed);
    }

    #[test]
    fn test_sentiment_neutral() {
        let s = Sentiment::neutral();
        assert_eq!(s.positive + s.neutral + s.concern, 100);
        assert_eq!(s.overall, "neutral");
    }

    #[test]
    fn test_analysis_result_serde_round_trip() {
        let analysis = AnalysisResult {
            themes: vec![Theme {
                title: "Gratitude".to_string(),
                description: "Reflections on small daily wins".to_string(),
                confidence: 85,
            }],
            tags: vec!["gratitude".to_string(), "morning".to_string()],
            sentiment: Sentiment {
                positive: 70,
                neutral: 20,
                concern: 10,
                overall: "positive".to_string(),
            },
        };

        let json = serde_json::to_string(&analysis).unwrap();
        let parsed: AnalysisResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, analysis);
    }

    #[test]
    fn test_create_entry_request_pending() {
        let fp = ImageFingerprint::from_bits(vec![0u8; 128]).unwrap();
        let owner = Uuid::new_v4();
        let req =
            CreateEntryRequest::pending(owner, Some("Trip notes".into()), fp, vec![1, 2, 3]);
        assert_eq!(req.state, EntryState::Pending);
        assert_eq!(req.owner_id, owner);
        assert!(req.image_fingerprint.is_some());
        assert!(req.image_data.is_some());
        assert!(req.extracted_text.is_none());
        assert!(req.text_fingerprint.is_none());
    }

    #[test]
    fn test_create_entry_request_split_has_no_image_fingerprint() {
        let owner = Uuid::new_v4();
        let fp = TextFingerprint::of("slept in");
        let req = CreateEntryRequest::transcribed_split(
            owner,
            "slept in".to_string(),
            90,
            fp,
            NaiveDate::from_ymd_opt(2024, 1, 6),
        );
        assert_eq!(req.state, EntryState::Transcribed);
        assert!(req.image_fingerprint.is_none());
        assert!(req.extracted_text.is_some());
        assert_eq!(req.entry_date, NaiveDate::from_ymd_opt(2024, 1, 6));
    }

    #[test]
    fn test_has_text() {
        let mut entry = JournalEntry {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            state: EntryState::Transcribed,
            title: None,
            image_fingerprint: None,
            image_data: None,
            text_fingerprint: None,
            extracted_text: Some("Woke up early".to_string()),
            extraction_confidence: Some(90),
            entry_date: None,
            analysis: None,
            failure_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        };
        assert!(entry.has_text());

        entry.extracted_text = Some("   \n ".to_string());
        assert!(!entry.has_text());

        entry.extracted_text = None;
        assert!(!entry.has_text());
    }

    #[test]
    fn test_batch_summary_is_clean() {
        let mut summary = BatchSummary::default();
        assert!(summary.is_clean());
        summary.errors.push("page3.jpg: no readable text".into());
        assert!(!summary.is_clean());
    }

    #[test]
    fn test_entry_status_serialization_skips_none() {
        let status = EntryStatus {
            id: Uuid::nil(),
            state: EntryState::Pending,
            extracted_text: None,
            confidence: None,
            failure_reason: None,
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(!json.contains("extracted_text"));
        assert!(!json.contains("failure_reason"));
    }
}
