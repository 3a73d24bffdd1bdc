//! Mock collaborators for deterministic testing.
//!
//! Each mock records its calls behind an `Arc<Mutex<…>>` so tests can assert
//! exactly how many times the pipeline invoked a collaborator (the retry
//! idempotence properties depend on this), and can be scripted to fail a
//! fixed number of leading calls before succeeding.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use folio_core::{
    AnalysisResult, Analyzer, Error, ExtractedText, JournalEntry, Result, Sentiment, SyncTarget,
    TextExtractor, Theme,
};

/// Mock text extractor returning a fixed transcription.
#[derive(Clone)]
pub struct MockTextExtractor {
    text: Arc<Mutex<String>>,
    confidence: i32,
    fail_first: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl MockTextExtractor {
    /// Create a mock returning the given text.
    pub fn returning(text: impl Into<String>) -> Self {
        Self {
            text: Arc::new(Mutex::new(text.into())),
            confidence: 90,
            fail_first: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a mock returning empty text (an unreadable page).
    pub fn returning_empty() -> Self {
        Self::returning("")
    }

    /// Fail the first `n` calls with an extraction error, then succeed.
    pub fn fail_first(self, n: usize) -> Self {
        self.fail_first.store(n, Ordering::SeqCst);
        self
    }

    /// Set the reported confidence.
    pub fn with_confidence(mut self, confidence: i32) -> Self {
        self.confidence = confidence;
        self
    }

    /// Replace the text returned by subsequent calls.
    pub fn set_text(&self, text: impl Into<String>) {
        *self.text.lock().unwrap() = text.into();
    }

    /// Number of extraction calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextExtractor for MockTextExtractor {
    async fn extract(&self, _image: &[u8]) -> Result<ExtractedText> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Extraction("scripted extraction failure".to_string()));
        }

        Ok(ExtractedText {
            text: self.text.lock().unwrap().clone(),
            confidence: self.confidence,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "mock-extractor"
    }
}

/// Mock analyzer returning a fixed analysis.
#[derive(Clone)]
pub struct MockAnalyzer {
    result: Arc<Mutex<AnalysisResult>>,
    fail_first: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
    analyzed_texts: Arc<Mutex<Vec<String>>>,
}

impl MockAnalyzer {
    /// Create a mock returning a plausible fixed analysis.
    pub fn new() -> Self {
        Self::returning(AnalysisResult {
            themes: vec![Theme {
                title: "Daily life".to_string(),
                description: "Ordinary observations from the day".to_string(),
                confidence: 80,
            }],
            tags: vec!["journal".to_string()],
            sentiment: Sentiment {
                positive: 50,
                neutral: 40,
                concern: 10,
                overall: "positive".to_string(),
            },
        })
    }

    /// Create a mock returning the given analysis.
    pub fn returning(result: AnalysisResult) -> Self {
        Self {
            result: Arc::new(Mutex::new(result)),
            fail_first: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
            analyzed_texts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fail the first `n` calls with an analysis error, then succeed.
    pub fn fail_first(self, n: usize) -> Self {
        self.fail_first.store(n, Ordering::SeqCst);
        self
    }

    /// Number of analysis calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every text submitted for analysis, in order.
    pub fn analyzed_texts(&self) -> Vec<String> {
        self.analyzed_texts.lock().unwrap().clone()
    }
}

impl Default for MockAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Analyzer for MockAnalyzer {
    async fn analyze(&self, text: &str) -> Result<AnalysisResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.analyzed_texts.lock().unwrap().push(text.to_string());

        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Analysis("scripted analysis failure".to_string()));
        }

        Ok(self.result.lock().unwrap().clone())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "mock-analyzer"
    }
}

/// Sync target recording every entry it receives; optionally always failing.
#[derive(Clone, Default)]
pub struct RecordingSyncTarget {
    synced: Arc<Mutex<Vec<Uuid>>>,
    failing: bool,
}

impl RecordingSyncTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// A target whose every sync fails, for best-effort semantics tests.
    pub fn failing() -> Self {
        Self {
            synced: Arc::new(Mutex::new(Vec::new())),
            failing: true,
        }
    }

    /// IDs of entries synced so far.
    pub fn synced_ids(&self) -> Vec<Uuid> {
        self.synced.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncTarget for RecordingSyncTarget {
    fn name(&self) -> &str {
        if self.failing {
            "recording-sync (failing)"
        } else {
            "recording-sync"
        }
    }

    async fn sync(&self, entry: &JournalEntry) -> Result<()> {
        self.synced.lock().unwrap().push(entry.id);
        if self.failing {
            return Err(Error::Sync("scripted sync failure".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_extractor_returns_text_and_counts_calls() {
        let extractor = MockTextExtractor::returning("hello page");
        let out = extractor.extract(b"image").await.unwrap();
        assert_eq!(out.text, "hello page");
        assert_eq!(out.confidence, 90);
        assert_eq!(extractor.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_extractor_fail_first() {
        let extractor = MockTextExtractor::returning("eventually").fail_first(2);

        assert!(extractor.extract(b"x").await.is_err());
        assert!(extractor.extract(b"x").await.is_err());
        let out = extractor.extract(b"x").await.unwrap();
        assert_eq!(out.text, "eventually");
        assert_eq!(extractor.call_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_analyzer_records_inputs() {
        let analyzer = MockAnalyzer::new();
        analyzer.analyze("first").await.unwrap();
        analyzer.analyze("second").await.unwrap();

        assert_eq!(analyzer.call_count(), 2);
        assert_eq!(analyzer.analyzed_texts(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_failing_sync_target_still_records() {
        let target = RecordingSyncTarget::failing();
        let entry = JournalEntry {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            state: folio_core::EntryState::Completed,
            title: None,
            image_fingerprint: None,
            image_data: None,
            text_fingerprint: None,
            extracted_text: None,
            extraction_confidence: None,
            entry_date: None,
            analysis: None,
            failure_reason: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            deleted_at: None,
        };

        assert!(target.sync(&entry).await.is_err());
        assert_eq!(target.synced_ids(), vec![entry.id]);
    }
}
