//! Centralized default constants for the folio pipeline.
//!
//! **This module is the single source of truth** for shared default values.
//! All crates reference these constants instead of defining their own magic
//! numbers.

// =============================================================================
// FINGERPRINTING
// =============================================================================

/// Side length of the downsampled grid used for the perceptual image hash.
pub const FINGERPRINT_GRID: u32 = 32;

/// Total bits in an image fingerprint (one per grid cell).
pub const FINGERPRINT_BITS: usize = (FINGERPRINT_GRID * FINGERPRINT_GRID) as usize;

/// Image fingerprint length in bytes.
pub const FINGERPRINT_BYTES: usize = FINGERPRINT_BITS / 8;

/// Image fingerprint length in hex characters (the storage encoding).
pub const FINGERPRINT_HEX_LEN: usize = FINGERPRINT_BYTES * 2;

/// Maximum Hamming distance at which two image fingerprints count as
/// duplicates (≈1% of 1,024 bits).
pub const IMAGE_DISTANCE_THRESHOLD: u32 = 12;

// =============================================================================
// DATE SEGMENTATION
// =============================================================================

/// Detected dates this close together (bytes) resolving to the same day are
/// one marker, not two.
pub const DATE_DEDUP_WINDOW: usize = 10;

/// A date's span must exceed the matched date text by this many bytes to
/// become an entry of its own.
pub const DATE_SPAN_MARGIN: usize = 8;

/// Parsed dates in or before this year are treated as false positives.
pub const MIN_DATE_YEAR: i32 = 1900;

// =============================================================================
// ANALYSIS
// =============================================================================

/// Maximum themes kept from one analysis pass.
pub const MAX_ANALYSIS_THEMES: usize = 3;

/// Maximum tags kept from one analysis pass.
pub const MAX_ANALYSIS_TAGS: usize = 5;

/// Confidence reported for vision-LLM extraction, which exposes no per-word
/// confidence data (0-100 scale).
pub const VISION_EXTRACTION_CONFIDENCE: i32 = 90;

// =============================================================================
// PIPELINE WORKER
// =============================================================================

/// Polling interval when no claimable entries exist (milliseconds).
pub const WORKER_POLL_INTERVAL_MS: u64 = 500;

/// Maximum entries processed concurrently by one worker.
pub const WORKER_MAX_CONCURRENT: usize = 4;

/// Per-entry processing timeout in seconds.
pub const ENTRY_TIMEOUT_SECS: u64 = 300;

/// Event bus broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// RETRY SWEEPER
// =============================================================================

/// Age after which a `Processing` entry is considered abandoned and eligible
/// for sweep-driven retry (seconds).
pub const STALE_PROCESSING_SECS: i64 = 900;

/// Maximum entries examined per sweep.
pub const SWEEP_BATCH_LIMIT: i64 = 50;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default vision model for page text extraction.
pub const VISION_MODEL: &str = "qwen3-vl:8b";

/// Default generation model for entry analysis.
pub const ANALYSIS_MODEL: &str = "gpt-oss:20b";

/// Timeout for extraction requests in seconds.
pub const EXTRACT_TIMEOUT_SECS: u64 = 120;

/// Timeout for analysis requests in seconds.
pub const ANALYZE_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// UPLOADS
// =============================================================================

/// Maximum accepted image upload size in bytes (20 MB).
pub const MAX_UPLOAD_SIZE_BYTES: usize = 20 * 1024 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_dimensions_are_consistent() {
        const {
            assert!(FINGERPRINT_BITS == 1024);
            assert!(FINGERPRINT_BYTES == 128);
            assert!(FINGERPRINT_HEX_LEN == 256);
            assert!(FINGERPRINT_BITS % 8 == 0);
        }
    }

    #[test]
    fn threshold_is_about_one_percent_of_bits() {
        assert!((IMAGE_DISTANCE_THRESHOLD as usize) * 100 / FINGERPRINT_BITS <= 2);
    }

    #[test]
    fn sweep_staleness_exceeds_entry_timeout() {
        // A stale entry must be older than any legitimately running pass.
        assert!(STALE_PROCESSING_SECS as u64 > ENTRY_TIMEOUT_SECS);
    }
}
