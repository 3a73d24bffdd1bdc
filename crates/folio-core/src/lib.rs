//! # folio-core
//!
//! Core types, traits, and abstractions for the folio journal ingestion
//! pipeline.
//!
//! This crate provides the foundational data structures and trait
//! definitions that other folio crates depend on: the entry state machine,
//! perceptual and exact content fingerprints, the date segmentation engine,
//! and the repository/collaborator seams.

pub mod dates;
pub mod defaults;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use dates::{detect_dates, segment, DetectedDate, SplitEntry};
pub use error::{Error, Result};
pub use fingerprint::{normalize_text, ImageFingerprint, TextFingerprint};
pub use models::*;
pub use traits::*;

/// Generate a new UUIDv7 (time-ordered) identifier.
pub fn new_v7() -> uuid::Uuid {
    uuid::Uuid::now_v7()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_v7() {
        let a = new_v7();
        let b = new_v7();
        assert_ne!(a, b);
        assert_eq!(a.get_version_num(), 7);
    }
}
