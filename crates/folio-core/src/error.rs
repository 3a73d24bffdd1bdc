//! Error types for the folio ingestion pipeline.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using folio's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for folio operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Uploaded content could not be decoded or fingerprinted
    #[error("Unreadable content: {0}")]
    Unreadable(String),

    /// Content collides with an existing entry's fingerprint
    #[error("Duplicate content: matches entry {existing}")]
    DuplicateContent {
        /// The entry already holding the colliding fingerprint.
        existing: Uuid,
    },

    /// Text extraction collaborator failed
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Extraction produced no usable text
    #[error("No readable text in image")]
    NoReadableText,

    /// Analysis collaborator failed
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Downstream sync failed (best-effort, never fatal to the pipeline)
    #[error("Sync error: {0}")]
    Sync(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Journal entry not found
    #[error("Entry not found: {0}")]
    EntryNotFound(Uuid),

    /// Illegal state machine transition
    #[error("Invalid state transition: {0}")]
    InvalidState(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

impl Error {
    /// Whether this error must fail the submission synchronously rather than
    /// being recorded on the entry.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Error::Unreadable(_) | Error::DuplicateContent { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_unreadable() {
        let err = Error::Unreadable("corrupt JPEG".to_string());
        assert_eq!(err.to_string(), "Unreadable content: corrupt JPEG");
    }

    #[test]
    fn test_error_display_duplicate_content() {
        let id = Uuid::nil();
        let err = Error::DuplicateContent { existing: id };
        assert_eq!(
            err.to_string(),
            format!("Duplicate content: matches entry {}", id)
        );
    }

    #[test]
    fn test_error_display_extraction() {
        let err = Error::Extraction("vision model unavailable".to_string());
        assert_eq!(
            err.to_string(),
            "Extraction error: vision model unavailable"
        );
    }

    #[test]
    fn test_error_display_no_readable_text() {
        let err = Error::NoReadableText;
        assert_eq!(err.to_string(), "No readable text in image");
    }

    #[test]
    fn test_error_display_analysis() {
        let err = Error::Analysis("model timeout".to_string());
        assert_eq!(err.to_string(), "Analysis error: model timeout");
    }

    #[test]
    fn test_error_display_sync() {
        let err = Error::Sync("mirror unreachable".to_string());
        assert_eq!(err.to_string(), "Sync error: mirror unreachable");
    }

    #[test]
    fn test_error_display_entry_not_found() {
        let id = Uuid::new_v4();
        let err = Error::EntryNotFound(id);
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_error_display_invalid_state() {
        let err = Error::InvalidState("completed -> pending".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid state transition: completed -> pending"
        );
    }

    #[test]
    fn test_is_rejection() {
        assert!(Error::Unreadable("x".into()).is_rejection());
        assert!(Error::DuplicateContent {
            existing: Uuid::nil()
        }
        .is_rejection());
        assert!(!Error::NoReadableText.is_rejection());
        assert!(!Error::Analysis("x".into()).is_rejection());
        assert!(!Error::Internal("x".into()).is_rejection());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn test_result_type_ok() {
        fn get_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(get_result().unwrap(), 42);
    }
}
