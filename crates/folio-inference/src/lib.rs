//! # folio-inference
//!
//! Collaborator backends for the folio ingestion pipeline: vision-model text
//! extraction and LLM analysis over a local Ollama endpoint, plus mock
//! collaborators for deterministic tests.
//!
//! ## Example
//!
//! ```ignore
//! use folio_inference::{InferenceConfig, OllamaAnalyzer, OllamaTextExtractor};
//!
//! let config = InferenceConfig::from_env();
//! let extractor = OllamaTextExtractor::new(&config);
//! let analyzer = OllamaAnalyzer::new(&config);
//! ```

pub mod analyze;
pub mod config;
pub mod extract;
pub mod mock;

// Re-export core types
pub use folio_core::*;

pub use analyze::OllamaAnalyzer;
pub use config::InferenceConfig;
pub use extract::OllamaTextExtractor;
pub use mock::{MockAnalyzer, MockTextExtractor, RecordingSyncTarget};
