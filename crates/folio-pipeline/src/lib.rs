//! # folio-pipeline
//!
//! The folio ingestion pipeline: duplicate gating, the per-entry processing
//! state machine, a supervised background worker, and the retry sweeper.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use folio_db::Database;
//! use folio_inference::{InferenceConfig, OllamaAnalyzer, OllamaTextExtractor};
//! use folio_pipeline::{
//!     IngestionOrchestrator, PipelineWorker, RetrySweeper, SubmitOutcome, WorkerConfig,
//! };
//!
//! let db = Database::connect("postgres://...").await?;
//! let config = InferenceConfig::from_env();
//!
//! let orchestrator = Arc::new(IngestionOrchestrator::new(
//!     Arc::new(db.entries),
//!     Arc::new(OllamaTextExtractor::new(&config)),
//!     Arc::new(OllamaAnalyzer::new(&config)),
//! ));
//!
//! // Background processing of submitted uploads.
//! let handle = PipelineWorker::new(orchestrator.clone(), WorkerConfig::from_env()).start();
//!
//! match orchestrator.submit(owner_id, image_bytes, None).await? {
//!     SubmitOutcome::Accepted(id) => println!("processing {}", id),
//!     SubmitOutcome::Duplicate { existing } => println!("already uploaded as {}", existing),
//! }
//!
//! // Periodic recovery of failed or abandoned entries.
//! let outcome = RetrySweeper::new(orchestrator.clone()).sweep().await?;
//! println!("retried {}, still failed {}", outcome.retried, outcome.still_failed);
//! ```

pub mod gate;
pub mod orchestrator;
pub mod sweeper;
pub mod worker;

// Re-export core types
pub use folio_core::*;

pub use gate::{Admission, DuplicateGate};
pub use orchestrator::{IngestionOrchestrator, SubmitOutcome, Upload};
pub use sweeper::{RetrySweeper, SweeperConfig};
pub use worker::{PipelineWorker, WorkerConfig, WorkerEvent, WorkerHandle};
