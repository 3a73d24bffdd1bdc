//! Structured logging field name constants for folio.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "pipeline", "db", "inference"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "orchestrator", "sweeper", "worker", "gate", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "submit", "process_entry", "sweep", "extract", "analyze"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Journal entry UUID being operated on.
pub const ENTRY_ID: &str = "entry_id";

/// Owner UUID scoping the operation.
pub const OWNER_ID: &str = "owner_id";

/// Entry state after the logged transition.
pub const STATE: &str = "state";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Byte length of extracted text.
pub const TEXT_LEN: &str = "text_len";

/// Number of per-day splits produced by segmentation.
pub const SPLIT_COUNT: &str = "split_count";

/// Entries retried by a sweep.
pub const RETRIED: &str = "retried";

/// Entries still failed after a sweep.
pub const STILL_FAILED: &str = "still_failed";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for extraction or analysis.
pub const MODEL: &str = "model";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
