//! Error types for the thread reconstruction engine.
//!
//! The taxonomy mirrors the processing contract: a malformed table shape
//! aborts the whole run before any work happens, while per-field parse
//! failures degrade to sentinel values inside the normalizer and never
//! surface here.

use thiserror::Error;

/// Result type alias for thread reconstruction operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the thread reconstruction engine
#[derive(Debug, Error)]
pub enum Error {
    // ==========================================================================
    // Input-shape errors (fail fast, before any processing)
    // ==========================================================================
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("input table is empty")]
    EmptyTable,

    // ==========================================================================
    // Configuration errors
    // ==========================================================================
    #[error("unknown display timezone: {0}")]
    UnknownTimezone(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ==========================================================================
    // I/O and serialization (CLI surface)
    // ==========================================================================
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
