//! Core types, configuration, and models for the thread reconstruction
//! engine.
//!
//! This crate provides:
//! - Data models (`EmailRecord`, `DerivedFields`, `Thread`, `Edge`, ...)
//! - Configuration (`EngineConfig`, environment parsing)
//! - Common error types

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod models;

// Re-export key types for convenience
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use models::{
    DerivedFields, Edge, EmailRecord, EntitySet, RelationType, SearchContext, SearchOutcome,
    Thread, ThreadRelation, ThreadSummary,
};
