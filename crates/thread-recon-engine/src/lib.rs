//! Heuristic email-thread reconstruction engine.
//!
//! Given a flat table of emails with no native Message-ID/In-Reply-To
//! headers, this crate rebuilds conversation threads from derived signals:
//!
//! - [`normalize`] — per-record derived fields (subject, participants,
//!   body hash, thread-key heuristic, domain entities)
//! - [`index`] — inverted indexes over all records
//! - [`cluster`] — single-pass, seed-anchored thread clustering
//! - [`score`] — explainable pairwise confidence in `[0, 0.9]`
//! - [`edges`] — bounded-lookback parent→child edge construction
//! - [`search`] — substring + entity queries with thread context expansion
//! - [`pipeline`] — orchestration and artifact shaping
//!
//! The engine is best-effort and auditability-first: it never merges or
//! splits a thread after creation, and every confidence value decomposes
//! into named signal agreements.

#![forbid(unsafe_code)]

pub mod cluster;
pub mod edges;
pub mod entities;
pub mod index;
pub mod normalize;
pub mod pipeline;
pub mod score;
pub mod search;

pub use cluster::{Clustering, cluster as cluster_records};
pub use edges::build_edges;
pub use index::Indexes;
pub use normalize::normalize;
pub use pipeline::{InputRow, Pipeline, records_from_rows, run};
pub use score::{CONFIDENCE_CAP, THREAD_KEY_SCORE, score};
pub use search::search as search_records;
