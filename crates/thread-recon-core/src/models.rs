//! Data models for thread reconstruction.
//!
//! The engine consumes a flat table of email rows with no native
//! Message-ID/In-Reply-To headers and rebuilds conversation threads from
//! derived signals. All derived fields are computed exactly once per record
//! and are immutable afterward.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// =============================================================================
// EmailRecord
// =============================================================================

/// One row of the input table, raw fields only.
///
/// # Constraints
/// - `row`: stable identity within a load, never reused.
/// - Recipient fields are free text, semicolon/comma separated.
/// - `delivery_time_raw` may be naive, tz-aware, or unparseable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailRecord {
    pub row: usize,
    pub subject: String,
    pub sender_name: String,
    pub sender_email: String,
    pub recipient_to: String,
    pub recipient_cc: String,
    pub recipient_bcc: String,
    pub delivery_time_raw: String,
    pub body: String,
    /// Pre-existing entity columns from the input table, merged with (never
    /// overriding) the engine's own extraction.
    #[serde(default)]
    pub seed_entities: EntitySet,
}

// =============================================================================
// Entities
// =============================================================================

/// Domain entities found in a record (or parsed from a search query).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySet {
    pub cases: BTreeSet<String>,
    pub sites: BTreeSet<String>,
    pub lpos: BTreeSet<String>,
}

impl EntitySet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty() && self.sites.is_empty() && self.lpos.is_empty()
    }

    /// Union the other set into this one.
    pub fn merge(&mut self, other: &Self) {
        self.cases.extend(other.cases.iter().cloned());
        self.sites.extend(other.sites.iter().cloned());
        self.lpos.extend(other.lpos.iter().cloned());
    }

    /// All tokens across the three families, in deterministic order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.cases
            .iter()
            .chain(self.sites.iter())
            .chain(self.lpos.iter())
            .map(String::as_str)
    }
}

// =============================================================================
// DerivedFields
// =============================================================================

/// Derived signals for one record. Computed once by the normalizer; the
/// normalizer is total, so every field has a sentinel for malformed input
/// (empty string, `"unknown"` bucket, empty set) rather than an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DerivedFields {
    /// Cleaned, upper-cased, prefix/tag-stripped subject. Empty string is a
    /// valid "no subject" value, distinct from missing.
    pub subject_norm: String,
    /// Lower-cased unique participant identities (emails, or a
    /// `name:<label>` pseudo-identity when the sender has no address).
    pub participants: BTreeSet<String>,
    /// `|`-joined sorted serialization of `participants`.
    pub participants_norm: String,
    /// SHA-256 hex of the normalized body; empty string for empty bodies.
    pub body_hash: String,
    /// Coarse composite clustering key:
    /// `subject_norm[..120] || participants_norm[..200] || week_bucket`.
    pub thread_key: String,
    /// Parsed delivery time (UTC-naive), or `None` when unparseable.
    pub delivery_time: Option<NaiveDateTime>,
    /// `YYYY-MM-DD` of `delivery_time`, or `None`.
    pub delivery_day: Option<String>,
    /// Monday-aligned ISO week bucket `YYYY-Www`, or `"unknown"`.
    pub week_bucket: String,
    /// Lower-cased sender address, or empty when none resolved.
    pub sender_email_norm: String,
    /// Extracted + seeded domain entities.
    pub entities: EntitySet,
}

// =============================================================================
// Thread / ThreadRelation
// =============================================================================

/// Relation kind attached to thread memberships and edges. Only heuristic
/// matching exists today; the enum leaves room for header-based relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    #[default]
    Heuristic,
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Heuristic => write!(f, "heuristic"),
        }
    }
}

/// A reconstructed conversation thread.
///
/// # Ownership
/// A record belongs to at most one thread for its lifetime. Threads are
/// created once and never merged or split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    /// Synthetic id, `thread_<n>`.
    pub thread_id: String,
    /// Member row indices: seed first, then sorted candidates.
    pub members: Vec<usize>,
    /// Maximum member-relation confidence (see DESIGN.md).
    pub confidence: f64,
    /// The row that seeded this thread; all member confidences are anchored
    /// to it.
    pub seed: usize,
}

impl Thread {
    #[must_use]
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

/// Per-record thread assignment, set exactly once during clustering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadRelation {
    pub thread_id: String,
    /// Confidence of this record's relation to the thread seed, in [0, 0.9].
    pub confidence: f64,
    pub relation_type: RelationType,
}

// =============================================================================
// Edge
// =============================================================================

/// Directed parent→child relation within one thread. Derived data, fully
/// recomputable from records + thread membership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub thread_id: String,
    pub relation_type: RelationType,
    /// Pairwise parent/child confidence, in [0, 0.9].
    pub confidence: f64,
    pub parent_row: usize,
    pub child_row: usize,
    /// 1-based display ordinals of the two endpoints.
    pub parent_no: usize,
    pub child_no: usize,
    pub parent_delivery_time: Option<NaiveDateTime>,
    pub child_delivery_time: Option<NaiveDateTime>,
    /// Denormalized from the child record for display.
    pub subject_norm: String,
    /// Set when no parent candidate cleared `parent_min_conf` and the
    /// chronologically nearest candidate was used instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub below_threshold: Option<bool>,
}

/// One entry of the `threads.json` artifact: a thread with its display
/// timestamps already converted to the configured timezone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub members: Vec<usize>,
    pub confidence: f64,
    /// The seed record's normalized subject.
    pub subject_norm: String,
    /// Earliest member delivery time, ISO-8601 in the display timezone.
    pub start_dt: Option<String>,
    /// Latest member delivery time, ISO-8601 in the display timezone.
    pub end_dt: Option<String>,
}

// =============================================================================
// Search
// =============================================================================

/// Diagnostic metadata attached to a search response. Not used for ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchContext {
    /// Rows that matched the query text or its entities directly.
    pub direct_hits: usize,
    /// Rows after thread context expansion (before truncation).
    pub total_with_context: usize,
    /// Distinct threads touched by the result set.
    pub threads_touched: usize,
    /// Raw entity parse of the query string.
    pub query_entities: EntitySet,
}

/// A search response: result rows (delivery time descending, truncated to
/// the configured maximum) plus diagnostic context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub rows: Vec<usize>,
    pub context: SearchContext,
}
