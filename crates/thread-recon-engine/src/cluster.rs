//! Thread clustering engine.
//!
//! Single forward pass over records in input order. Each unprocessed record
//! becomes the seed of a new thread built from the union of its index hits;
//! records with no collisions stay implicit singletons (no thread is
//! materialized for them). Candidates are never expanded transitively — a
//! candidate-of-a-candidate that does not also match the seed directly is
//! not pulled in, which bounds cost but lets long drifting reply chains
//! fragment. Threads are immutable once created: no merge, no split, no
//! re-clustering pass.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Duration;

use thread_recon_core::models::{DerivedFields, RelationType, Thread, ThreadRelation};

use crate::index::Indexes;
use crate::score;

/// Same-sender co-occurrence window, in days either side of the seed.
const SENDER_DAY_WINDOW: i64 = 3;

/// Clustering result: materialized threads plus the per-record assignment
/// map. Records absent from `relations` are singletons of size 1.
#[derive(Debug, Default)]
pub struct Clustering {
    pub threads: Vec<Thread>,
    pub relations: BTreeMap<usize, ThreadRelation>,
}

impl Clustering {
    /// Thread lookup by id.
    #[must_use]
    pub fn thread(&self, thread_id: &str) -> Option<&Thread> {
        self.threads.iter().find(|t| t.thread_id == thread_id)
    }
}

/// Run the single-pass clustering over all records.
#[must_use]
pub fn cluster(derived: &[DerivedFields], idx: &Indexes) -> Clustering {
    let mut processed = vec![false; derived.len()];
    let mut out = Clustering::default();
    let mut next_thread = 1usize;

    for seed in 0..derived.len() {
        if processed[seed] {
            continue;
        }
        let mut candidates = collect_candidates(seed, derived, idx);
        candidates.remove(&seed);
        // Records already owned by an earlier thread stay there; ownership
        // is exclusive for a record's lifetime.
        candidates.retain(|&row| !processed[row]);

        if candidates.is_empty() {
            processed[seed] = true;
            continue;
        }

        let thread_id = format!("thread_{next_thread}");
        next_thread += 1;

        let mut members = Vec::with_capacity(candidates.len() + 1);
        members.push(seed);
        members.extend(candidates.iter().copied());

        let mut best = 0.0f64;
        for &row in &members {
            let confidence = score::score(&derived[seed], &derived[row]);
            best = best.max(confidence);
            out.relations.insert(
                row,
                ThreadRelation {
                    thread_id: thread_id.clone(),
                    confidence,
                    relation_type: RelationType::Heuristic,
                },
            );
            processed[row] = true;
        }

        out.threads.push(Thread {
            thread_id,
            members,
            confidence: best,
            seed,
        });
    }

    tracing::info!(
        rows = derived.len(),
        threads = out.threads.len(),
        assigned = out.relations.len(),
        "clustering complete"
    );
    out
}

/// Union of index hits for one seed record: thread key, subject,
/// participants, body hash, every entity token, and same-sender rows within
/// ±3 delivery days (evaluated lazily, only when the seed has both a sender
/// and a parsed delivery day).
fn collect_candidates(seed: usize, derived: &[DerivedFields], idx: &Indexes) -> BTreeSet<usize> {
    let d = &derived[seed];
    let mut hits = BTreeSet::new();

    for (family, token) in [
        (&idx.thread_key, d.thread_key.as_str()),
        (&idx.subject, d.subject_norm.as_str()),
        (&idx.participants, d.participants_norm.as_str()),
        (&idx.body_hash, d.body_hash.as_str()),
    ] {
        if let Some(rows) = Indexes::rows(family, token) {
            hits.extend(rows.iter().copied());
        }
    }
    for token in d.entities.cases.iter() {
        if let Some(rows) = Indexes::rows(&idx.case, token) {
            hits.extend(rows.iter().copied());
        }
    }
    for token in d.entities.sites.iter() {
        if let Some(rows) = Indexes::rows(&idx.site, token) {
            hits.extend(rows.iter().copied());
        }
    }
    for token in d.entities.lpos.iter() {
        if let Some(rows) = Indexes::rows(&idx.lpo, token) {
            hits.extend(rows.iter().copied());
        }
    }

    if !d.sender_email_norm.is_empty() {
        if let (Some(sender_rows), Some(dt)) =
            (Indexes::rows(&idx.sender, &d.sender_email_norm), d.delivery_time)
        {
            for offset in -SENDER_DAY_WINDOW..=SENDER_DAY_WINDOW {
                let day = (dt + Duration::days(offset)).format("%Y-%m-%d").to_string();
                if let Some(day_rows) = Indexes::rows(&idx.day, &day) {
                    hits.extend(sender_rows.intersection(day_rows).copied());
                }
            }
        }
    }

    hits
}
