//! Confidence scorer.
//!
//! A deterministic, explainable weighted blend of signal agreements between
//! two records. The output is a ranking signal in `[0, 0.9]`, not a
//! calibrated probability — 0.9 is a deliberate cap so no heuristic match is
//! ever reported as fully certain.

use thread_recon_core::models::{DerivedFields, EntitySet};

/// Hard ceiling on any heuristic confidence.
pub const CONFIDENCE_CAP: f64 = 0.9;
/// Short-circuit score for an identical non-empty thread key, the strongest
/// single signal.
pub const THREAD_KEY_SCORE: f64 = 0.85;

const SUBJECT_WEIGHT: f64 = 0.4;
const PARTICIPANTS_WEIGHT: f64 = 0.3;
const ENTITY_WEIGHT: f64 = 0.2;
const TEMPORAL_WEIGHT: f64 = 0.1;
/// Temporal proximity only contributes when the factor clears this floor,
/// i.e. the records are within ~3.5 days of each other.
const TEMPORAL_FLOOR: f64 = 0.5;
const TEMPORAL_HORIZON_DAYS: f64 = 7.0;

/// Score how strongly two records appear to belong to the same conversation.
#[must_use]
pub fn score(a: &DerivedFields, b: &DerivedFields) -> f64 {
    if !a.thread_key.is_empty() && a.thread_key == b.thread_key {
        return THREAD_KEY_SCORE;
    }

    let mut total = 0.0;
    if a.subject_norm == b.subject_norm {
        total += SUBJECT_WEIGHT;
    }
    if a.participants_norm == b.participants_norm {
        total += PARTICIPANTS_WEIGHT;
    }
    if entities_overlap(&a.entities, &b.entities) {
        total += ENTITY_WEIGHT;
    }
    if let Some(factor) = temporal_proximity(a, b) {
        if factor > TEMPORAL_FLOOR {
            total += TEMPORAL_WEIGHT * factor;
        }
    }
    total.min(CONFIDENCE_CAP)
}

/// `max(0, 1 − |days_between| / 7)`, or `None` when either timestamp is
/// missing.
#[must_use]
pub fn temporal_proximity(a: &DerivedFields, b: &DerivedFields) -> Option<f64> {
    let (ta, tb) = (a.delivery_time?, b.delivery_time?);
    let days = ((ta - tb).num_seconds().abs() as f64) / 86_400.0;
    Some((1.0 - days / TEMPORAL_HORIZON_DAYS).max(0.0))
}

/// Any value of any family overlapping as a substring in either direction.
fn entities_overlap(a: &EntitySet, b: &EntitySet) -> bool {
    for (fa, fb) in [(&a.cases, &b.cases), (&a.sites, &b.sites), (&a.lpos, &b.lpos)] {
        for x in fa {
            for y in fb {
                if x.contains(y.as_str()) || y.contains(x.as_str()) {
                    return true;
                }
            }
        }
    }
    false
}
