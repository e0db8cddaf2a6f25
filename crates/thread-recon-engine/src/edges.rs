//! Edge builder.
//!
//! Turns each thread's unordered member set into directed parent→child
//! edges ordered by delivery time. Parent selection is bounded: only the
//! `lookback_k` chronologically preceding members are candidates, and
//! candidates further than `window_days` from the child are excluded. When
//! nothing clears `parent_min_conf`, the chronologically nearest candidate
//! is used and the edge flagged `below_threshold`.
//!
//! Every multi-member thread yields exactly `members − 1` edges (before the
//! optional below-threshold filter), forming a forest rooted at the
//! thread's earliest member.

use thread_recon_core::config::EngineConfig;
use thread_recon_core::models::{DerivedFields, Edge, RelationType, Thread};

use crate::cluster::Clustering;
use crate::score;

/// Build the full edge list for every thread with at least two members.
#[must_use]
pub fn build_edges(
    clustering: &Clustering,
    derived: &[DerivedFields],
    cfg: &EngineConfig,
) -> Vec<Edge> {
    let mut edges = Vec::new();
    for thread in &clustering.threads {
        if thread.size() < 2 {
            continue;
        }
        build_thread_edges(thread, derived, cfg, &mut edges);
    }
    tracing::info!(edges = edges.len(), "edge construction complete");
    edges
}

fn build_thread_edges(
    thread: &Thread,
    derived: &[DerivedFields],
    cfg: &EngineConfig,
    out: &mut Vec<Edge>,
) {
    let mut members = thread.members.clone();
    // Stable sort; `None < Some`, so members without a parsed timestamp stay
    // at the front in their original relative order.
    members.sort_by_key(|&row| derived[row].delivery_time);

    for pos in 1..members.len() {
        let child = members[pos];
        let start = pos.saturating_sub(cfg.lookback_k);
        let window = &members[start..pos];

        // Scan oldest→newest; `>=` lets the chronologically later candidate
        // win ties.
        let mut best: Option<(usize, f64)> = None;
        for &cand in window {
            if !within_window(&derived[cand], &derived[child], cfg.window_days) {
                continue;
            }
            let conf = score::score(&derived[cand], &derived[child]);
            if best.is_none_or(|(_, b)| conf >= b) {
                best = Some((cand, conf));
            }
        }

        let (parent, confidence, below) = match best {
            Some((cand, conf)) if conf >= cfg.parent_min_conf => (cand, conf, false),
            _ => {
                // Nearest candidate fallback: the immediately preceding
                // member. Never null while any candidate exists.
                let cand = members[pos - 1];
                let conf = score::score(&derived[cand], &derived[child]);
                (cand, conf, true)
            }
        };

        if below && cfg.filter_below_threshold {
            continue;
        }
        out.push(Edge {
            thread_id: thread.thread_id.clone(),
            relation_type: RelationType::Heuristic,
            confidence,
            parent_row: parent,
            child_row: child,
            parent_no: parent + 1,
            child_no: child + 1,
            parent_delivery_time: derived[parent].delivery_time,
            child_delivery_time: derived[child].delivery_time,
            subject_norm: derived[child].subject_norm.clone(),
            below_threshold: (below && cfg.flag_below_threshold).then_some(true),
        });
    }
}

/// A candidate is only excluded by the time window when both endpoints have
/// a parsed timestamp; a missing timestamp cannot prove the pair is too far
/// apart.
fn within_window(parent: &DerivedFields, child: &DerivedFields, window_days: i64) -> bool {
    match (parent.delivery_time, child.delivery_time) {
        (Some(p), Some(c)) => (c - p).num_seconds().abs() <= window_days * 86_400,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster;
    use crate::index::Indexes;
    use crate::normalize;
    use thread_recon_core::models::EmailRecord;

    fn reply_chain(n: usize) -> Vec<DerivedFields> {
        (0..n)
            .map(|i| {
                normalize::normalize(&EmailRecord {
                    row: i,
                    subject: "RE: Cargo manifest".into(),
                    sender_email: "ops@x.com".into(),
                    delivery_time_raw: format!("2024-03-04 {:02}:00:00", 8 + i),
                    ..EmailRecord::default()
                })
            })
            .collect()
    }

    fn run(derived: &[DerivedFields], cfg: &EngineConfig) -> Vec<Edge> {
        let idx = Indexes::build(derived);
        let clustering = cluster::cluster(derived, &idx);
        build_edges(&clustering, derived, cfg)
    }

    #[test]
    fn thread_of_k_members_yields_k_minus_one_edges() {
        let derived = reply_chain(5);
        let edges = run(&derived, &EngineConfig::default());
        assert_eq!(edges.len(), 4);
        // Rooted forest: the earliest member is never a child.
        assert!(edges.iter().all(|e| e.child_row != 0));
    }

    #[test]
    fn lookback_restricts_parent_candidates() {
        let derived = reply_chain(5);
        let cfg = EngineConfig {
            lookback_k: 2,
            ..EngineConfig::default()
        };
        let edges = run(&derived, &cfg);
        let last = edges.iter().find(|e| e.child_row == 4).unwrap();
        // Only members 2 and 3 were in the window, never 0 or 1.
        assert!(last.parent_row == 2 || last.parent_row == 3);
    }

    #[test]
    fn unreachable_threshold_falls_back_flagged() {
        let derived = reply_chain(3);
        let cfg = EngineConfig {
            parent_min_conf: 0.95,
            ..EngineConfig::default()
        };
        let edges = run(&derived, &cfg);
        assert_eq!(edges.len(), 2);
        for edge in &edges {
            assert_eq!(edge.below_threshold, Some(true));
            // Fallback is the chronologically nearest member.
            assert_eq!(edge.parent_row, edge.child_row - 1);
        }
    }

    #[test]
    fn filter_takes_precedence_over_flag() {
        let derived = reply_chain(3);
        let cfg = EngineConfig {
            parent_min_conf: 0.95,
            filter_below_threshold: true,
            flag_below_threshold: true,
            ..EngineConfig::default()
        };
        let edges = run(&derived, &cfg);
        assert!(edges.is_empty());
    }

    #[test]
    fn ties_resolve_to_the_most_recent_candidate() {
        // All members share an identical thread key, so every candidate
        // scores 0.85 against the child.
        let derived = reply_chain(4);
        let edges = run(&derived, &EngineConfig::default());
        for edge in &edges {
            assert_eq!(edge.parent_row, edge.child_row - 1, "tie not broken late");
        }
    }

    #[test]
    fn window_excludes_distant_parents() {
        let mut derived = reply_chain(2);
        // Push the second record far outside the 14-day window while keeping
        // the same thread via an entity token.
        derived[0] = normalize::normalize(&EmailRecord {
            row: 0,
            subject: "HVDC-1042 kickoff".into(),
            sender_email: "a@x.com".into(),
            delivery_time_raw: "2024-01-01 08:00:00".into(),
            ..EmailRecord::default()
        });
        derived[1] = normalize::normalize(&EmailRecord {
            row: 1,
            subject: "HVDC-1042 closeout".into(),
            sender_email: "b@y.com".into(),
            delivery_time_raw: "2024-06-01 08:00:00".into(),
            ..EmailRecord::default()
        });
        let edges = run(&derived, &EngineConfig::default());
        // The only candidate is outside the window, so the edge comes from
        // the fallback path and is flagged.
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].below_threshold, Some(true));
    }
}
