//! Search with thread-aware context expansion.
//!
//! A query matches a record when its case-insensitive text appears in the
//! subject, body, or sender display name. Entities parsed out of the query
//! additionally pull every record indexed under those case/site/LPO tokens,
//! substring match or not. Every hit is then expanded to its full thread
//! membership before sorting and truncation, so a match in the middle of a
//! conversation returns the whole conversation.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use thread_recon_core::models::{
    DerivedFields, EmailRecord, SearchContext, SearchOutcome,
};

use crate::cluster::Clustering;
use crate::entities;
use crate::index::Indexes;

/// Run a query over the corpus. Results are row indices sorted by delivery
/// time descending (undated rows last), truncated to `max_results`; the
/// context block is diagnostic metadata, not a ranking input.
#[must_use]
pub fn search(
    records: &[EmailRecord],
    derived: &[DerivedFields],
    idx: &Indexes,
    clustering: &Clustering,
    query: &str,
    max_results: usize,
) -> SearchOutcome {
    let needle = query.trim().to_lowercase();
    let query_entities = entities::extract(query);

    let mut direct: BTreeSet<usize> = BTreeSet::new();
    if !needle.is_empty() {
        for record in records {
            if record.subject.to_lowercase().contains(&needle)
                || record.body.to_lowercase().contains(&needle)
                || record.sender_name.to_lowercase().contains(&needle)
            {
                direct.insert(record.row);
            }
        }
    }
    for token in query_entities.cases.iter() {
        if let Some(rows) = Indexes::rows(&idx.case, token) {
            direct.extend(rows.iter().copied());
        }
    }
    for token in query_entities.sites.iter() {
        if let Some(rows) = Indexes::rows(&idx.site, token) {
            direct.extend(rows.iter().copied());
        }
    }
    for token in query_entities.lpos.iter() {
        if let Some(rows) = Indexes::rows(&idx.lpo, token) {
            direct.extend(rows.iter().copied());
        }
    }

    // Thread context expansion: full transitive membership of every hit.
    let mut expanded = direct.clone();
    let mut threads_touched: BTreeSet<&str> = BTreeSet::new();
    for &row in &direct {
        if let Some(relation) = clustering.relations.get(&row) {
            threads_touched.insert(relation.thread_id.as_str());
            if let Some(thread) = clustering.thread(&relation.thread_id) {
                expanded.extend(thread.members.iter().copied());
            }
        }
    }

    let total_with_context = expanded.len();
    let mut rows: Vec<usize> = expanded.into_iter().collect();
    rows.sort_by(|&a, &b| match (derived[a].delivery_time, derived[b].delivery_time) {
        (Some(x), Some(y)) => y.cmp(&x).then(a.cmp(&b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(&b),
    });
    rows.truncate(max_results);

    tracing::debug!(
        query = %query,
        direct = direct.len(),
        expanded = total_with_context,
        threads = threads_touched.len(),
        "search complete"
    );

    SearchOutcome {
        rows,
        context: SearchContext {
            direct_hits: direct.len(),
            total_with_context,
            threads_touched: threads_touched.len(),
            query_entities,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster;
    use crate::normalize;

    fn corpus() -> (Vec<EmailRecord>, Vec<DerivedFields>) {
        let rows = [
            ("RE: Cargo manifest", "ops@x.com", "2024-03-04 08:00:00", ""),
            ("RE: Cargo manifest", "ops@x.com", "2024-03-04 10:00:00", "loading at berth"),
            ("HVDC-1042 spares", "supply@x.com", "2024-03-10 09:00:00", ""),
            ("Unrelated memo", "hr@x.com", "2024-03-11 09:00:00", "townhall agenda"),
        ];
        let records: Vec<EmailRecord> = rows
            .iter()
            .enumerate()
            .map(|(i, (subject, sender, when, body))| EmailRecord {
                row: i,
                subject: (*subject).into(),
                sender_email: (*sender).into(),
                delivery_time_raw: (*when).into(),
                body: (*body).into(),
                ..EmailRecord::default()
            })
            .collect();
        let derived: Vec<DerivedFields> = records.iter().map(normalize::normalize).collect();
        (records, derived)
    }

    #[test]
    fn substring_hit_expands_to_full_thread() {
        let (records, derived) = corpus();
        let idx = Indexes::build(&derived);
        let clustering = cluster::cluster(&derived, &idx);
        // "berth" only appears in row 1, but row 0 shares its thread.
        let outcome = search(&records, &derived, &idx, &clustering, "berth", 100);
        assert_eq!(outcome.context.direct_hits, 1);
        assert_eq!(outcome.context.total_with_context, 2);
        assert_eq!(outcome.context.threads_touched, 1);
        // Delivery time descending.
        assert_eq!(outcome.rows, vec![1, 0]);
    }

    #[test]
    fn entity_token_pulls_indexed_rows_without_substring() {
        let (records, derived) = corpus();
        let idx = Indexes::build(&derived);
        let clustering = cluster::cluster(&derived, &idx);
        // Query writes the case differently than the record does.
        let outcome = search(&records, &derived, &idx, &clustering, "hvdc 1042", 100);
        assert!(outcome.rows.contains(&2));
        assert_eq!(outcome.context.query_entities.cases.len(), 1);
    }

    #[test]
    fn max_results_truncates_after_expansion() {
        let (records, derived) = corpus();
        let idx = Indexes::build(&derived);
        let clustering = cluster::cluster(&derived, &idx);
        let outcome = search(&records, &derived, &idx, &clustering, "cargo", 1);
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.context.total_with_context, 2);
    }

    #[test]
    fn empty_query_matches_nothing() {
        let (records, derived) = corpus();
        let idx = Indexes::build(&derived);
        let clustering = cluster::cluster(&derived, &idx);
        let outcome = search(&records, &derived, &idx, &clustering, "   ", 100);
        assert!(outcome.rows.is_empty());
        assert_eq!(outcome.context.direct_hits, 0);
    }
}
