//! Inverted index builder.
//!
//! One pass over the normalized records produces a family of reverse
//! lookups (token → set of row indices). The maps are built once per run
//! and read-only afterward; there is no incremental update path — adding a
//! record means a full O(n) rebuild, which is fine for this batch design.
//!
//! `BTreeMap`/`BTreeSet` keep iteration deterministic so anything derived
//! from the indexes is byte-stable across runs.

use std::collections::{BTreeMap, BTreeSet};

use thread_recon_core::models::DerivedFields;

/// Token → row-set lookup for one signal family.
pub type TokenIndex = BTreeMap<String, BTreeSet<usize>>;

/// The full set of reverse lookups used by clustering and search.
#[derive(Debug, Default)]
pub struct Indexes {
    pub thread_key: TokenIndex,
    pub subject: TokenIndex,
    pub participants: TokenIndex,
    pub body_hash: TokenIndex,
    pub case: TokenIndex,
    pub site: TokenIndex,
    pub lpo: TokenIndex,
    pub sender: TokenIndex,
    pub day: TokenIndex,
}

impl Indexes {
    /// Build every index in a single pass. Empty tokens are never indexed —
    /// otherwise every "no subject" record would spuriously collide.
    #[must_use]
    pub fn build(derived: &[DerivedFields]) -> Self {
        let mut idx = Self::default();
        for (row, d) in derived.iter().enumerate() {
            insert(&mut idx.thread_key, &d.thread_key, row);
            insert(&mut idx.subject, &d.subject_norm, row);
            insert(&mut idx.participants, &d.participants_norm, row);
            insert(&mut idx.body_hash, &d.body_hash, row);
            for token in &d.entities.cases {
                insert(&mut idx.case, token, row);
            }
            for token in &d.entities.sites {
                insert(&mut idx.site, token, row);
            }
            for token in &d.entities.lpos {
                insert(&mut idx.lpo, token, row);
            }
            insert(&mut idx.sender, &d.sender_email_norm, row);
            if let Some(day) = &d.delivery_day {
                insert(&mut idx.day, day, row);
            }
        }
        tracing::debug!(
            rows = derived.len(),
            thread_keys = idx.thread_key.len(),
            subjects = idx.subject.len(),
            participants = idx.participants.len(),
            body_hashes = idx.body_hash.len(),
            senders = idx.sender.len(),
            "inverted indexes built"
        );
        idx
    }

    /// Rows indexed under `token` in `family`, empty when absent.
    #[must_use]
    pub fn rows<'a>(family: &'a TokenIndex, token: &str) -> Option<&'a BTreeSet<usize>> {
        if token.is_empty() {
            return None;
        }
        family.get(token)
    }
}

fn insert(map: &mut TokenIndex, token: &str, row: usize) {
    if token.is_empty() {
        return;
    }
    map.entry(token.to_string()).or_default().insert(row);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize;
    use thread_recon_core::models::EmailRecord;

    fn derive(subject: &str, sender: &str, when: &str) -> DerivedFields {
        normalize::normalize(&EmailRecord {
            subject: subject.into(),
            sender_email: sender.into(),
            delivery_time_raw: when.into(),
            ..EmailRecord::default()
        })
    }

    #[test]
    fn empty_tokens_are_never_indexed() {
        let derived = vec![
            derive("(No Subject)", "", ""),
            derive("", "", ""),
            derive("Real subject", "ops@x.com", "2024-03-04 10:00:00"),
        ];
        let idx = Indexes::build(&derived);
        // The two signal-less records index nothing — not even a thread
        // key — so they can never spuriously collide.
        assert_eq!(idx.subject.len(), 1);
        assert!(idx.body_hash.is_empty());
        assert_eq!(idx.sender.len(), 1);
        assert_eq!(idx.day.len(), 1);
        assert_eq!(idx.thread_key.len(), 1);
        assert_eq!(idx.participants.len(), 1);
    }

    #[test]
    fn shared_subject_collides_in_subject_index() {
        let derived = vec![
            derive("RE: Shipment Update", "a@x.com", "2024-03-04 10:00:00"),
            derive("Shipment Update", "b@x.com", "2024-03-04 12:00:00"),
        ];
        let idx = Indexes::build(&derived);
        let rows = Indexes::rows(&idx.subject, "SHIPMENT UPDATE").unwrap();
        assert_eq!(rows.iter().copied().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn day_and_sender_indexes_track_rows() {
        let derived = vec![
            derive("a", "ops@x.com", "2024-03-04 10:00:00"),
            derive("b", "ops@x.com", "2024-03-06 10:00:00"),
        ];
        let idx = Indexes::build(&derived);
        assert_eq!(Indexes::rows(&idx.sender, "ops@x.com").unwrap().len(), 2);
        assert_eq!(Indexes::rows(&idx.day, "2024-03-04").unwrap().len(), 1);
    }
}
