//! Domain-entity extraction.
//!
//! A small fixed set of patterns over `Subject + Body` pulls out case
//! numbers, site codes, and LPO numbers. Sites are a closed vocabulary of
//! known location codes; cases and LPOs are open-ended regex families
//! normalized to a canonical `-` separator so `HVDC 1042`, `hvdc_1042`, and
//! `HVDC-1042` all index under one token.

use std::sync::LazyLock;

use thread_recon_core::models::EntitySet;

/// Known site/location codes. Matching is word-bounded and case-insensitive;
/// the canonical form is the upper-cased vocabulary entry.
pub const SITE_VOCABULARY: [&str; 7] = [
    "AGI",
    "DAS",
    "ZIRKU",
    "MIRFA",
    "SHUWEIHAT",
    "GHALLAN",
    "SIR BANI YAS",
];

static RE_CASE_HVDC: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"(?i)\bHVDC[-_/ ]?(\d{2,6})\b").unwrap());

static RE_CASE_GENERIC: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"(?i)\bCASE[-_ #]?(\d{2,8})\b").unwrap());

static RE_LPO: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"(?i)\bLPO[-_/ ]?(\d{3,8})\b").unwrap());

static RE_SITE: LazyLock<regex::Regex> = LazyLock::new(|| {
    let alternation = SITE_VOCABULARY.join("|");
    regex::Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).unwrap()
});

/// Extract every known entity from a blob of text (subject + body, or a raw
/// search query). Total: unrecognized text simply yields an empty set.
#[must_use]
pub fn extract(text: &str) -> EntitySet {
    let mut set = EntitySet::default();
    for caps in RE_CASE_HVDC.captures_iter(text) {
        set.cases.insert(format!("HVDC-{}", &caps[1]));
    }
    for caps in RE_CASE_GENERIC.captures_iter(text) {
        set.cases.insert(format!("CASE-{}", &caps[1]));
    }
    for caps in RE_LPO.captures_iter(text) {
        set.lpos.insert(format!("LPO-{}", &caps[1]));
    }
    for m in RE_SITE.find_iter(text) {
        set.sites.insert(m.as_str().to_uppercase());
    }
    set
}

/// Canonicalize entity values carried on pre-existing input columns so they
/// merge cleanly with extracted ones. Tokens the extractor recognizes take
/// their canonical form; anything else is kept as trimmed upper-case.
#[must_use]
pub fn canonicalize_seed(seed: &EntitySet) -> EntitySet {
    let mut out = EntitySet::default();
    for raw in &seed.cases {
        let extracted = extract(raw);
        if extracted.cases.is_empty() {
            insert_fallback(&mut out.cases, raw);
        } else {
            out.cases.extend(extracted.cases);
        }
    }
    for raw in &seed.sites {
        let extracted = extract(raw);
        if extracted.sites.is_empty() {
            insert_fallback(&mut out.sites, raw);
        } else {
            out.sites.extend(extracted.sites);
        }
    }
    for raw in &seed.lpos {
        let extracted = extract(raw);
        if extracted.lpos.is_empty() {
            insert_fallback(&mut out.lpos, raw);
        } else {
            out.lpos.extend(extracted.lpos);
        }
    }
    out
}

fn insert_fallback(set: &mut std::collections::BTreeSet<String>, raw: &str) {
    let token = raw.trim().to_uppercase();
    if !token.is_empty() {
        set.insert(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_case_families_with_canonical_separator() {
        let set = extract("RE: HVDC 1042 update, also hvdc_1042 and HVDC-77");
        assert!(set.cases.contains("HVDC-1042"));
        assert!(set.cases.contains("HVDC-77"));
        assert_eq!(set.cases.len(), 2);
    }

    #[test]
    fn extracts_lpo_numbers() {
        let set = extract("Invoice against LPO 4411 (ref lpo-4411) and LPO_9900");
        assert!(set.lpos.contains("LPO-4411"));
        assert!(set.lpos.contains("LPO-9900"));
        assert_eq!(set.lpos.len(), 2);
    }

    #[test]
    fn sites_are_closed_vocabulary() {
        let set = extract("Barge departing DAS for Sir Bani Yas via open water");
        assert!(set.sites.contains("DAS"));
        assert!(set.sites.contains("SIR BANI YAS"));
        // "open water" is not a site.
        assert_eq!(set.sites.len(), 2);
    }

    #[test]
    fn site_match_is_word_bounded() {
        let set = extract("Midas touch has no site in it");
        assert!(set.sites.is_empty());
    }

    #[test]
    fn seed_canonicalization_normalizes_known_families() {
        let mut seed = EntitySet::default();
        seed.cases.insert("hvdc 205".into());
        seed.cases.insert("legacy-ref-9".into());
        seed.lpos.insert("LPO 1234".into());
        let canon = canonicalize_seed(&seed);
        assert!(canon.cases.contains("HVDC-205"));
        assert!(canon.cases.contains("LEGACY-REF-9"));
        assert!(canon.lpos.contains("LPO-1234"));
    }

    #[test]
    fn empty_text_yields_empty_set() {
        assert!(extract("").is_empty());
    }
}
