//! Derived-field normalizer.
//!
//! Converts one raw [`EmailRecord`] into its [`DerivedFields`]: cleaned
//! subject, participant identity set, body fingerprint, entity sets, and the
//! coarse thread-key heuristic used as the strongest clustering signal.
//!
//! The normalizer is a pure, total function: malformed input degrades to
//! sentinel values (empty string, `"unknown"` week bucket, empty set) and
//! never raises.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use sha2::{Digest, Sha256};

use thread_recon_core::models::{DerivedFields, EmailRecord};

use crate::entities;

/// Max chars of `subject_norm` contributing to the thread key.
const THREAD_KEY_SUBJECT_CAP: usize = 120;
/// Max chars of `participants_norm` contributing to the thread key.
const THREAD_KEY_PARTICIPANTS_CAP: usize = 200;
/// Week bucket used when the delivery time is missing or unparseable.
const UNKNOWN_BUCKET: &str = "unknown";

// ────────────────────────────────────────────────────────────────────
// Subject normalization
// ────────────────────────────────────────────────────────────────────

/// Subjects treated as "no subject" after cleaning (compared lowercased).
const NO_SUBJECT_LITERALS: [&str; 5] = ["(no subject)", "no subject", "(none)", "none", "-"];

/// Leading bracket tag, e.g. `[EXTERNAL]` or `[hvdc-ops]`.
static RE_LEADING_TAG: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^\[[^\]]*\]\s*").unwrap());

/// Reply/forward prefixes, including localized variants and an optional
/// bracketed counter (`RE[2]:`).
static RE_REPLY_PREFIX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)^(?:re|fw|fwd|aw|sv|vs|wg|tr)(?:\[\d+\])?\s*:\s*").unwrap()
});

/// Normalize a raw subject line.
///
/// Strips control characters, collapses whitespace, maps known "no subject"
/// literals to the empty string, repeatedly removes leading bracket tags and
/// reply/forward prefixes, then upper-cases. Idempotent.
#[must_use]
pub fn normalize_subject(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let mut subject = collapse_whitespace(&cleaned);

    if subject.is_empty() || NO_SUBJECT_LITERALS.contains(&subject.to_lowercase().as_str()) {
        return String::new();
    }

    loop {
        let before = subject.len();
        subject = RE_LEADING_TAG.replace(&subject, "").into_owned();
        subject = RE_REPLY_PREFIX.replace(&subject, "").into_owned();
        if subject.len() == before {
            break;
        }
    }

    // Stripping can expose a "no subject" literal, e.g. "RE: (no subject)".
    let subject = collapse_whitespace(&subject);
    if subject.is_empty() || NO_SUBJECT_LITERALS.contains(&subject.to_lowercase().as_str()) {
        return String::new();
    }

    collapse_whitespace(&subject.to_uppercase())
}

// ────────────────────────────────────────────────────────────────────
// Participant normalization
// ────────────────────────────────────────────────────────────────────

/// RFC-822-shaped address, case-insensitive.
static RE_EMAIL: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"(?i)[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}").unwrap());

/// Extract the lower-cased participant identity set for one record.
///
/// Every address found in sender name/email, To, Cc, and Bcc contributes.
/// When the sender yields no address at all, a `name:<label>` pseudo-identity
/// keeps the record contributing a stable signal.
#[must_use]
pub fn normalize_participants(record: &EmailRecord) -> BTreeSet<String> {
    let mut participants = BTreeSet::new();
    for field in [
        &record.sender_name,
        &record.sender_email,
        &record.recipient_to,
        &record.recipient_cc,
        &record.recipient_bcc,
    ] {
        for m in RE_EMAIL.find_iter(field) {
            participants.insert(m.as_str().to_lowercase());
        }
    }

    let sender_has_email = RE_EMAIL.is_match(&record.sender_name)
        || RE_EMAIL.is_match(&record.sender_email);
    if !sender_has_email {
        let label = if record.sender_name.trim().is_empty() {
            record.sender_email.trim()
        } else {
            record.sender_name.trim()
        };
        if !label.is_empty() {
            participants.insert(format!("name:{}", collapse_whitespace(&label.to_lowercase())));
        }
    }
    participants
}

/// Serialize a participant set as `|`-joined sorted tokens.
#[must_use]
pub fn participants_key(participants: &BTreeSet<String>) -> String {
    participants.iter().cloned().collect::<Vec<_>>().join("|")
}

/// Lower-cased sender address, preferring the explicit sender-email field;
/// empty when the sender has no resolvable address.
#[must_use]
pub fn sender_email_norm(record: &EmailRecord) -> String {
    RE_EMAIL
        .find(&record.sender_email)
        .or_else(|| RE_EMAIL.find(&record.sender_name))
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_default()
}

// ────────────────────────────────────────────────────────────────────
// Body hashing
// ────────────────────────────────────────────────────────────────────

/// Fingerprint the body: lower-case, drop document-escaped carriage returns
/// (`_x000D_`, an Excel export artifact) and literal `\r`, collapse
/// whitespace, SHA-256. Empty/whitespace-only bodies hash to the empty
/// string so they never collide with a real hash.
#[must_use]
pub fn hash_body(raw: &str) -> String {
    let lowered = raw.to_lowercase().replace("_x000d_", " ").replace('\r', " ");
    let normalized = collapse_whitespace(&lowered);
    if normalized.is_empty() {
        return String::new();
    }
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

// ────────────────────────────────────────────────────────────────────
// Delivery time parsing & bucketing
// ────────────────────────────────────────────────────────────────────

/// Naive timestamp formats tried in order after RFC 3339.
const NAIVE_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

/// Lenient delivery-time parser. Offset-bearing inputs are converted to
/// UTC-naive; date-only inputs land at midnight. Returns `None` rather than
/// erroring on anything unrecognized.
#[must_use]
pub fn parse_delivery_time(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    None
}

/// Monday-aligned ISO week bucket (`YYYY-Www`), or `"unknown"`.
#[must_use]
pub fn week_bucket(delivery_time: Option<NaiveDateTime>) -> String {
    delivery_time.map_or_else(
        || UNKNOWN_BUCKET.to_string(),
        |dt| {
            let iso = dt.date().iso_week();
            format!("{:04}-W{:02}", iso.year(), iso.week())
        },
    )
}

// ────────────────────────────────────────────────────────────────────
// Thread-key heuristic
// ────────────────────────────────────────────────────────────────────

/// Compose the coarse thread key. Intentionally over-matching: it is the
/// strongest single clustering signal, never the sole one.
///
/// A record with neither subject nor participants carries no identifying
/// signal; its key is the empty string, which is never indexed and never
/// eligible for the scorer's short-circuit.
#[must_use]
pub fn thread_key(subject_norm: &str, participants_norm: &str, bucket: &str) -> String {
    if subject_norm.is_empty() && participants_norm.is_empty() {
        return String::new();
    }
    format!(
        "{}||{}||{}",
        truncate_chars(subject_norm, THREAD_KEY_SUBJECT_CAP),
        truncate_chars(participants_norm, THREAD_KEY_PARTICIPANTS_CAP),
        bucket
    )
}

// ────────────────────────────────────────────────────────────────────
// Record normalization
// ────────────────────────────────────────────────────────────────────

/// Compute all derived fields for one record.
#[must_use]
pub fn normalize(record: &EmailRecord) -> DerivedFields {
    let subject_norm = normalize_subject(&record.subject);
    let participants = normalize_participants(record);
    let participants_norm = participants_key(&participants);
    let body_hash = hash_body(&record.body);
    let delivery_time = parse_delivery_time(&record.delivery_time_raw);
    let delivery_day = delivery_time.map(|dt| dt.date().format("%Y-%m-%d").to_string());
    let bucket = week_bucket(delivery_time);
    let key = thread_key(&subject_norm, &participants_norm, &bucket);

    let mut entities = entities::extract(&format!("{}\n{}", record.subject, record.body));
    entities.merge(&entities::canonicalize_seed(&record.seed_entities));

    DerivedFields {
        subject_norm,
        participants_norm,
        participants,
        body_hash,
        thread_key: key,
        delivery_time,
        delivery_day,
        week_bucket: bucket,
        sender_email_norm: sender_email_norm(record),
        entities,
    }
}

// ────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────

/// Collapse all whitespace runs to single spaces and trim.
#[must_use]
pub fn collapse_whitespace(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut prev_ws = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !prev_ws {
                result.push(' ');
            }
            prev_ws = true;
        } else {
            result.push(ch);
            prev_ws = false;
        }
    }
    result.trim().to_owned()
}

fn truncate_chars(input: &str, cap: usize) -> &str {
    match input.char_indices().nth(cap) {
        Some((idx, _)) => &input[..idx],
        None => input,
    }
}
