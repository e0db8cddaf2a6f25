//! Pipeline orchestration.
//!
//! rows → normalizer → index builder → clustering → edge builder → search.
//! Each phase is one linear synchronous pass; the indexes are built once and
//! read-only for the rest of the run, so re-running on an unmodified table
//! is byte-for-byte idempotent.

use chrono::{NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use thread_recon_core::config::EngineConfig;
use thread_recon_core::error::{Error, Result};
use thread_recon_core::models::{
    DerivedFields, Edge, EmailRecord, EntitySet, SearchOutcome, ThreadSummary,
};

use crate::cluster::{self, Clustering};
use crate::edges;
use crate::index::Indexes;
use crate::normalize;
use crate::search;

/// Required input columns, checked before any processing.
const REQUIRED_COLUMNS: [&str; 2] = ["Subject", "DeliveryTime"];

/// One input row as loaded from JSON: the original key→value map.
pub type InputRow = serde_json::Map<String, Value>;

/// Everything one pipeline run produces.
#[derive(Debug)]
pub struct Pipeline {
    pub records: Vec<EmailRecord>,
    pub derived: Vec<DerivedFields>,
    pub indexes: Indexes,
    pub clustering: Clustering,
    pub edges: Vec<Edge>,
    pub search: Option<SearchOutcome>,
}

/// Run the whole pipeline over a row table.
pub fn run(rows: &[InputRow], cfg: &EngineConfig) -> Result<Pipeline> {
    cfg.validate()?;
    let mut records = records_from_rows(rows)?;
    if let Some(cap) = cfg.row_cap {
        records.truncate(cap);
    }
    tracing::info!(rows = records.len(), "normalizing records");
    let derived: Vec<DerivedFields> = records.iter().map(normalize::normalize).collect();
    let indexes = Indexes::build(&derived);
    let clustering = cluster::cluster(&derived, &indexes);
    let edge_list = edges::build_edges(&clustering, &derived, cfg);
    let search = cfg.query.as_deref().map(|q| {
        search::search(&records, &derived, &indexes, &clustering, q, cfg.max_results)
    });

    Ok(Pipeline {
        records,
        derived,
        indexes,
        clustering,
        edges: edge_list,
        search,
    })
}

impl Pipeline {
    /// Shape the `threads.json` entries with display-timezone timestamps.
    #[must_use]
    pub fn thread_summaries(&self, cfg: &EngineConfig) -> Vec<ThreadSummary> {
        self.clustering
            .threads
            .iter()
            .map(|thread| {
                let times: Vec<NaiveDateTime> = thread
                    .members
                    .iter()
                    .filter_map(|&row| self.derived[row].delivery_time)
                    .collect();
                ThreadSummary {
                    thread_id: thread.thread_id.clone(),
                    members: thread.members.clone(),
                    confidence: thread.confidence,
                    subject_norm: self.derived[thread.seed].subject_norm.clone(),
                    start_dt: times.iter().min().map(|&t| display_timestamp(t, cfg)),
                    end_dt: times.iter().max().map(|&t| display_timestamp(t, cfg)),
                }
            })
            .collect()
    }
}

/// Convert a parsed (naive) delivery time to an ISO-8601 string in the
/// display timezone. `assume_local_time` decides whether the naive value is
/// already local or UTC that needs converting.
#[must_use]
pub fn display_timestamp(naive: NaiveDateTime, cfg: &EngineConfig) -> String {
    if cfg.assume_local_time {
        cfg.display_tz
            .from_local_datetime(&naive)
            .earliest()
            .map_or_else(|| naive.format("%Y-%m-%dT%H:%M:%S").to_string(), |dt| dt.to_rfc3339())
    } else {
        Utc.from_utc_datetime(&naive)
            .with_timezone(&cfg.display_tz)
            .to_rfc3339()
    }
}

// ────────────────────────────────────────────────────────────────────
// Input loading
// ────────────────────────────────────────────────────────────────────

/// Validate the table shape and materialize [`EmailRecord`]s.
///
/// A column missing from every row is an input-shape error and aborts the
/// run; a value missing from one row degrades to an empty field.
pub fn records_from_rows(rows: &[InputRow]) -> Result<Vec<EmailRecord>> {
    if rows.is_empty() {
        return Err(Error::EmptyTable);
    }
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !rows.iter().any(|row| row.contains_key(**col)))
        .map(|col| (*col).to_string())
        .collect();
    if !missing.is_empty() {
        return Err(Error::MissingColumns(missing));
    }

    Ok(rows
        .iter()
        .enumerate()
        .map(|(row, map)| EmailRecord {
            row,
            subject: text(map, "Subject"),
            sender_name: text(map, "SenderName"),
            sender_email: text(map, "SenderEmail"),
            recipient_to: text(map, "RecipientTo"),
            recipient_cc: text(map, "RecipientCc"),
            recipient_bcc: text(map, "RecipientBcc"),
            delivery_time_raw: text(map, "DeliveryTime"),
            body: text(map, "PlainTextBody"),
            seed_entities: seed_entities(map),
        })
        .collect())
}

/// Pre-existing entity columns recognized on input rows, merged with (never
/// overriding) the engine's own extraction.
fn seed_entities(map: &InputRow) -> EntitySet {
    let mut set = EntitySet::default();
    for col in ["case_numbers", "hvdc_cases", "primary_case"] {
        set.cases.extend(tokens(map, col));
    }
    for col in ["site", "sites", "primary_site"] {
        set.sites.extend(tokens(map, col));
    }
    for col in ["lpo", "lpo_numbers"] {
        set.lpos.extend(tokens(map, col));
    }
    set
}

fn tokens(map: &InputRow, col: &str) -> Vec<String> {
    text(map, col)
        .split([',', ';', '|'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// String view of a cell: missing and null cells are empty strings; numbers
/// and booleans are rendered, so loosely-typed tables still load.
fn text(map: &InputRow, col: &str) -> String {
    match map.get(col) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(subject: &str, when: &str) -> InputRow {
        let value = json!({
            "Subject": subject,
            "DeliveryTime": when,
            "SenderEmail": "ops@x.com",
        });
        value.as_object().unwrap().clone()
    }

    #[test]
    fn missing_required_columns_abort_before_processing() {
        let rows = vec![
            json!({"Subject": "hello"}).as_object().unwrap().clone(),
        ];
        let err = records_from_rows(&rows).unwrap_err();
        assert!(matches!(err, Error::MissingColumns(cols) if cols == vec!["DeliveryTime"]));
    }

    #[test]
    fn one_bad_row_degrades_instead_of_aborting() {
        let rows = vec![row("RE: ok", "2024-03-04 08:00:00"), row("bad date", "garbage")];
        let pipeline = run(&rows, &EngineConfig::default()).unwrap();
        assert_eq!(pipeline.records.len(), 2);
        assert!(pipeline.derived[1].delivery_time.is_none());
        assert_eq!(pipeline.derived[1].week_bucket, "unknown");
    }

    #[test]
    fn row_cap_limits_processing() {
        let rows: Vec<InputRow> = (0..10)
            .map(|i| row(&format!("subject {i}"), "2024-03-04 08:00:00"))
            .collect();
        let cfg = EngineConfig {
            row_cap: Some(3),
            ..EngineConfig::default()
        };
        let pipeline = run(&rows, &cfg).unwrap();
        assert_eq!(pipeline.records.len(), 3);
    }

    #[test]
    fn seed_entity_columns_merge_with_extraction() {
        let value = json!({
            "Subject": "spares request",
            "DeliveryTime": "2024-03-04 08:00:00",
            "PlainTextBody": "please quote against LPO 4411",
            "case_numbers": "hvdc 205; hvdc-206",
            "primary_site": "DAS",
        });
        let rows = vec![value.as_object().unwrap().clone()];
        let pipeline = run(&rows, &EngineConfig::default()).unwrap();
        let entities = &pipeline.derived[0].entities;
        assert!(entities.cases.contains("HVDC-205"));
        assert!(entities.cases.contains("HVDC-206"));
        assert!(entities.sites.contains("DAS"));
        assert!(entities.lpos.contains("LPO-4411"));
    }

    #[test]
    fn thread_summaries_convert_to_display_timezone() {
        let rows = vec![
            row("RE: Shipment Update", "2024-03-04 08:00:00"),
            row("RE: Shipment Update", "2024-03-04 10:00:00"),
        ];
        let cfg = EngineConfig {
            display_tz: chrono_tz::Tz::Asia__Dubai,
            ..EngineConfig::default()
        };
        let pipeline = run(&rows, &cfg).unwrap();
        let summaries = pipeline.thread_summaries(&cfg);
        assert_eq!(summaries.len(), 1);
        let start = summaries[0].start_dt.as_deref().unwrap();
        // UTC 08:00 is 12:00 in Dubai (+04:00).
        assert!(start.starts_with("2024-03-04T12:00:00"), "got {start}");
        assert!(start.ends_with("+04:00"));
    }

    #[test]
    fn empty_table_is_a_hard_error() {
        assert!(matches!(
            records_from_rows(&[]),
            Err(Error::EmptyTable)
        ));
    }
}
