//! Artifact writers: `threads.json`, `edges.csv`, `search_result.csv`.
//!
//! CSV is written by a local quoting helper rather than a dependency — the
//! schemas are fixed and small. All timestamps are converted to the display
//! timezone on the way out; the in-memory pipeline stays UTC-naive.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use indexmap::IndexSet;

use thread_recon_core::config::EngineConfig;
use thread_recon_core::models::Edge;
use thread_recon_engine::pipeline::{self, InputRow, Pipeline};

use crate::CliResult;

/// Write the `threads.json` artifact.
pub fn write_threads_json(path: &Path, pipeline: &Pipeline, cfg: &EngineConfig) -> CliResult<()> {
    let summaries = pipeline.thread_summaries(cfg);
    fs::write(path, serde_json::to_string_pretty(&summaries)?)?;
    tracing::info!(path = %path.display(), threads = summaries.len(), "wrote threads.json");
    Ok(())
}

/// Write the `edges.csv` artifact. The `below_threshold` column only exists
/// when the flagging policy is active.
pub fn write_edges_csv(path: &Path, edges: &[Edge], cfg: &EngineConfig) -> CliResult<()> {
    let with_flag_column = cfg.flag_below_threshold && !cfg.filter_below_threshold;
    let mut out = String::new();

    let mut header = vec![
        "thread_id",
        "relation_type",
        "confidence",
        "parent_row",
        "child_row",
        "parent_no",
        "child_no",
        "parent_delivery_time",
        "child_delivery_time",
        "subject_norm",
    ];
    if with_flag_column {
        header.push("below_threshold");
    }
    writeln_row(&mut out, header.iter().map(ToString::to_string));

    for edge in edges {
        let mut fields = vec![
            edge.thread_id.clone(),
            edge.relation_type.to_string(),
            format!("{:.3}", edge.confidence),
            edge.parent_row.to_string(),
            edge.child_row.to_string(),
            edge.parent_no.to_string(),
            edge.child_no.to_string(),
            edge.parent_delivery_time
                .map(|t| pipeline::display_timestamp(t, cfg))
                .unwrap_or_default(),
            edge.child_delivery_time
                .map(|t| pipeline::display_timestamp(t, cfg))
                .unwrap_or_default(),
            edge.subject_norm.clone(),
        ];
        if with_flag_column {
            fields.push(
                edge.below_threshold
                    .map(|b| b.to_string())
                    .unwrap_or_default(),
            );
        }
        writeln_row(&mut out, fields.into_iter());
    }

    fs::write(path, out)?;
    tracing::info!(path = %path.display(), edges = edges.len(), "wrote edges.csv");
    Ok(())
}

/// Write `search_result.csv`: the input table's own columns, restricted to
/// result rows, with `DeliveryTime` rewritten to the display timezone.
pub fn write_search_csv(
    path: &Path,
    rows: &[InputRow],
    pipeline: &Pipeline,
    result_rows: &[usize],
    cfg: &EngineConfig,
) -> CliResult<()> {
    // Column order: first-seen order across the whole table.
    let mut columns: IndexSet<String> = IndexSet::new();
    for row in rows {
        for key in row.keys() {
            columns.insert(key.clone());
        }
    }

    let mut out = String::new();
    writeln_row(&mut out, columns.iter().cloned());
    for &row_idx in result_rows {
        let row = &rows[row_idx];
        let fields = columns.iter().map(|col| {
            if col == "DeliveryTime" {
                if let Some(dt) = pipeline.derived[row_idx].delivery_time {
                    return pipeline::display_timestamp(dt, cfg);
                }
            }
            match row.get(col) {
                None | Some(serde_json::Value::Null) => String::new(),
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            }
        });
        writeln_row(&mut out, fields);
    }

    fs::write(path, out)?;
    tracing::info!(path = %path.display(), rows = result_rows.len(), "wrote search_result.csv");
    Ok(())
}

// ────────────────────────────────────────────────────────────────────
// CSV quoting
// ────────────────────────────────────────────────────────────────────

fn writeln_row(out: &mut String, fields: impl Iterator<Item = String>) {
    let mut first = true;
    for field in fields {
        if !first {
            out.push(',');
        }
        first = false;
        let _ = write!(out, "{}", quote(&field));
    }
    out.push('\n');
}

/// Quote a field when it contains a delimiter, quote, or newline; embedded
/// quotes are doubled per RFC 4180.
fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_passes_plain_fields_through() {
        assert_eq!(quote("thread_1"), "thread_1");
        assert_eq!(quote(""), "");
    }

    #[test]
    fn quote_escapes_delimiters_and_quotes() {
        assert_eq!(quote("a,b"), "\"a,b\"");
        assert_eq!(quote("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(quote("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn rows_join_with_commas_and_newline() {
        let mut out = String::new();
        writeln_row(&mut out, ["a".to_string(), "b,c".to_string()].into_iter());
        assert_eq!(out, "a,\"b,c\"\n");
    }
}
