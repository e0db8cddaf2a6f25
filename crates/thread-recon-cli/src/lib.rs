//! CLI commands for the thread reconstruction engine.
//!
//! Two commands wrap the batch pipeline:
//! - `run` — full reconstruction: threads, edges, optional search
//! - `search` — query-only pass over the same input table
//!
//! Input is a JSON array of row objects (the validated export of the source
//! workbook); Excel loading and validation live upstream of this tool.

#![forbid(unsafe_code)]

use std::fs;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use thread_recon_core::config::EngineConfig;
use thread_recon_engine::pipeline::{self, InputRow};

pub mod output;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Engine(#[from] thread_recon_core::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CliResult<T> = Result<T, CliError>;

#[derive(Parser, Debug)]
#[command(name = "threadrecon", version, about = "Heuristic email-thread reconstruction")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full pipeline and write threads.json / edges.csv.
    Run(RunArgs),
    /// Run a search query and write search_result.csv.
    Search(SearchArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON array of row objects.
    #[arg(long)]
    pub input: PathBuf,
    /// Directory for output artifacts.
    #[arg(long, default_value = "out")]
    pub out_dir: PathBuf,
    /// Display timezone for all output timestamps (tz database name).
    #[arg(long)]
    pub display_tz: Option<String>,
    /// Treat naive input timestamps as already local to the display
    /// timezone instead of UTC.
    #[arg(long, default_value_t = false)]
    pub assume_local_time: bool,
    #[arg(long)]
    pub lookback_k: Option<usize>,
    #[arg(long)]
    pub window_days: Option<i64>,
    #[arg(long)]
    pub parent_min_conf: Option<f64>,
    /// Drop below-threshold edges instead of flagging them.
    #[arg(long, default_value_t = false)]
    pub filter_below_threshold: bool,
    /// Keep below-threshold edges but omit the flag column.
    #[arg(long, default_value_t = false)]
    pub no_flag_below_threshold: bool,
    /// Process only the first N rows (quick/dry runs).
    #[arg(long)]
    pub row_cap: Option<usize>,
    /// Also run a search query and write search_result.csv.
    #[arg(long)]
    pub query: Option<String>,
    #[arg(long)]
    pub max_results: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// JSON array of row objects.
    #[arg(long)]
    pub input: PathBuf,
    #[arg(long)]
    pub query: String,
    #[arg(long)]
    pub max_results: Option<usize>,
    /// Output file (default: search_result.csv).
    #[arg(long)]
    pub out: Option<PathBuf>,
    #[arg(long)]
    pub display_tz: Option<String>,
    #[arg(long, default_value_t = false)]
    pub assume_local_time: bool,
}

/// Entry point for the binary: parse, execute, map errors to exit codes.
#[must_use]
pub fn run() -> i32 {
    init_tracing();
    let cli = Cli::parse();
    match execute(cli) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {err}");
            1
        }
    }
}

/// Execute a parsed command. Split from [`run`] so tests can drive it.
pub fn execute(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Run(args) => execute_run(&args),
        Commands::Search(args) => execute_search(&args),
    }
}

fn execute_run(args: &RunArgs) -> CliResult<()> {
    let mut cfg = EngineConfig::from_env();
    if let Some(tz) = &args.display_tz {
        cfg.display_tz = EngineConfig::parse_timezone(tz)?;
    }
    cfg.assume_local_time |= args.assume_local_time;
    if let Some(v) = args.lookback_k {
        cfg.lookback_k = v;
    }
    if let Some(v) = args.window_days {
        cfg.window_days = v;
    }
    if let Some(v) = args.parent_min_conf {
        cfg.parent_min_conf = v;
    }
    if args.filter_below_threshold {
        cfg.filter_below_threshold = true;
    }
    if args.no_flag_below_threshold {
        cfg.flag_below_threshold = false;
    }
    if args.row_cap.is_some() {
        cfg.row_cap = args.row_cap;
    }
    if args.query.is_some() {
        cfg.query.clone_from(&args.query);
    }
    if let Some(v) = args.max_results {
        cfg.max_results = v;
    }

    let rows = load_rows(&args.input)?;
    let result = pipeline::run(&rows, &cfg)?;

    fs::create_dir_all(&args.out_dir)?;
    output::write_threads_json(&args.out_dir.join("threads.json"), &result, &cfg)?;
    output::write_edges_csv(&args.out_dir.join("edges.csv"), &result.edges, &cfg)?;
    if let Some(outcome) = &result.search {
        output::write_search_csv(
            &args.out_dir.join("search_result.csv"),
            &rows,
            &result,
            &outcome.rows,
            &cfg,
        )?;
        tracing::info!(
            direct = outcome.context.direct_hits,
            total = outcome.context.total_with_context,
            threads = outcome.context.threads_touched,
            "search context"
        );
    }
    Ok(())
}

fn execute_search(args: &SearchArgs) -> CliResult<()> {
    if args.query.trim().is_empty() {
        return Err(CliError::InvalidArgument("query must not be empty".into()));
    }
    let mut cfg = EngineConfig::from_env();
    if let Some(tz) = &args.display_tz {
        cfg.display_tz = EngineConfig::parse_timezone(tz)?;
    }
    cfg.assume_local_time |= args.assume_local_time;
    cfg.query = Some(args.query.clone());
    if let Some(v) = args.max_results {
        cfg.max_results = v;
    }

    let rows = load_rows(&args.input)?;
    let result = pipeline::run(&rows, &cfg)?;
    let Some(outcome) = result.search.as_ref() else {
        return Err(CliError::InvalidArgument(
            "search pass produced no outcome".into(),
        ));
    };

    let out_path = args
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from("search_result.csv"));
    output::write_search_csv(&out_path, &rows, &result, &outcome.rows, &cfg)?;
    Ok(())
}

fn load_rows(path: &std::path::Path) -> CliResult<Vec<InputRow>> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clap_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "threadrecon",
            "run",
            "--input",
            "rows.json",
            "--out-dir",
            "artifacts",
            "--display-tz",
            "Asia/Dubai",
            "--lookback-k",
            "10",
            "--filter-below-threshold",
            "--query",
            "hvdc 205",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.lookback_k, Some(10));
        assert!(args.filter_below_threshold);
        assert_eq!(args.query.as_deref(), Some("hvdc 205"));
    }

    #[test]
    fn clap_parses_search_flags() {
        let cli = Cli::try_parse_from([
            "threadrecon",
            "search",
            "--input",
            "rows.json",
            "--query",
            "berth",
            "--max-results",
            "5",
        ])
        .unwrap();
        let Commands::Search(args) = cli.command else {
            panic!("expected search");
        };
        assert_eq!(args.query, "berth");
        assert_eq!(args.max_results, Some(5));
    }

    #[test]
    fn search_rejects_blank_query() {
        let args = SearchArgs {
            input: PathBuf::from("rows.json"),
            query: "   ".into(),
            max_results: None,
            out: None,
            display_tz: None,
            assume_local_time: false,
        };
        assert!(matches!(
            execute_search(&args),
            Err(CliError::InvalidArgument(_))
        ));
    }
}
