//! Configuration for the thread reconstruction engine.
//!
//! Defaults match the reference pipeline; every knob can be overridden from
//! `THREAD_RECON_*` environment variables, and the CLI layers its flags on
//! top of whatever `from_env` produced.

use std::env;

use chrono_tz::Tz;

use crate::error::{Error, Result};

/// Engine configuration.
///
/// # Knobs
/// - `lookback_k`: how many chronologically preceding thread members are
///   considered as parent candidates for a child (bounds edge cost).
/// - `window_days`: max timestamp distance between parent and child.
/// - `parent_min_conf`: minimum confidence a parent candidate must clear
///   before the nearest-candidate fallback kicks in.
/// - `flag_below_threshold` / `filter_below_threshold`: what to do with
///   fallback edges. Filtering takes precedence when both are set.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Timezone used for all human-facing timestamps in output artifacts.
    pub display_tz: Tz,
    /// Whether naive input timestamps are already local to `display_tz`
    /// (true) or UTC that needs converting (false).
    pub assume_local_time: bool,
    pub lookback_k: usize,
    pub window_days: i64,
    pub parent_min_conf: f64,
    pub flag_below_threshold: bool,
    pub filter_below_threshold: bool,
    /// Optional row cap for quick/dry runs. `None` = process everything.
    pub row_cap: Option<usize>,
    /// Optional search query to run after the pipeline.
    pub query: Option<String>,
    /// Max rows returned by search (after context expansion).
    pub max_results: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            display_tz: Tz::UTC,
            assume_local_time: false,
            lookback_k: 50,
            window_days: 14,
            parent_min_conf: 0.35,
            flag_below_threshold: true,
            filter_below_threshold: false,
            row_cap: None,
            query: None,
            max_results: 200,
        }
    }
}

impl EngineConfig {
    /// Load configuration from `THREAD_RECON_*` environment variables,
    /// falling back to defaults for anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let display_tz = env_value("THREAD_RECON_DISPLAY_TZ")
            .and_then(|v| v.parse::<Tz>().ok())
            .unwrap_or(defaults.display_tz);
        Self {
            display_tz,
            assume_local_time: env_bool("THREAD_RECON_ASSUME_LOCAL_TIME", false),
            lookback_k: env_usize("THREAD_RECON_LOOKBACK_K", defaults.lookback_k),
            window_days: env_i64("THREAD_RECON_WINDOW_DAYS", defaults.window_days),
            parent_min_conf: env_f64("THREAD_RECON_PARENT_MIN_CONF", defaults.parent_min_conf),
            flag_below_threshold: env_bool("THREAD_RECON_FLAG_BELOW_THRESHOLD", true),
            filter_below_threshold: env_bool("THREAD_RECON_FILTER_BELOW_THRESHOLD", false),
            row_cap: env_usize_opt("THREAD_RECON_ROW_CAP"),
            query: env_value("THREAD_RECON_QUERY"),
            max_results: env_usize("THREAD_RECON_MAX_RESULTS", defaults.max_results),
        }
    }

    /// Parse a display timezone name, surfacing a configuration error for
    /// anything the tz database does not know.
    pub fn parse_timezone(name: &str) -> Result<Tz> {
        name.parse::<Tz>()
            .map_err(|_| Error::UnknownTimezone(name.to_string()))
    }

    /// Reject configurations that would make the edge builder degenerate.
    pub fn validate(&self) -> Result<()> {
        if self.lookback_k == 0 {
            return Err(Error::InvalidConfig("lookback_k must be >= 1".into()));
        }
        if self.window_days < 0 {
            return Err(Error::InvalidConfig("window_days must be >= 0".into()));
        }
        if !(0.0..=1.0).contains(&self.parent_min_conf) {
            return Err(Error::InvalidConfig(
                "parent_min_conf must be in [0, 1]".into(),
            ));
        }
        if self.max_results == 0 {
            return Err(Error::InvalidConfig("max_results must be >= 1".into()));
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────
// Environment helpers
// ────────────────────────────────────────────────────────────────────

fn env_value(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(value: &str, default: bool) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env_value(key).map_or(default, |v| parse_bool(&v, default))
}

fn env_usize(key: &str, default: usize) -> usize {
    env_value(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_usize_opt(key: &str) -> Option<usize> {
    env_value(key).and_then(|v| v.trim().parse().ok())
}

fn env_i64(key: &str, default: i64) -> i64 {
    env_value(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    env_value(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_pipeline() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.lookback_k, 50);
        assert_eq!(cfg.window_days, 14);
        assert!((cfg.parent_min_conf - 0.35).abs() < f64::EPSILON);
        assert!(cfg.flag_below_threshold);
        assert!(!cfg.filter_below_threshold);
        assert_eq!(cfg.max_results, 200);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_degenerate_knobs() {
        let mut cfg = EngineConfig::default();
        cfg.lookback_k = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.parent_min_conf = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parse_timezone_rejects_unknown_names() {
        assert!(EngineConfig::parse_timezone("Asia/Dubai").is_ok());
        assert!(EngineConfig::parse_timezone("Not/AZone").is_err());
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool("1", false));
        assert!(parse_bool("Yes", false));
        assert!(!parse_bool("off", true));
        assert!(parse_bool("garbage", true));
    }
}
