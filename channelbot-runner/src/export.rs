//! Reporting and export: JSON and CSV renderings of performance statistics.
//!
//! Persisted JSON carries a `schema_version` field. Unknown versions are
//! rejected on load.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use channelbot_core::store::format_tstamp;

use crate::metrics::{PerformanceStats, TradeStats};

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

/// Serializable stats report: the latest figures plus the per-trade series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub trade_count: usize,
    pub total_result: f64,
    pub latest: Option<TradeStats>,
    pub stats: PerformanceStats,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl StatsReport {
    pub fn new(stats: PerformanceStats) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            trade_count: stats.trade_count(),
            total_result: stats.total_result(),
            latest: stats.latest().cloned(),
            stats,
        }
    }
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &StatsReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize StatsReport to JSON")
}

/// Deserialize a `StatsReport`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<StatsReport> {
    let report: StatsReport = serde_json::from_str(json).context("failed to deserialize StatsReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// One row per trade.
///
/// Columns: exit_time, result, equity, hh, dd, max_dd, underwater_days,
/// trades_in_range, perc_win, avg_result, max_winner, max_loser
pub fn export_stats_csv(stats: &PerformanceStats) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "exit_time",
        "result",
        "equity",
        "hh",
        "dd",
        "max_dd",
        "underwater_days",
        "trades_in_range",
        "perc_win",
        "avg_result",
        "max_winner",
        "max_loser",
    ])?;

    for t in &stats.trades {
        wtr.write_record([
            format_tstamp(t.exit_tstamp).unwrap_or_default(),
            format!("{:.8}", t.result),
            format!("{:.8}", t.equity),
            format!("{:.8}", t.hh),
            format!("{:.8}", t.dd),
            format!("{:.8}", t.max_dd),
            format!("{:.2}", t.underwater_days),
            format!("{:.2}", t.trades_in_range),
            format!("{:.2}", t.perc_win),
            format!("{:.8}", t.avg_result),
            format!("{:.8}", t.max_winner),
            format!("{:.8}", t.max_loser),
        ])?;
    }

    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

/// Write `stats.json` and `stats.csv` into `dir`.
pub fn save_report(report: &StatsReport, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    std::fs::write(dir.join("stats.json"), export_json(report)?)
        .with_context(|| format!("failed to write stats.json in {}", dir.display()))?;
    std::fs::write(dir.join("stats.csv"), export_stats_csv(&report.stats)?)
        .with_context(|| format!("failed to write stats.csv in {}", dir.display()))?;
    Ok(())
}
