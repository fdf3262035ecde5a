//! Performance statistics over the position history.
//!
//! Each closed trade updates a running set of statistics: equity high,
//! drawdown, underwater time, and EMA-smoothed figures over the trades that
//! closed in the trailing window (count, win rate, average, best and worst
//! result).

use std::path::Path;

use serde::{Deserialize, Serialize};

use channelbot_core::error::BotError;
use channelbot_core::store::{read_history, HistoryRecord};

/// Trades closed within this many seconds of the current one are "in range".
pub const STATS_WINDOW_SECS: i64 = 30 * 24 * 60 * 60;

/// Smoothing factor for the windowed statistics.
pub const EMA_ALPHA: f64 = 0.3;

const SECS_PER_DAY: f64 = 24.0 * 60.0 * 60.0;

/// How a trade's result is computed from size and prices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractKind {
    /// Result in quote currency: `amount * (exit - entry)`.
    #[default]
    Linear,
    /// Result in base currency: `amount / entry - amount / exit`.
    Inverse,
}

/// A position that was both entered and exited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub signal_tstamp: Option<i64>,
    pub amount: f64,
    pub entry: f64,
    pub exit: f64,
    pub exit_tstamp: i64,
    pub exit_equity: f64,
}

impl ClosedTrade {
    /// `None` for rows without fill prices, exit time or exit equity
    /// (missed entries, positions closed while unobserved).
    pub fn from_record(record: &HistoryRecord) -> Option<Self> {
        let entry = record.open_price?;
        let exit = record.close_price?;
        if entry == 0.0 || exit == 0.0 {
            return None;
        }
        Some(Self {
            signal_tstamp: record.signal_tstamp(),
            amount: record.size,
            entry,
            exit,
            exit_tstamp: record.close_tstamp()?,
            exit_equity: record.equity_on_exit?,
        })
    }

    pub fn result(&self, kind: ContractKind) -> f64 {
        match kind {
            ContractKind::Linear => self.amount * (self.exit - self.entry),
            ContractKind::Inverse => self.amount / self.entry - self.amount / self.exit,
        }
    }
}

/// Statistics as of one closed trade. `equity` and `hh` are relative to the
/// equity before the first trade.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    pub exit_tstamp: i64,
    pub result: f64,
    pub equity: f64,
    pub hh: f64,
    pub dd: f64,
    pub max_dd: f64,
    pub underwater_days: f64,
    pub trades_in_range: f64,
    pub perc_win: f64,
    pub avg_result: f64,
    pub max_winner: f64,
    pub max_loser: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub kind: ContractKind,
    /// Account equity before the first trade.
    pub start_equity: f64,
    pub trades: Vec<TradeStats>,
}

impl PerformanceStats {
    /// Statistics for every history row that is a complete trade, in log order.
    pub fn from_history(records: &[HistoryRecord], kind: ContractKind) -> Self {
        let trades: Vec<ClosedTrade> = records.iter().filter_map(ClosedTrade::from_record).collect();
        Self::compute(&trades, kind)
    }

    /// Statistics for a position history CSV.
    pub fn from_history_file(path: &Path, kind: ContractKind) -> Result<Self, BotError> {
        let records = read_history(path)?;
        Ok(Self::from_history(&records, kind))
    }

    pub fn compute(trades: &[ClosedTrade], kind: ContractKind) -> Self {
        let Some(first) = trades.first() else {
            return Self {
                kind,
                ..Default::default()
            };
        };
        let start_equity = first.exit_equity - first.result(kind);

        let mut hh = start_equity;
        let mut last_hh_tstamp = first.signal_tstamp.unwrap_or(first.exit_tstamp);
        let mut max_dd = 0.0_f64;
        let mut smoothed = Smoothed::default();
        let mut window_start = 0;
        let mut out = Vec::with_capacity(trades.len());

        for (i, trade) in trades.iter().enumerate() {
            let range_start = trade.exit_tstamp - STATS_WINDOW_SECS;
            while window_start < i && trades[window_start].exit_tstamp < range_start {
                window_start += 1;
            }
            smoothed.update(&trades[window_start..=i], kind);

            if trade.exit_equity > hh {
                hh = trade.exit_equity;
                last_hh_tstamp = trade.exit_tstamp;
            }
            let dd = hh - trade.exit_equity;
            max_dd = max_dd.max(dd);

            out.push(TradeStats {
                exit_tstamp: trade.exit_tstamp,
                result: trade.result(kind),
                equity: trade.exit_equity - start_equity,
                hh: hh - start_equity,
                dd,
                max_dd,
                underwater_days: (trade.exit_tstamp - last_hh_tstamp) as f64 / SECS_PER_DAY,
                trades_in_range: smoothed.trades_in_range,
                perc_win: smoothed.perc_win,
                avg_result: smoothed.avg_result,
                max_winner: smoothed.max_winner,
                max_loser: smoothed.max_loser,
            });
        }

        Self {
            kind,
            start_equity,
            trades: out,
        }
    }

    /// Statistics after the last trade.
    pub fn latest(&self) -> Option<&TradeStats> {
        self.trades.last()
    }

    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }

    /// Sum of all trade results.
    pub fn total_result(&self) -> f64 {
        self.trades.iter().map(|t| t.result).sum()
    }
}

/// EMA state of the windowed figures.
#[derive(Debug, Default)]
struct Smoothed {
    trades_in_range: f64,
    perc_win: f64,
    avg_result: f64,
    max_winner: f64,
    max_loser: f64,
}

impl Smoothed {
    fn update(&mut self, window: &[ClosedTrade], kind: ContractKind) {
        let n = window.len() as f64;
        let mut winners = 0.0;
        let mut avg = 0.0;
        let mut max_winner = 0.0_f64;
        let mut max_loser = 0.0_f64;
        for trade in window {
            let result = trade.result(kind);
            max_winner = max_winner.max(result);
            max_loser = max_loser.min(result);
            avg += result / n;
            if result > 0.0 {
                winners += 1.0;
            }
        }

        self.trades_in_range = ema(n, self.trades_in_range);
        self.perc_win = ema(100.0 * winners / n, self.perc_win);
        self.avg_result = ema(avg, self.avg_result);
        self.max_winner = ema(max_winner, self.max_winner);
        // reported as a positive magnitude
        self.max_loser = ema(-max_loser, self.max_loser);
    }
}

fn ema(value: f64, previous: f64) -> f64 {
    EMA_ALPHA * value + (1.0 - EMA_ALPHA) * previous
}
