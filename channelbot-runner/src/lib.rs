//! Channelbot Runner: performance statistics over a bot's position history.
//!
//! This crate builds on `channelbot-core` to provide:
//! - Rolling per-trade statistics (equity high, drawdown, underwater days,
//!   windowed win rate and results) for linear or inverse contracts
//! - JSON and CSV reports of those statistics

pub mod export;
pub mod metrics;

pub use export::{export_json, export_stats_csv, import_json, save_report, StatsReport};
pub use metrics::{ClosedTrade, ContractKind, PerformanceStats, TradeStats};
