//! Channelbot Core: position tracking and order reconciliation for a
//! bar-driven trading bot.
//!
//! This crate contains:
//! - Domain types (bars, orders, positions, account snapshots, instruments)
//! - The id scheme linking exchange orders to positions
//! - Position store with JSON snapshots and a CSV history log
//! - Execution sync and position/order reconciliation
//! - The tick driver ([`bot::TradingBot`]) and its strategy hooks
//! - Stop trailing, break-even and sizing for the channel strategy

pub mod bot;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod store;
pub mod strategy;

pub use bot::{BotStrategy, OrderInterface, TradingBot};
pub use config::{load_config, BotConfig, ConfigError};
pub use error::BotError;
