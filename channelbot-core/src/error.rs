//! Errors raised by the trading engine.
//!
//! Divergence between the local book and the exchange is never an error: the
//! reconciler repairs or logs it. What ends up here is what a tick cannot
//! handle itself: the order interface failing, or persistence failing.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("order {order_id} rejected: {reason}")]
    OrderRejected { order_id: String, reason: String },

    #[error("order {0} not found on exchange")]
    OrderNotFound(String),

    #[error("exchange error: {0}")]
    Exchange(String),

    #[error("need at least {needed} bars, got {got}")]
    NotEnoughBars { needed: usize, got: usize },

    #[error("persistence error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("history log error: {0}")]
    Csv(#[from] csv::Error),
}
