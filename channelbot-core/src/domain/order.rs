//! Exchange-facing orders.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of an order relative to its position, encoded into the order id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Opens the position.
    Entry,
    /// Stop-loss exit.
    Sl,
    /// Take-profit exit.
    Tp,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Entry => "ENTRY",
            OrderType::Sl => "SL",
            OrderType::Tp => "TP",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ENTRY" => Some(OrderType::Entry),
            "SL" => Some(OrderType::Sl),
            "TP" => Some(OrderType::Tp),
            _ => None,
        }
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, OrderType::Sl | OrderType::Tp)
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An order as sent to, or reported by, the exchange.
///
/// `amount` is signed: positive buys, negative sells. An order with neither a
/// stop nor a limit price is a market order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub amount: f64,
    pub stop_price: Option<f64>,
    pub limit_price: Option<f64>,
    /// Stop level already hit; the order now works as market/limit.
    #[serde(default)]
    pub stop_triggered: bool,
    pub executed_price: Option<f64>,
    #[serde(default)]
    pub executed_amount: f64,
    pub execution_tstamp: Option<i64>,
}

impl Order {
    /// Market order.
    pub fn new(id: impl Into<String>, amount: f64) -> Self {
        Self {
            id: id.into(),
            amount,
            stop_price: None,
            limit_price: None,
            stop_triggered: false,
            executed_price: None,
            executed_amount: 0.0,
            execution_tstamp: None,
        }
    }

    pub fn with_stop(mut self, stop_price: f64) -> Self {
        self.stop_price = Some(stop_price);
        self
    }

    pub fn with_limit(mut self, limit_price: f64) -> Self {
        self.limit_price = Some(limit_price);
        self
    }

    pub fn is_market(&self) -> bool {
        self.stop_price.is_none() && self.limit_price.is_none()
    }

    /// The price this order enters at: the stop for stop entries, else the limit.
    pub fn entry_price(&self) -> Option<f64> {
        self.stop_price.or(self.limit_price)
    }

    /// Price for log lines; NaN for market orders.
    pub fn display_price(&self) -> f64 {
        self.entry_price().unwrap_or(f64::NAN)
    }
}
